use bigdecimal::{BigDecimal, RoundingMode};

use super::order::OrderTotals;

/// Tax and shipping rules applied at checkout.
#[derive(Debug, Clone)]
pub struct PricingPolicy {
    /// Fraction of the subtotal, e.g. `0.08` for 8 %.
    pub tax_rate: BigDecimal,
    pub shipping: ShippingPolicy,
}

#[derive(Debug, Clone)]
pub struct ShippingPolicy {
    pub flat_rate: BigDecimal,
    /// Subtotals at or above this amount ship free.
    pub free_threshold: Option<BigDecimal>,
}

pub fn round_money(amount: &BigDecimal) -> BigDecimal {
    amount.with_scale_round(2, RoundingMode::HalfUp)
}

impl ShippingPolicy {
    pub fn cost_for(&self, subtotal: &BigDecimal) -> BigDecimal {
        match &self.free_threshold {
            Some(threshold) if subtotal >= threshold => BigDecimal::from(0),
            _ => round_money(&self.flat_rate),
        }
    }
}

impl PricingPolicy {
    pub fn tax_for(&self, amount: &BigDecimal) -> BigDecimal {
        round_money(&(amount * &self.tax_rate))
    }

    /// Splits an order's `tax` over its lines so the line taxes add up to it
    /// exactly. Each line gets its share rounded down to the cent; the cents
    /// left over go to the lines with the largest dropped fractions.
    pub fn allocate_tax(&self, tax: &BigDecimal, line_totals: &[BigDecimal]) -> Vec<BigDecimal> {
        let exact: Vec<BigDecimal> = line_totals.iter().map(|l| l * &self.tax_rate).collect();
        let mut shares: Vec<BigDecimal> = exact
            .iter()
            .map(|e| e.with_scale_round(2, RoundingMode::Floor))
            .collect();

        let mut by_fraction: Vec<usize> = (0..shares.len()).collect();
        by_fraction.sort_by(|&a, &b| (&exact[b] - &shares[b]).cmp(&(&exact[a] - &shares[a])));

        let cent = BigDecimal::from(1) / BigDecimal::from(100);
        let zero = BigDecimal::from(0);
        let mut remaining = tax.clone() - shares.iter().sum::<BigDecimal>();
        for idx in by_fraction {
            if remaining <= zero {
                break;
            }
            shares[idx] += &cent;
            remaining -= &cent;
        }
        shares
    }

    pub fn quote(&self, subtotal: &BigDecimal, discount: &BigDecimal) -> OrderTotals {
        let subtotal = round_money(subtotal);
        let tax = self.tax_for(&subtotal);
        let shipping = self.shipping.cost_for(&subtotal);
        let discount = round_money(discount);
        let total = &subtotal + &tax + &shipping - &discount;
        OrderTotals {
            subtotal,
            tax,
            shipping,
            discount,
            total,
        }
    }
}
