use std::env;
use std::str::FromStr;
use std::time::Duration;

use bigdecimal::BigDecimal;
use thiserror::Error;

use crate::application::checkout_service::CheckoutSettings;
use crate::domain::pricing::{PricingPolicy, ShippingPolicy};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub tax_rate: BigDecimal,
    pub flat_shipping: BigDecimal,
    pub free_shipping_threshold: Option<BigDecimal>,
    pub currency: String,
    pub stock_retry_attempts: u32,
    pub checkout_timeout: Duration,
    pub payment_gateway_url: String,
    pub payment_gateway_api_key: String,
}

impl AppConfig {
    /// Reads the process environment (after `.env` has been loaded).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| lookup(name).ok_or(ConfigError::Missing(name));
        let or = |name: &'static str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            host: or("HOST", "0.0.0.0"),
            port: parse("PORT", or("PORT", "8080"))?,
            tax_rate: parse("TAX_RATE", or("TAX_RATE", "0.08"))?,
            flat_shipping: parse("FLAT_SHIPPING", or("FLAT_SHIPPING", "5.99"))?,
            free_shipping_threshold: lookup("FREE_SHIPPING_THRESHOLD")
                .map(|v| parse("FREE_SHIPPING_THRESHOLD", v))
                .transpose()?,
            currency: or("CURRENCY", "USD").to_uppercase(),
            stock_retry_attempts: parse("STOCK_RETRY_ATTEMPTS", or("STOCK_RETRY_ATTEMPTS", "3"))?,
            checkout_timeout: Duration::from_secs(parse(
                "CHECKOUT_TIMEOUT_SECS",
                or("CHECKOUT_TIMEOUT_SECS", "30"),
            )?),
            payment_gateway_url: or("PAYMENT_GATEWAY_URL", "https://api.stripe.com"),
            payment_gateway_api_key: or("PAYMENT_GATEWAY_API_KEY", ""),
        })
    }

    pub fn checkout_settings(&self) -> CheckoutSettings {
        CheckoutSettings {
            pricing: PricingPolicy {
                tax_rate: self.tax_rate.clone(),
                shipping: ShippingPolicy {
                    flat_rate: self.flat_shipping.clone(),
                    free_threshold: self.free_shipping_threshold.clone(),
                },
            },
            currency: self.currency.clone(),
            stock_retry_attempts: self.stock_retry_attempts,
        }
    }
}

fn parse<T: FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}
