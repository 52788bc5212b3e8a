use std::time::Duration;

use bigdecimal::BigDecimal;
use reqwest::Url;
use serde::Deserialize;

use crate::domain::errors::DomainError;
use crate::domain::ports::{PaymentGateway, PaymentIntentStatus};

/// Reads payment intents from a Stripe-compatible REST API.
pub struct HttpPaymentGateway {
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl HttpPaymentGateway {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout,
        }
    }

    /// `{base}/v1/payment_intents/{id}?expand[]=latest_charge`, with the id
    /// kept to a single path segment.
    fn intent_url(&self, intent_id: &str) -> Result<Url, DomainError> {
        if !is_intent_id(intent_id) {
            return Err(DomainError::PaymentNotConfirmed(format!(
                "'{}' is not a payment intent id",
                intent_id
            )));
        }
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| DomainError::PaymentFailed(format!("bad gateway url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| DomainError::PaymentFailed("bad gateway url".to_string()))?
            .pop_if_empty()
            .extend(["v1", "payment_intents", intent_id]);
        url.query_pairs_mut().append_pair("expand[]", "latest_charge");
        Ok(url)
    }
}

fn is_intent_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, Deserialize)]
struct IntentBody {
    status: String,
    /// Minor units.
    amount: i64,
    currency: String,
    #[serde(default)]
    payment_method_types: Vec<String>,
    #[serde(default)]
    last_payment_error: Option<IntentError>,
    #[serde(default)]
    latest_charge: Option<LatestCharge>,
}

#[derive(Debug, Deserialize)]
struct IntentError {
    message: Option<String>,
}

/// An id unless the request asked for the charge to be expanded.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LatestCharge {
    Expanded(Charge),
    Id(String),
}

#[derive(Debug, Deserialize)]
struct Charge {
    payment_method_details: Option<PaymentMethodDetails>,
}

#[derive(Debug, Deserialize)]
struct PaymentMethodDetails {
    #[serde(rename = "type")]
    kind: Option<String>,
    card: Option<CardDetails>,
}

#[derive(Debug, Deserialize)]
struct CardDetails {
    brand: Option<String>,
    last4: Option<String>,
}

impl From<IntentBody> for PaymentIntentStatus {
    fn from(body: IntentBody) -> Self {
        let details = match body.latest_charge {
            Some(LatestCharge::Expanded(charge)) => charge.payment_method_details,
            Some(LatestCharge::Id(_)) | None => None,
        };
        let (kind, card) = details.map(|d| (d.kind, d.card)).unwrap_or_default();
        let (card_brand, card_last4) = card.map(|c| (c.brand, c.last4)).unwrap_or_default();
        PaymentIntentStatus {
            is_succeeded: body.status == "succeeded",
            // Two-decimal currencies only.
            amount: BigDecimal::new(body.amount.into(), 2),
            currency: body.currency.to_uppercase(),
            payment_method: kind.or_else(|| body.payment_method_types.into_iter().next()),
            card_last4,
            card_brand,
            error_message: body.last_payment_error.and_then(|e| e.message),
        }
    }
}

impl PaymentGateway for HttpPaymentGateway {
    fn payment_intent_status(&self, intent_id: &str) -> Result<PaymentIntentStatus, DomainError> {
        let url = self.intent_url(intent_id)?;

        // Built per call: blocking clients must not be dropped on an async worker.
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| DomainError::PaymentFailed(e.to_string()))?;

        let resp = client
            .get(url)
            .bearer_auth(&self.api_key)
            .send()
            .map_err(|e| DomainError::PaymentFailed(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(PaymentIntentStatus {
                error_message: Some(format!("payment intent '{}' does not exist", intent_id)),
                ..Default::default()
            });
        }
        let resp = resp
            .error_for_status()
            .map_err(|e| DomainError::PaymentFailed(e.to_string()))?;
        let body: IntentBody = resp
            .json()
            .map_err(|e| DomainError::PaymentFailed(e.to_string()))?;
        Ok(body.into())
    }
}
