//! Simulated settlement for the three payment rails.
//!
//! Nothing here talks to a real gateway: a settlement waits for a random
//! delay inside the configured range, then always succeeds with
//! provider-shaped identifiers. Field validation for each rail lives here
//! as well so it runs before any order lookup.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use rand::{Rng, distr::Alphanumeric};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    domain::{PaymentMethod, PaymentStatus, payment_method::PKR_PER_USD},
    error::{AppError, AppResult},
};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentResult {
    pub provider: PaymentMethod,
    pub provider_payment_id: String,
    pub provider_transaction_id: String,
    pub status: PaymentStatus,
    pub order_id: Uuid,
    /// Charged amount in minor units of the order currency (paisa).
    pub amount: i64,
    #[schema(value_type = String)]
    pub currency: &'static str,
    /// Human readable amount in `currency`; card amounts are converted at a fixed rate.
    pub display_amount: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CardDetails {
    #[schema(value_type = String)]
    pub brand: &'static str,
    pub last4: String,
}

/// Provider fields after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentCredentials {
    Wallet { phone: String },
    Card(CardDetails),
}

impl PaymentCredentials {
    /// Masked form safe to log.
    pub fn masked(&self) -> String {
        match self {
            PaymentCredentials::Wallet { phone } => mask_phone(phone),
            PaymentCredentials::Card(card) => format!("{} ****{}", card.brand, card.last4),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PaymentSimulator {
    min_delay: Duration,
    max_delay: Duration,
}

impl PaymentSimulator {
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay,
            max_delay: max_delay.max(min_delay),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.payment_delay_min, config.payment_delay_max)
    }

    /// No artificial latency; used by tests.
    pub fn instant() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub async fn settle(&self, method: PaymentMethod, amount: i64, order_id: Uuid) -> PaymentResult {
        let delay = self.pick_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let (provider_payment_id, provider_transaction_id) = provider_ids(method);
        PaymentResult {
            provider: method,
            provider_payment_id,
            provider_transaction_id,
            status: PaymentStatus::Completed,
            order_id,
            amount,
            currency: method.currency(),
            display_amount: display_amount(method, amount),
            timestamp: Utc::now(),
            message: format!("Payment processed successfully via {}", method.display_name()),
        }
    }

    fn pick_delay(&self) -> Duration {
        if self.max_delay <= self.min_delay {
            return self.min_delay;
        }
        rand::rng().random_range(self.min_delay..=self.max_delay)
    }
}

/// Base36 millisecond clock followed by nine random characters.
fn unique_suffix() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let random: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect();
    format!("{}{}", to_base36(millis), random)
}

fn to_base36(mut value: u128) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".into();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

fn provider_ids(method: PaymentMethod) -> (String, String) {
    let base = unique_suffix();
    match method {
        PaymentMethod::Jazzcash => {
            let upper = base.to_ascii_uppercase();
            (format!("JC{upper}"), format!("TXN{upper}"))
        }
        PaymentMethod::Easypaisa => {
            let upper = base.to_ascii_uppercase();
            (format!("EP{upper}"), format!("EPTXN{upper}"))
        }
        PaymentMethod::Stripe => (format!("pi_{base}"), format!("ch_{base}")),
    }
}

fn display_amount(method: PaymentMethod, amount: i64) -> String {
    match method {
        PaymentMethod::Stripe => format!("{:.2}", amount as f64 / 100.0 / PKR_PER_USD),
        _ => format!("{}.{:02}", amount / 100, (amount % 100).abs()),
    }
}

/// Mobile wallets accept `03XXXXXXXXX`, `3XXXXXXXXX` or `+923XXXXXXXXX`;
/// whitespace is ignored. Returns the compacted number.
pub fn validate_wallet_phone(raw: Option<&str>) -> AppResult<String> {
    let raw = raw
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| AppError::InvalidInput("Phone number is required".into()))?;
    let phone: String = raw.chars().filter(|c| !c.is_whitespace()).collect();

    let national = phone
        .strip_prefix("+92")
        .or_else(|| phone.strip_prefix('0'))
        .unwrap_or(&phone);

    let valid = national.len() == 10
        && national.starts_with('3')
        && national.chars().all(|c| c.is_ascii_digit());
    if !valid {
        return Err(AppError::InvalidInput(
            "Invalid Pakistani phone number format".into(),
        ));
    }
    Ok(phone)
}

pub fn validate_card(
    card_number: Option<&str>,
    expiry_month: Option<&str>,
    expiry_year: Option<&str>,
    cvc: Option<&str>,
) -> AppResult<CardDetails> {
    let (Some(number), Some(month), Some(year), Some(cvc)) =
        (card_number, expiry_month, expiry_year, cvc)
    else {
        return Err(AppError::InvalidInput("Card details are required".into()));
    };

    let number: String = number.chars().filter(|c| !c.is_whitespace()).collect();
    if !(13..=19).contains(&number.len()) || !number.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::InvalidInput("Invalid card number".into()));
    }

    let cvc = cvc.trim();
    if !(3..=4).contains(&cvc.len()) || !cvc.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::InvalidInput("Invalid CVC".into()));
    }

    match month.trim().parse::<u8>() {
        Ok(m) if (1..=12).contains(&m) => {}
        _ => return Err(AppError::InvalidInput("Invalid expiry month".into())),
    }
    let year = year.trim();
    if year.is_empty() || !year.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::InvalidInput("Invalid expiry year".into()));
    }

    Ok(CardDetails {
        brand: card_brand(&number),
        last4: number[number.len() - 4..].to_string(),
    })
}

fn card_brand(number: &str) -> &'static str {
    let prefix2 = number.get(..2).unwrap_or_default();
    if number.starts_with('4') {
        "Visa"
    } else if ("51"..="55").contains(&prefix2) {
        "Mastercard"
    } else if prefix2 == "34" || prefix2 == "37" {
        "American Express"
    } else if number.starts_with("6011") || number.starts_with("65") {
        "Discover"
    } else {
        "Unknown"
    }
}

fn mask_phone(phone: &str) -> String {
    let visible = phone.len().saturating_sub(4);
    let tail = phone.get(visible..).unwrap_or_default();
    format!("{}{}", "*".repeat(visible), tail)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn wallet_phone_formats() {
        assert_eq!(validate_wallet_phone(Some("0300 1234567")).unwrap(), "03001234567");
        assert!(validate_wallet_phone(Some("+923001234567")).is_ok());
        assert!(validate_wallet_phone(Some("3001234567")).is_ok());
        assert!(validate_wallet_phone(Some("04001234567")).is_err());
        assert!(validate_wallet_phone(Some("0300123456")).is_err());
        assert!(validate_wallet_phone(Some("0300123456a")).is_err());
        assert!(matches!(
            validate_wallet_phone(None),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn card_checks() {
        let card = validate_card(
            Some("4242 4242 4242 4242"),
            Some("12"),
            Some("2030"),
            Some("123"),
        )
        .expect("valid card");
        assert_eq!(card.brand, "Visa");
        assert_eq!(card.last4, "4242");

        assert!(validate_card(Some("4242"), Some("12"), Some("2030"), Some("123")).is_err());
        assert!(
            validate_card(Some("4242424242424242"), Some("12"), Some("2030"), Some("12")).is_err()
        );
        assert!(
            validate_card(Some("4242424242424242"), Some("13"), Some("2030"), Some("123")).is_err()
        );
        assert!(validate_card(Some("4242424242424242"), None, Some("2030"), Some("123")).is_err());
    }

    #[test]
    fn brands() {
        assert_eq!(card_brand("5500000000000004"), "Mastercard");
        assert_eq!(card_brand("371449635398431"), "American Express");
        assert_eq!(card_brand("6011000990139424"), "Discover");
        assert_eq!(card_brand("9999999999999"), "Unknown");
    }

    #[test]
    fn phone_is_masked_for_logs() {
        let creds = PaymentCredentials::Wallet {
            phone: "03001234567".into(),
        };
        assert_eq!(creds.masked(), "*******4567");
    }

    #[tokio::test]
    async fn settlement_is_provider_shaped() {
        let simulator = PaymentSimulator::instant();
        let order_id = Uuid::new_v4();

        let jazz = simulator.settle(PaymentMethod::Jazzcash, 150_000, order_id).await;
        assert!(jazz.provider_payment_id.starts_with("JC"));
        assert!(jazz.provider_transaction_id.starts_with("TXN"));
        assert_eq!(jazz.currency, "PKR");
        assert_eq!(jazz.display_amount, "1500.00");
        assert_eq!(jazz.status, PaymentStatus::Completed);

        let easy = simulator.settle(PaymentMethod::Easypaisa, 100, order_id).await;
        assert!(easy.provider_payment_id.starts_with("EP"));
        assert!(easy.provider_transaction_id.starts_with("EPTXN"));

        let card = simulator.settle(PaymentMethod::Stripe, 280_000, order_id).await;
        assert!(card.provider_payment_id.starts_with("pi_"));
        assert!(card.provider_transaction_id.starts_with("ch_"));
        assert_eq!(card.currency, "USD");
        assert_eq!(card.display_amount, "10.00");
        assert_eq!(card.amount, 280_000);
    }

    #[tokio::test]
    async fn identifiers_are_unique() {
        let simulator = PaymentSimulator::instant();
        let mut seen = HashSet::new();
        for _ in 0..200 {
            let result = simulator
                .settle(PaymentMethod::Stripe, 1, Uuid::nil())
                .await;
            assert!(seen.insert(result.provider_payment_id));
        }
    }

    #[test]
    fn base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }
}
