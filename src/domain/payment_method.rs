use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Fixed rate used only to present card amounts in USD.
pub const PKR_PER_USD: f64 = 280.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Jazzcash,
    Easypaisa,
    Stripe,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 3] = [
        PaymentMethod::Jazzcash,
        PaymentMethod::Easypaisa,
        PaymentMethod::Stripe,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Jazzcash => "JAZZCASH",
            PaymentMethod::Easypaisa => "EASYPAISA",
            PaymentMethod::Stripe => "STRIPE",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PaymentMethod::Jazzcash => "JazzCash",
            PaymentMethod::Easypaisa => "EasyPaisa",
            PaymentMethod::Stripe => "Stripe",
        }
    }

    pub fn currency(&self) -> &'static str {
        match self {
            PaymentMethod::Jazzcash | PaymentMethod::Easypaisa => "PKR",
            PaymentMethod::Stripe => "USD",
        }
    }

    pub fn is_mobile_wallet(&self) -> bool {
        !matches!(self, PaymentMethod::Stripe)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "JAZZCASH" => Ok(PaymentMethod::Jazzcash),
            "EASYPAISA" => Ok(PaymentMethod::Easypaisa),
            "STRIPE" | "CARD" => Ok(PaymentMethod::Stripe),
            other => Err(format!("unknown payment method '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wallets_settle_in_rupees_cards_in_dollars() {
        assert_eq!(PaymentMethod::Jazzcash.currency(), "PKR");
        assert_eq!(PaymentMethod::Easypaisa.currency(), "PKR");
        assert_eq!(PaymentMethod::Stripe.currency(), "USD");
    }

    #[test]
    fn path_segments_parse() {
        assert_eq!("jazzcash".parse::<PaymentMethod>(), Ok(PaymentMethod::Jazzcash));
        assert_eq!("EasyPaisa".parse::<PaymentMethod>(), Ok(PaymentMethod::Easypaisa));
        assert_eq!("stripe".parse::<PaymentMethod>(), Ok(PaymentMethod::Stripe));
        assert!("paypal".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn serde_uses_upper_case_names() {
        let json = serde_json::to_string(&PaymentMethod::Easypaisa).unwrap();
        assert_eq!(json, "\"EASYPAISA\"");
    }
}
