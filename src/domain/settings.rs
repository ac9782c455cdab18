//! Platform commission configuration.
//!
//! Settings live in a most-recently-updated-wins table and are re-read for
//! every financial computation; they are passed into the commission
//! calculator explicitly, never read through a hidden singleton.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::Decimal;

/// Policy used to compute the platform's cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommissionMethod {
    /// `dealAmount × platformRate / 100`.
    Percentage,
    /// `totalCBM × cbmRate`.
    Cbm,
    /// Compute both, take the maximum.
    Both,
}

impl CommissionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionMethod::Percentage => "PERCENTAGE",
            CommissionMethod::Cbm => "CBM",
            CommissionMethod::Both => "BOTH",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PERCENTAGE" => Some(CommissionMethod::Percentage),
            "CBM" => Some(CommissionMethod::Cbm),
            "BOTH" => Some(CommissionMethod::Both),
            _ => None,
        }
    }
}

impl fmt::Display for CommissionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Process-wide commission configuration, most recent row wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformSettings {
    pub platform_commission_rate: Decimal,
    pub shipping_commission_rate: Decimal,
    pub cbm_rate: Option<Decimal>,
    pub commission_method: CommissionMethod,
}

impl PlatformSettings {
    /// Documented defaults applied when no settings row exists:
    /// platform 2.5%, shipping 5.0%, percentage method.
    pub fn defaults() -> Self {
        PlatformSettings {
            platform_commission_rate: Decimal::from_str_canonical("2.5")
                .expect("valid default rate"),
            shipping_commission_rate: Decimal::from_str_canonical("5.0")
                .expect("valid default rate"),
            cbm_rate: None,
            commission_method: CommissionMethod::Percentage,
        }
    }
}

/// Default employee commission rate: 1.0%.
pub fn default_employee_rate() -> Decimal {
    Decimal::from_str_canonical("1.0").expect("valid default rate")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = PlatformSettings::defaults();
        assert_eq!(s.platform_commission_rate.to_canonical_string(), "2.5");
        assert_eq!(s.shipping_commission_rate.to_canonical_string(), "5");
        assert_eq!(s.cbm_rate, None);
        assert_eq!(s.commission_method, CommissionMethod::Percentage);
    }

    #[test]
    fn test_method_roundtrip() {
        for m in [
            CommissionMethod::Percentage,
            CommissionMethod::Cbm,
            CommissionMethod::Both,
        ] {
            assert_eq!(CommissionMethod::parse(m.as_str()), Some(m));
        }
        assert_eq!(CommissionMethod::parse("FLAT"), None);
    }
}
