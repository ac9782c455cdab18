//! Commission calculation: splits a deal amount into the four-way
//! platform / shipping / employee / trader breakdown.
//!
//! Pure computation, no I/O. Settings are passed in explicitly so the
//! calculation is reproducible from its inputs alone.

use crate::domain::{CommissionMethod, Decimal};

/// Everything the calculator needs for one payment.
#[derive(Debug, Clone)]
pub struct CommissionInputs {
    /// The deal's negotiated amount (fallback: payment amount).
    pub deal_amount: Decimal,
    pub total_cbm: Decimal,
    pub platform_rate: Decimal,
    pub shipping_rate: Decimal,
    pub employee_rate: Decimal,
    pub cbm_rate: Option<Decimal>,
    pub method: CommissionMethod,
}

/// The resulting split. All amounts are rounded to cents and satisfy
/// `total_buyer_paid == deal_amount + platform + shipping + employee`.
#[derive(Debug, Clone, PartialEq)]
pub struct CommissionBreakdown {
    pub platform_commission: Decimal,
    pub shipping_commission: Decimal,
    pub employee_commission: Decimal,
    /// What the buyer pays in total.
    pub total_buyer_paid: Decimal,
    /// What the trader receives: the deal amount, untouched.
    pub trader_payout: Decimal,
    /// Which method produced the platform commission. Under BOTH this is the
    /// winner of the max comparison; under CBM without a cbm rate it records
    /// the silent PERCENTAGE fallback.
    pub platform_method: CommissionMethod,
}

/// Maximum accepted gap between a submitted payment amount and the computed
/// buyer total. Absorbs client-side float rounding.
pub fn amount_tolerance() -> Decimal {
    Decimal::from_str_canonical("0.02").expect("valid tolerance")
}

pub fn calculate(inputs: &CommissionInputs) -> CommissionBreakdown {
    let percentage_commission = inputs.deal_amount.percent(inputs.platform_rate);

    let (platform_commission, platform_method) = match (inputs.method, inputs.cbm_rate) {
        (CommissionMethod::Percentage, _) | (CommissionMethod::Cbm, None)
        | (CommissionMethod::Both, None) => {
            (percentage_commission, CommissionMethod::Percentage)
        }
        (CommissionMethod::Cbm, Some(cbm_rate)) => {
            ((inputs.total_cbm * cbm_rate).round_cents(), CommissionMethod::Cbm)
        }
        (CommissionMethod::Both, Some(cbm_rate)) => {
            let cbm_commission = (inputs.total_cbm * cbm_rate).round_cents();
            if cbm_commission > percentage_commission {
                (cbm_commission, CommissionMethod::Cbm)
            } else {
                (percentage_commission, CommissionMethod::Percentage)
            }
        }
    };

    let shipping_commission = inputs.deal_amount.percent(inputs.shipping_rate);
    let employee_commission = inputs.deal_amount.percent(inputs.employee_rate);

    let total_buyer_paid = (inputs.deal_amount
        + platform_commission
        + shipping_commission
        + employee_commission)
        .round_cents();

    CommissionBreakdown {
        platform_commission,
        shipping_commission,
        employee_commission,
        total_buyer_paid,
        trader_payout: inputs.deal_amount,
        platform_method,
    }
}

/// True when a submitted payment amount matches the expected buyer total
/// within the 2-cent tolerance.
pub fn amount_matches(submitted: Decimal, expected: Decimal) -> bool {
    submitted.abs_diff(expected) <= amount_tolerance()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn base_inputs() -> CommissionInputs {
        CommissionInputs {
            deal_amount: dec("1000"),
            total_cbm: Decimal::zero(),
            platform_rate: dec("2.5"),
            shipping_rate: dec("5"),
            employee_rate: dec("1"),
            cbm_rate: None,
            method: CommissionMethod::Percentage,
        }
    }

    #[test]
    fn test_percentage_split() {
        // deal 1000, platform 2.5%, shipping 5%, employee 1%
        // -> buyer total 1000 + 25 + 50 + 10 = 1085, trader payout 1000
        let b = calculate(&base_inputs());
        assert_eq!(b.platform_commission, dec("25"));
        assert_eq!(b.shipping_commission, dec("50"));
        assert_eq!(b.employee_commission, dec("10"));
        assert_eq!(b.total_buyer_paid, dec("1085"));
        assert_eq!(b.trader_payout, dec("1000"));
        assert_eq!(b.platform_method, CommissionMethod::Percentage);
    }

    #[test]
    fn test_cbm_method() {
        let mut inputs = base_inputs();
        inputs.method = CommissionMethod::Cbm;
        inputs.total_cbm = dec("50");
        inputs.cbm_rate = Some(dec("3"));

        let b = calculate(&inputs);
        assert_eq!(b.platform_commission, dec("150"));
        assert_eq!(b.platform_method, CommissionMethod::Cbm);
        // Shipping stays percentage-based regardless of method.
        assert_eq!(b.shipping_commission, dec("50"));
    }

    #[test]
    fn test_both_takes_maximum_and_records_winner() {
        // dealAmount 10000 × 2.5% = 250 vs 50 CBM × 3 = 150 -> 250, PERCENTAGE
        let mut inputs = base_inputs();
        inputs.deal_amount = dec("10000");
        inputs.method = CommissionMethod::Both;
        inputs.total_cbm = dec("50");
        inputs.cbm_rate = Some(dec("3"));

        let b = calculate(&inputs);
        assert_eq!(b.platform_commission, dec("250"));
        assert_eq!(b.platform_method, CommissionMethod::Percentage);
    }

    #[test]
    fn test_both_cbm_wins() {
        let mut inputs = base_inputs();
        inputs.method = CommissionMethod::Both;
        inputs.total_cbm = dec("200");
        inputs.cbm_rate = Some(dec("3"));

        // 200 × 3 = 600 > 25
        let b = calculate(&inputs);
        assert_eq!(b.platform_commission, dec("600"));
        assert_eq!(b.platform_method, CommissionMethod::Cbm);
        assert_eq!(b.total_buyer_paid, dec("1660"));
    }

    #[test]
    fn test_cbm_without_rate_falls_back_to_percentage() {
        let mut inputs = base_inputs();
        inputs.method = CommissionMethod::Cbm;
        inputs.total_cbm = dec("50");
        inputs.cbm_rate = None;

        let b = calculate(&inputs);
        assert_eq!(b.platform_commission, dec("25"));
        assert_eq!(b.platform_method, CommissionMethod::Percentage);

        inputs.method = CommissionMethod::Both;
        let b = calculate(&inputs);
        assert_eq!(b.platform_commission, dec("25"));
        assert_eq!(b.platform_method, CommissionMethod::Percentage);
    }

    #[test]
    fn test_fractional_amounts_round_to_cents() {
        let mut inputs = base_inputs();
        inputs.deal_amount = dec("333.33");

        let b = calculate(&inputs);
        // 8.33325 -> 8.33, 16.6665 -> 16.67, 3.3333 -> 3.33
        assert_eq!(b.platform_commission, dec("8.33"));
        assert_eq!(b.shipping_commission, dec("16.67"));
        assert_eq!(b.employee_commission, dec("3.33"));
        assert_eq!(b.total_buyer_paid, dec("361.66"));
        // Components always re-sum to the total exactly.
        assert_eq!(
            b.trader_payout + b.platform_commission + b.shipping_commission + b.employee_commission,
            b.total_buyer_paid
        );
    }

    #[test]
    fn test_amount_tolerance() {
        assert!(amount_matches(dec("1085"), dec("1085")));
        assert!(amount_matches(dec("1085.02"), dec("1085")));
        assert!(amount_matches(dec("1084.98"), dec("1085")));
        assert!(!amount_matches(dec("1085.03"), dec("1085")));
        assert!(!amount_matches(dec("1084.97"), dec("1085")));
    }
}
