//! Negotiated-amount resolution.
//!
//! Derives one authoritative price for a deal from its line items, its stored
//! negotiated amount, a caller-supplied override, or the latest priced
//! negotiation message, in that precedence order. First positive result wins.

use crate::domain::{Decimal, DealItem};

/// Inputs to one resolution pass. All fields are optional except items;
/// the caller assembles them from the deal, the request, and the log.
#[derive(Debug, Clone, Default)]
pub struct AmountSources<'a> {
    /// Current line items; their sum is the strongest signal.
    pub items: &'a [DealItem],
    /// `negotiated_amount` already stored on the deal.
    pub stored_amount: Option<Decimal>,
    /// Explicit override from the caller (body, then query, then header).
    pub override_amount: Option<Decimal>,
    /// Latest negotiation message carrying a positive proposed price.
    pub latest_proposed_price: Option<Decimal>,
}

/// Resolve the authoritative amount, if any source yields a positive value.
///
/// Transition paths (approve/accept) treat `None` as an InvalidAmount error;
/// display paths render it as an absent price.
pub fn resolve_amount(sources: &AmountSources<'_>) -> Option<Decimal> {
    let item_sum = sum_items(sources.items);
    if item_sum.is_positive() {
        return Some(item_sum);
    }

    if let Some(stored) = sources.stored_amount {
        if stored.is_positive() {
            return Some(stored);
        }
    }

    if let Some(hint) = sources.override_amount {
        if hint.is_positive() {
            return Some(hint);
        }
    }

    if let Some(proposed) = sources.latest_proposed_price {
        if proposed.is_positive() {
            return Some(proposed);
        }
    }

    None
}

/// Sum of `quantity × effective unit price` over all items.
pub fn sum_items(items: &[DealItem]) -> Decimal {
    items
        .iter()
        .fold(Decimal::zero(), |acc, item| acc + item.line_total())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DealId;

    fn item(quantity: i64, unit_price: i64, negotiated: Option<i64>) -> DealItem {
        DealItem {
            id: "i".into(),
            deal_id: DealId::new("d".into()),
            offer_item_id: "o".into(),
            quantity,
            cartons: 1,
            cbm: Decimal::from_i64(1),
            negotiated_price: negotiated.map(Decimal::from_i64),
            unit_price: Decimal::from_i64(unit_price),
        }
    }

    #[test]
    fn test_item_sum_beats_stale_stored_amount() {
        // Items sum to 80, stored amount is a stale 120; items win.
        let items = vec![item(10, 10, Some(8))];
        let resolved = resolve_amount(&AmountSources {
            items: &items,
            stored_amount: Some(Decimal::from_i64(120)),
            ..Default::default()
        });
        assert_eq!(resolved, Some(Decimal::from_i64(80)));
    }

    #[test]
    fn test_stored_amount_when_no_items() {
        let resolved = resolve_amount(&AmountSources {
            stored_amount: Some(Decimal::from_i64(500)),
            override_amount: Some(Decimal::from_i64(999)),
            ..Default::default()
        });
        assert_eq!(resolved, Some(Decimal::from_i64(500)));
    }

    #[test]
    fn test_override_when_no_items_or_stored() {
        let resolved = resolve_amount(&AmountSources {
            override_amount: Some(Decimal::from_i64(750)),
            latest_proposed_price: Some(Decimal::from_i64(700)),
            ..Default::default()
        });
        assert_eq!(resolved, Some(Decimal::from_i64(750)));
    }

    #[test]
    fn test_latest_proposal_is_last_resort() {
        let resolved = resolve_amount(&AmountSources {
            latest_proposed_price: Some(Decimal::from_i64(640)),
            ..Default::default()
        });
        assert_eq!(resolved, Some(Decimal::from_i64(640)));
    }

    #[test]
    fn test_non_positive_sources_are_skipped() {
        let resolved = resolve_amount(&AmountSources {
            stored_amount: Some(Decimal::zero()),
            override_amount: Some(Decimal::from_i64(-5)),
            latest_proposed_price: Some(Decimal::from_i64(300)),
            ..Default::default()
        });
        assert_eq!(resolved, Some(Decimal::from_i64(300)));
    }

    #[test]
    fn test_nothing_resolvable() {
        assert_eq!(resolve_amount(&AmountSources::default()), None);
    }

    #[test]
    fn test_multiple_items_mixed_prices() {
        // 5 × 12 (negotiated) + 3 × 20 (catalog) = 120
        let items = vec![item(5, 15, Some(12)), item(3, 20, None)];
        assert_eq!(sum_items(&items), Decimal::from_i64(120));
    }
}
