//! The 72-hour quote expiry rule.
//!
//! Applied lazily on deal reads and re-checked inside the client-accept
//! transition; there is no background sweeper.

use crate::domain::TimeMs;

/// How long a client has to accept a quote.
pub const QUOTE_TTL_MS: i64 = 72 * 60 * 60 * 1000;

/// Reason recorded when the system cancels an expired quote.
pub const EXPIRY_REASON: &str = "Deal cancelled: 72 hours passed without client approval.";

/// True when more than 72 hours have passed since the quote was sent.
pub fn quote_expired(quote_sent_at: TimeMs, now: TimeMs) -> bool {
    now - quote_sent_at > QUOTE_TTL_MS
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR_MS: i64 = 60 * 60 * 1000;

    #[test]
    fn test_expired_after_73_hours() {
        let sent = TimeMs::new(0);
        let now = TimeMs::new(73 * HOUR_MS);
        assert!(quote_expired(sent, now));
    }

    #[test]
    fn test_not_expired_at_71_hours() {
        let sent = TimeMs::new(0);
        let now = TimeMs::new(71 * HOUR_MS);
        assert!(!quote_expired(sent, now));
    }

    #[test]
    fn test_boundary_is_exclusive() {
        let sent = TimeMs::new(0);
        let now = TimeMs::new(QUOTE_TTL_MS);
        assert!(!quote_expired(sent, now));
        assert!(quote_expired(sent, TimeMs::new(QUOTE_TTL_MS + 1)));
    }
}
