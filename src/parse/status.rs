//! Campaign status derived from countdown/ended phrasing.

use crate::record::Status;

const ENDED_PHRASES: &[&str] = &["ended:", "ended on", "completed:", "finished:"];
const ACTIVE_PHRASES: &[&str] = &["ends on", "ends:", "days left"];

/// Derive a campaign status from the countdown text shown on the page.
/// Text with no recognizable phrasing stays `Unknown` rather than guessing
/// from the date value.
pub fn derive(countdown_text: &str) -> Status {
    let lower = countdown_text.to_lowercase();
    if ENDED_PHRASES.iter().any(|p| lower.contains(p)) {
        return Status::Ended;
    }
    if ACTIVE_PHRASES.iter().any(|p| lower.contains(p)) {
        return Status::Active;
    }
    Status::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ended_phrasings() {
        assert_eq!(derive("Ended: March 15, 2025"), Status::Ended);
        assert_eq!(derive("Campaign ended on June 1, 2025"), Status::Ended);
        assert_eq!(derive("COMPLETED: 2025-03-15"), Status::Ended);
    }

    #[test]
    fn test_active_phrasings() {
        assert_eq!(derive("Ends on April 2, 2026"), Status::Active);
        assert_eq!(derive("ends: tomorrow"), Status::Active);
        assert_eq!(derive("3 days left"), Status::Active);
    }

    #[test]
    fn test_unrecognized_stays_unknown() {
        assert_eq!(derive(""), Status::Unknown);
        assert_eq!(derive("March 15, 2025"), Status::Unknown);
        assert_eq!(derive("TBD"), Status::Unknown);
    }
}
