//! Overflow-safe deadline arithmetic.

use std::time::{Duration, Instant};

/// Stand-in for "never" when a due time does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

/// `base + d`, or `None` if the sum does not fit in an `Instant`.
pub(crate) fn checked_deadline(base: Instant, d: Duration) -> Option<Instant> {
    base.checked_add(d)
}

/// `base + d`, saturating to a point decades ahead when the sum overflows.
pub(crate) fn saturating_deadline(base: Instant, d: Duration) -> Instant {
    base.checked_add(d)
        .or_else(|| base.checked_add(FAR_FUTURE))
        .unwrap_or(base)
}
