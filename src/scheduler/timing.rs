/// Drift-corrected scheduling: the next fire is anchored to the reading's own timestamp
use std::time::Duration;
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::utils::{to_std_duration, truncate_to_second};

/// The reading's timestamp truncated to whole seconds, plus the interval.
/// Saturates at the latest representable timestamp.
pub fn next_fire(reading_time: OffsetDateTime, interval: Duration) -> OffsetDateTime {
    let truncated = truncate_to_second(reading_time);
    time::Duration::try_from(interval)
        .ok()
        .and_then(|interval| truncated.checked_add(interval))
        .unwrap_or_else(|| PrimitiveDateTime::MAX.assume_utc())
}

/// Delay between the reading and its next fire. Non-positive delays become zero,
/// which means "fire immediately".
pub fn delay_until_next(reading_time: OffsetDateTime, interval: Duration) -> Duration {
    to_std_duration(next_fire(reading_time, interval) - reading_time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn anchors_to_whole_seconds() {
        let reading_time = datetime!(2024-01-01 12:00:00.250 UTC);
        let interval = Duration::from_secs(1);

        assert_eq!(
            next_fire(reading_time, interval),
            datetime!(2024-01-01 12:00:01 UTC)
        );
        assert_eq!(
            delay_until_next(reading_time, interval),
            Duration::from_millis(750)
        );
    }

    #[test]
    fn whole_second_reading_waits_full_interval() {
        let reading_time = datetime!(2024-01-01 12:00:00 UTC);
        assert_eq!(
            delay_until_next(reading_time, Duration::from_secs(60)),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn unrepresentable_next_fire_saturates() {
        let reading_time = datetime!(2024-01-01 12:00:00 UTC);
        let interval = Duration::from_secs(1_000_000_000_000);

        assert_eq!(
            next_fire(reading_time, interval),
            PrimitiveDateTime::MAX.assume_utc()
        );
        assert!(delay_until_next(reading_time, interval) > Duration::from_secs(60));
        assert!(delay_until_next(reading_time, Duration::MAX) > Duration::ZERO);
    }

    #[test]
    fn non_positive_delay_fires_immediately() {
        let reading_time = datetime!(2024-01-01 12:00:00.900 UTC);
        assert_eq!(delay_until_next(reading_time, Duration::ZERO), Duration::ZERO);
    }
}
