/// Utility functions for timestamps and durations
use time::{format_description, OffsetDateTime};

/// Format a timestamp for human-readable logging
///
/// Converts an OffsetDateTime to DD.MM.YYYY - HH:MM:SS format
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    match format_description::parse("[day].[month].[year] - [hour]:[minute]:[second]") {
        Ok(format) => dt.format(&format).unwrap_or_else(|_| dt.to_string()),
        Err(_) => dt.to_string(),
    }
}

/// Zero the sub-second component of a timestamp
pub fn truncate_to_second(dt: OffsetDateTime) -> OffsetDateTime {
    dt - time::Duration::nanoseconds(i64::from(dt.nanosecond()))
}

/// Convert a time::Duration into a std Duration, clamping negative values to zero
pub fn to_std_duration(duration: time::Duration) -> std::time::Duration {
    std::time::Duration::try_from(duration).unwrap_or(std::time::Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn truncates_sub_second_component() {
        let dt = datetime!(2024-03-01 10:15:30.987 UTC);
        assert_eq!(truncate_to_second(dt), datetime!(2024-03-01 10:15:30 UTC));
    }

    #[test]
    fn clamps_negative_durations() {
        assert_eq!(
            to_std_duration(time::Duration::milliseconds(-250)),
            std::time::Duration::ZERO
        );
        assert_eq!(
            to_std_duration(time::Duration::milliseconds(750)),
            std::time::Duration::from_millis(750)
        );
    }

    #[test]
    fn formats_for_logs() {
        let dt = datetime!(2024-03-01 10:15:30 UTC);
        assert_eq!(format_datetime(&dt), "01.03.2024 - 10:15:30");
    }
}
