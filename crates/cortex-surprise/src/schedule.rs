use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};

/// Next UTC instant at or after `from` for a daily `hour:minute` wall-clock
/// schedule. Grounded on the scheduler engine's `Schedule::Daily` handling
/// elsewhere in this codebase, trimmed to the one schedule kind C3 needs.
pub fn next_daily_run(hour: u32, minute: u32, from: DateTime<Utc>) -> DateTime<Utc> {
    let candidate = Utc
        .with_ymd_and_hms(from.year(), from.month(), from.day(), hour, minute, 0)
        .single()
        .expect("hour/minute validated by config deserialization");

    if candidate > from {
        candidate
    } else {
        candidate + Duration::days(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedules_today_when_time_has_not_passed() {
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 1, 0, 0).unwrap();
        let next = next_daily_run(3, 0, from);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 1, 3, 0, 0).unwrap());
    }

    #[test]
    fn rolls_to_tomorrow_when_time_has_passed() {
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 5, 0, 0).unwrap();
        let next = next_daily_run(3, 0, from);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 2, 3, 0, 0).unwrap());
    }
}
