use chrono::{NaiveDate, Weekday};
use rams_workload::calendar::{CalendarError, WorkCalendar, WorkCalendarConfig, working_days};
use rams_workload::period::YearMonth;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

#[test]
fn leap_february_2024_has_21_working_days() {
    assert_eq!(working_days(2024, 2), 21);
    assert_eq!(WorkCalendar::default().working_days(2024, 2), 21);
}

#[test]
fn working_days_for_sample_months() {
    // January 2024 starts on a Monday, March 2024 on a Friday.
    assert_eq!(working_days(2024, 1), 23);
    assert_eq!(working_days(2024, 3), 21);
    assert_eq!(working_days(2023, 2), 20);
}

#[test]
fn invalid_month_counts_no_days() {
    assert_eq!(working_days(2024, 13), 0);
    assert_eq!(working_days(2024, 0), 0);
    assert_eq!(WorkCalendar::default().working_days(2024, 13), 0);
}

#[test]
fn default_calendar_weekends_unavailable() {
    let cal = WorkCalendar::default();
    // 2025-01-04 is a Saturday, 2025-01-05 a Sunday.
    assert!(!cal.is_available(d(2025, 1, 4)));
    assert!(!cal.is_available(d(2025, 1, 5)));
    assert!(cal.is_available(d(2025, 1, 6)));
}

#[test]
fn holidays_reduce_monthly_working_days() {
    let mut cal = WorkCalendar::default();
    assert_eq!(cal.working_days(2024, 12), 22);
    cal.add_holiday(d(2024, 12, 25));
    assert_eq!(cal.working_days(2024, 12), 21);
    // A holiday on a weekend changes nothing.
    cal.add_holiday(d(2024, 12, 28));
    assert_eq!(cal.working_days(2024, 12), 21);
}

#[test]
fn holidays_only_apply_to_their_own_date() {
    let mut cal = WorkCalendar::default();
    cal.add_holidays(&[d(2024, 12, 24), d(2026, 12, 24)]);
    assert!(!cal.is_available(d(2024, 12, 24)));
    assert!(!cal.is_available(d(2026, 12, 24)));
    assert!(cal.is_available(d(2025, 12, 24)));
}

#[test]
fn four_day_week_counts_monday_to_thursday() {
    let cal = WorkCalendar::custom(
        [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu],
        Vec::new(),
    )
    .unwrap();
    // February 2024 has four Fridays.
    assert_eq!(cal.working_days_in(YearMonth::new(2024, 2).unwrap()), 17);
}

#[test]
fn count_available_days_is_inclusive() {
    let cal = WorkCalendar::default();
    assert_eq!(cal.count_available_days(d(2024, 1, 1), d(2024, 1, 5)), 5);
    assert_eq!(cal.count_available_days(d(2024, 1, 6), d(2024, 1, 7)), 0);
    assert_eq!(cal.count_available_days(d(2024, 1, 5), d(2024, 1, 1)), 0);
}

#[test]
fn calendar_config_round_trips_through_json() {
    let cal = WorkCalendar::custom(
        [Weekday::Tue, Weekday::Mon, Weekday::Mon],
        [d(2024, 5, 1), d(2024, 1, 1)],
    )
    .unwrap();
    let config = cal.to_config();
    assert_eq!(config.working_days(), &[Weekday::Mon, Weekday::Tue]);
    assert_eq!(config.holidays(), &[d(2024, 1, 1), d(2024, 5, 1)]);

    let json = serde_json::to_string(&config).unwrap();
    let parsed: WorkCalendarConfig = serde_json::from_str(&json).unwrap();
    let rebuilt = WorkCalendar::from_config(&parsed).unwrap();
    assert_eq!(rebuilt, cal);
}

#[test]
fn calendar_without_working_days_is_rejected() {
    let err = WorkCalendar::custom(Vec::<Weekday>::new(), Vec::new()).unwrap_err();
    assert_eq!(err, CalendarError::NoWorkingDays);
}
