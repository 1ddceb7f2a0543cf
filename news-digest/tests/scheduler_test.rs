use chrono::{NaiveTime, TimeZone, Utc};
use chrono_tz::America::New_York;
use news_digest::config::{ScheduleSettings, Settings};
use news_digest::{DailySchedule, DigestError};

fn seven_am() -> DailySchedule {
    DailySchedule::new(NaiveTime::from_hms_opt(7, 0, 0).unwrap(), New_York)
}

#[test]
fn test_next_run_later_today() {
    // 09:00 UTC = 05:00 EDT
    let now = Utc.with_ymd_and_hms(2026, 6, 10, 9, 0, 0).unwrap();
    assert_eq!(seven_am().next_run_after(now), Utc.with_ymd_and_hms(2026, 6, 10, 11, 0, 0).unwrap());
}

#[test]
fn test_next_run_rolls_to_tomorrow() {
    // 07:00 EST exactly; the next run is a day later
    let now = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap();
    assert_eq!(seven_am().next_run_after(now), Utc.with_ymd_and_hms(2026, 1, 16, 12, 0, 0).unwrap());
}

#[test]
fn test_next_run_across_dst_change() {
    // Saturday before the March 8 2026 spring-forward, 08:00 EST
    let now = Utc.with_ymd_and_hms(2026, 3, 7, 13, 0, 0).unwrap();
    // Sunday 07:00 EDT
    assert_eq!(seven_am().next_run_after(now), Utc.with_ymd_and_hms(2026, 3, 8, 11, 0, 0).unwrap());
}

#[test]
fn test_time_in_dst_gap_moves_forward_an_hour() {
    let schedule = DailySchedule::new(NaiveTime::from_hms_opt(2, 30, 0).unwrap(), New_York);
    let now = Utc.with_ymd_and_hms(2026, 3, 8, 5, 0, 0).unwrap();
    // 02:30 does not exist on March 8; 03:30 EDT is 07:30 UTC
    assert_eq!(schedule.next_run_after(now), Utc.with_ymd_and_hms(2026, 3, 8, 7, 30, 0).unwrap());
}

#[test]
fn test_schedule_settings_validation() {
    let schedule = ScheduleSettings {
        time: "25:99".to_string(),
        ..ScheduleSettings::default()
    };
    assert!(matches!(DailySchedule::from_settings(&schedule), Err(DigestError::Config(_))));

    let mut settings = Settings::default();
    settings.schedule.timezone = "Mars/Olympus_Mons".to_string();
    assert!(matches!(settings.validate(), Err(DigestError::Config(_))));
}
