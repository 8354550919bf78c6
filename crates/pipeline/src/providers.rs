//! Ports for the external schedule and holiday collaborators.
//!
//! The engine only ever sees these traits; the shipped implementations
//! cover deployments without a dedicated scheduling service, and tests
//! substitute their own.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, NaiveTime};
use timeclock_core::types::DbId;
use timeclock_core::worktime::DaySchedule;

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// Authoritative per-day schedule source, including any date-specific
/// exception or override. `None` means no applicable schedule; an
/// unavailable schedule service is reported the same way, never as an
/// error.
#[async_trait]
pub trait ScheduleProvider: Send + Sync {
    async fn effective_schedule(&self, user_id: DbId, date: NaiveDate) -> Option<DaySchedule>;
}

/// Company holiday calendar.
#[async_trait]
pub trait HolidayProvider: Send + Sync {
    async fn is_holiday(&self, date: NaiveDate) -> bool;
}

// ---------------------------------------------------------------------------
// WeeklyScheduleProvider
// ---------------------------------------------------------------------------

/// Uniform weekly schedule: one start/end time applied on the configured
/// workdays for every user.
#[derive(Debug, Clone)]
pub struct WeeklyScheduleProvider {
    start: NaiveTime,
    end: NaiveTime,
    /// Workday flags indexed by days-from-Monday (0 = Monday).
    workdays: [bool; 7],
}

impl WeeklyScheduleProvider {
    pub fn new(start: NaiveTime, end: NaiveTime, workdays: [bool; 7]) -> Self {
        Self {
            start,
            end,
            workdays,
        }
    }

    /// Load from environment variables with defaults.
    ///
    /// | Env Var             | Default       |
    /// |---------------------|---------------|
    /// | `SCHEDULE_START`    | `09:00`       |
    /// | `SCHEDULE_END`      | `18:00`       |
    /// | `SCHEDULE_WORKDAYS` | `1,2,3,4,5`   |
    ///
    /// Workdays are ISO weekday numbers (1 = Monday .. 7 = Sunday).
    pub fn from_env() -> Self {
        let start = env_time("SCHEDULE_START", "09:00");
        let end = env_time("SCHEDULE_END", "18:00");

        let raw = std::env::var("SCHEDULE_WORKDAYS").unwrap_or_else(|_| "1,2,3,4,5".into());
        let mut workdays = [false; 7];
        for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let iso: usize = part
                .parse()
                .unwrap_or_else(|_| panic!("SCHEDULE_WORKDAYS entry '{part}' must be 1-7"));
            assert!(
                (1..=7).contains(&iso),
                "SCHEDULE_WORKDAYS entry '{part}' must be 1-7"
            );
            workdays[iso - 1] = true;
        }

        Self::new(start, end, workdays)
    }
}

#[async_trait]
impl ScheduleProvider for WeeklyScheduleProvider {
    async fn effective_schedule(&self, _user_id: DbId, date: NaiveDate) -> Option<DaySchedule> {
        let idx = date.weekday().num_days_from_monday() as usize;
        if self.workdays[idx] {
            Some(DaySchedule {
                start: self.start,
                end: self.end,
            })
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// FixedHolidayProvider
// ---------------------------------------------------------------------------

/// Holiday calendar backed by a fixed date list.
#[derive(Debug, Clone, Default)]
pub struct FixedHolidayProvider {
    dates: HashSet<NaiveDate>,
}

impl FixedHolidayProvider {
    pub fn new(dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            dates: dates.into_iter().collect(),
        }
    }

    /// Load from the `HOLIDAY_DATES` env var: a comma-separated list of
    /// `YYYY-MM-DD` dates. Missing or empty means no holidays.
    pub fn from_env() -> Self {
        let raw = std::env::var("HOLIDAY_DATES").unwrap_or_default();
        let dates = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .unwrap_or_else(|_| panic!("HOLIDAY_DATES entry '{s}' must be YYYY-MM-DD"))
            })
            .collect();
        Self { dates }
    }
}

#[async_trait]
impl HolidayProvider for FixedHolidayProvider {
    async fn is_holiday(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }
}

fn env_time(name: &str, default: &str) -> NaiveTime {
    let raw = std::env::var(name).unwrap_or_else(|_| default.into());
    NaiveTime::parse_from_str(&raw, "%H:%M")
        .unwrap_or_else(|_| panic!("{name} must be a valid HH:MM time"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn t(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    fn weekdays() -> [bool; 7] {
        [true, true, true, true, true, false, false]
    }

    #[tokio::test]
    async fn weekly_provider_covers_workdays() {
        let provider = WeeklyScheduleProvider::new(t(9, 0), t(18, 0), weekdays());
        // 2026-03-02 is a Monday.
        let monday = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let schedule = provider.effective_schedule(1, monday).await;
        assert_eq!(
            schedule,
            Some(DaySchedule {
                start: t(9, 0),
                end: t(18, 0),
            })
        );
    }

    #[tokio::test]
    async fn weekly_provider_skips_weekend() {
        let provider = WeeklyScheduleProvider::new(t(9, 0), t(18, 0), weekdays());
        let saturday = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        assert!(provider.effective_schedule(1, saturday).await.is_none());
    }

    #[tokio::test]
    async fn fixed_holiday_provider_matches_exact_dates() {
        let may_day = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let provider = FixedHolidayProvider::new([may_day]);
        assert!(provider.is_holiday(may_day).await);
        assert!(
            !provider
                .is_holiday(NaiveDate::from_ymd_opt(2026, 5, 2).unwrap())
                .await
        );
    }

    #[tokio::test]
    async fn empty_holiday_provider_has_no_holidays() {
        let provider = FixedHolidayProvider::default();
        assert!(
            !provider
                .is_holiday(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap())
                .await
        );
    }
}
