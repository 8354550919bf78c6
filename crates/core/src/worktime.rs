//! Daily time math: classification, worked/late/early-leave/overtime and
//! night-minute computation under a [`ReconcilePolicy`].
//!
//! Everything here is pure. The caller resolves the schedule and the
//! holiday/weekend state, pairs the day's punches, and hands the results
//! in; this module never touches a clock, the environment, or storage.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::policy::ReconcilePolicy;
use crate::session::Pairing;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// The effective schedule for one user-day, in local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaySchedule {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl DaySchedule {
    /// A scheduled end at or before the scheduled start means the shift
    /// crosses midnight; the end is shifted +24h before any comparison.
    pub fn crosses_midnight(&self) -> bool {
        self.end <= self.start
    }
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// Day classification, mirrored by the record status lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayStatus {
    Ok,
    Missing,
    Incomplete,
    Absent,
    Holiday,
    Weekend,
}

/// The derived minute totals and flags for one user-day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayMetrics {
    pub status: DayStatus,
    pub scheduled_minutes: Option<i32>,
    pub worked_minutes: i32,
    pub late_minutes: i32,
    pub early_leave_minutes: i32,
    pub overtime_minutes: i32,
    pub night_minutes: i32,
    pub holiday_minutes: i32,
    pub first_clock_in: Option<NaiveDateTime>,
    pub last_clock_out: Option<NaiveDateTime>,
    pub requires_approval: bool,
}

impl DayMetrics {
    fn empty(status: DayStatus) -> Self {
        Self {
            status,
            scheduled_minutes: None,
            worked_minutes: 0,
            late_minutes: 0,
            early_leave_minutes: 0,
            overtime_minutes: 0,
            night_minutes: 0,
            holiday_minutes: 0,
            first_clock_in: None,
            last_clock_out: None,
            requires_approval: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Classification + computation
// ---------------------------------------------------------------------------

/// Compute the full [`DayMetrics`] for one user-day.
///
/// `date` is the local work date the punches were bucketed to. Holiday
/// takes precedence over everything; a weekend with a schedule is treated
/// as a regular scheduled day.
pub fn compute_day(
    policy: &ReconcilePolicy,
    date: NaiveDate,
    schedule: Option<&DaySchedule>,
    is_holiday: bool,
    is_weekend: bool,
    pairing: &Pairing,
) -> DayMetrics {
    let has_punches = pairing.punch_count() > 0;

    if is_holiday {
        let mut metrics = off_day_metrics(policy, DayStatus::Holiday, pairing);
        metrics.holiday_minutes = metrics.worked_minutes;
        return metrics;
    }

    let Some(schedule) = schedule else {
        return match (is_weekend, has_punches) {
            (true, _) => off_day_metrics(policy, DayStatus::Weekend, pairing),
            (false, false) => DayMetrics::empty(DayStatus::Absent),
            (false, true) => off_day_metrics(policy, DayStatus::Incomplete, pairing),
        };
    };

    if !has_punches {
        let mut metrics = DayMetrics::empty(DayStatus::Missing);
        metrics.scheduled_minutes = Some(scheduled_minutes(date, schedule));
        return metrics;
    }

    scheduled_day_metrics(policy, date, schedule, pairing)
}

/// Worked-minute accounting for days without a lateness/overtime policy
/// (holidays, weekends, schedule-less days with punches).
fn off_day_metrics(policy: &ReconcilePolicy, status: DayStatus, pairing: &Pairing) -> DayMetrics {
    let raw: i64 = pairing.sessions.iter().map(|s| s.length_minutes()).sum();
    let mut metrics = DayMetrics::empty(status);
    metrics.worked_minutes = round_half_up(raw, policy.rounding_minutes) as i32;
    metrics.first_clock_in = pairing.sessions.first().map(|s| s.clock_in);
    metrics.last_clock_out = pairing.sessions.iter().filter_map(|s| s.clock_out).last();
    metrics
}

fn scheduled_day_metrics(
    policy: &ReconcilePolicy,
    date: NaiveDate,
    schedule: &DaySchedule,
    pairing: &Pairing,
) -> DayMetrics {
    let sched_start = date.and_time(schedule.start);
    let sched_end = if schedule.crosses_midnight() {
        date.and_time(schedule.end) + Duration::days(1)
    } else {
        date.and_time(schedule.end)
    };

    let incomplete = pairing.has_incomplete_session() || pairing.unmatched_out_count > 0;
    let first_in = pairing.sessions.first().map(|s| s.clock_in);
    let last_out = pairing.sessions.iter().filter_map(|s| s.clock_out).last();

    let raw_worked: i64 = pairing.sessions.iter().map(|s| s.length_minutes()).sum();
    let worked = round_half_up(raw_worked, policy.rounding_minutes);

    let late = match first_in {
        Some(actual) if actual > sched_start + Duration::minutes(policy.grace_in_minutes) => {
            (actual - sched_start).num_minutes()
        }
        _ => 0,
    };

    let early_leave = match last_out {
        Some(actual) if actual < sched_end - Duration::minutes(policy.grace_out_minutes) => {
            (sched_end - actual).num_minutes()
        }
        _ => 0,
    };

    // Overtime accrues beyond the threshold, not from the scheduled end.
    let overtime_from = sched_end + Duration::minutes(policy.overtime_threshold_minutes);
    let overtime = match last_out {
        Some(actual) if actual > overtime_from => (actual - overtime_from).num_minutes(),
        _ => 0,
    };

    let night: i64 = pairing
        .sessions
        .iter()
        .filter(|s| s.is_complete())
        .map(|s| {
            night_overlap_minutes(
                s.clock_in,
                s.clock_out.expect("session is complete"),
                policy.night_start_hour,
                policy.night_end_hour,
            )
        })
        .sum();

    let anomalous = late > policy.late_alert_minutes
        || overtime > policy.overtime_alert_minutes
        || early_leave > policy.early_leave_alert_minutes;

    DayMetrics {
        status: if incomplete {
            DayStatus::Incomplete
        } else {
            DayStatus::Ok
        },
        scheduled_minutes: Some((sched_end - sched_start).num_minutes() as i32),
        worked_minutes: worked as i32,
        late_minutes: late.max(0) as i32,
        early_leave_minutes: early_leave.max(0) as i32,
        overtime_minutes: overtime.max(0) as i32,
        night_minutes: night as i32,
        holiday_minutes: 0,
        first_clock_in: first_in,
        last_clock_out: last_out,
        requires_approval: incomplete || anomalous,
    }
}

fn scheduled_minutes(date: NaiveDate, schedule: &DaySchedule) -> i32 {
    let start = date.and_time(schedule.start);
    let end = if schedule.crosses_midnight() {
        date.and_time(schedule.end) + Duration::days(1)
    } else {
        date.and_time(schedule.end)
    };
    (end - start).num_minutes() as i32
}

// ---------------------------------------------------------------------------
// Rounding
// ---------------------------------------------------------------------------

/// Round `raw` minutes to the nearest multiple of `unit`, half-up on the
/// quotient. A unit of zero or one leaves the value untouched.
pub fn round_half_up(raw: i64, unit: i64) -> i64 {
    if unit <= 1 || raw <= 0 {
        return raw.max(0);
    }
    ((2 * raw + unit) / (2 * unit)) * unit
}

// ---------------------------------------------------------------------------
// Night window
// ---------------------------------------------------------------------------

/// Minutes of `[clock_in, clock_out)` that fall inside the night window,
/// walked in hour-aligned segments so a window crossing midnight is summed
/// correctly across day boundaries.
pub fn night_overlap_minutes(
    clock_in: NaiveDateTime,
    clock_out: NaiveDateTime,
    night_start_hour: u32,
    night_end_hour: u32,
) -> i64 {
    if clock_out <= clock_in || night_start_hour == night_end_hour {
        return 0;
    }

    let mut total = 0;
    let mut cursor = clock_in;
    while cursor < clock_out {
        let next_hour = hour_floor(cursor) + Duration::hours(1);
        let segment_end = next_hour.min(clock_out);
        if hour_in_night_window(cursor.hour(), night_start_hour, night_end_hour) {
            total += (segment_end - cursor).num_minutes();
        }
        cursor = segment_end;
    }
    total
}

fn hour_in_night_window(hour: u32, start: u32, end: u32) -> bool {
    if start < end {
        hour >= start && hour < end
    } else {
        hour >= start || hour < end
    }
}

fn hour_floor(t: NaiveDateTime) -> NaiveDateTime {
    t.date()
        .and_hms_opt(t.hour(), 0, 0)
        .expect("hour of an existing timestamp is always valid")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{pair_sessions, Punch};

    fn policy() -> ReconcilePolicy {
        ReconcilePolicy::default()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn t(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    fn dt(day_offset: i64, hour: u32, minute: u32) -> NaiveDateTime {
        (date() + Duration::days(day_offset))
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn day_shift() -> DaySchedule {
        DaySchedule {
            start: t(9, 0),
            end: t(18, 0),
        }
    }

    fn night_shift() -> DaySchedule {
        DaySchedule {
            start: t(22, 0),
            end: t(6, 0),
        }
    }

    fn paired(punches: &[Punch]) -> Pairing {
        pair_sessions(punches)
    }

    // -- the worked example ---------------------------------------------------

    #[test]
    fn grace_and_overtime_worked_example() {
        // 09:00-18:00, grace-in 15, grace-out 15, overtime threshold 30,
        // rounding 5; actual 09:20-18:50.
        let pairing = paired(&[
            Punch::clock_in(dt(0, 9, 20)),
            Punch::clock_out(dt(0, 18, 50)),
        ]);
        let m = compute_day(&policy(), date(), Some(&day_shift()), false, false, &pairing);

        assert_eq!(m.status, DayStatus::Ok);
        assert_eq!(m.late_minutes, 20);
        assert_eq!(m.early_leave_minutes, 0);
        assert_eq!(m.overtime_minutes, 20);
        assert_eq!(m.worked_minutes, 570);
        assert_eq!(m.scheduled_minutes, Some(540));
    }

    // -- lateness -------------------------------------------------------------

    #[test]
    fn arrival_within_grace_is_not_late() {
        let pairing = paired(&[
            Punch::clock_in(dt(0, 9, 10)),
            Punch::clock_out(dt(0, 18, 0)),
        ]);
        let m = compute_day(&policy(), date(), Some(&day_shift()), false, false, &pairing);
        assert_eq!(m.late_minutes, 0);
    }

    #[test]
    fn arrival_at_grace_boundary_is_not_late() {
        let pairing = paired(&[
            Punch::clock_in(dt(0, 9, 15)),
            Punch::clock_out(dt(0, 18, 0)),
        ]);
        let m = compute_day(&policy(), date(), Some(&day_shift()), false, false, &pairing);
        assert_eq!(m.late_minutes, 0);
    }

    #[test]
    fn late_minutes_measure_from_scheduled_start() {
        let pairing = paired(&[
            Punch::clock_in(dt(0, 9, 16)),
            Punch::clock_out(dt(0, 18, 0)),
        ]);
        let m = compute_day(&policy(), date(), Some(&day_shift()), false, false, &pairing);
        assert_eq!(m.late_minutes, 16);
    }

    // -- early leave ----------------------------------------------------------

    #[test]
    fn early_leave_measures_from_scheduled_end() {
        let pairing = paired(&[
            Punch::clock_in(dt(0, 9, 0)),
            Punch::clock_out(dt(0, 17, 30)),
        ]);
        let m = compute_day(&policy(), date(), Some(&day_shift()), false, false, &pairing);
        assert_eq!(m.early_leave_minutes, 30);
    }

    #[test]
    fn departure_within_grace_is_not_early() {
        let pairing = paired(&[
            Punch::clock_in(dt(0, 9, 0)),
            Punch::clock_out(dt(0, 17, 50)),
        ]);
        let m = compute_day(&policy(), date(), Some(&day_shift()), false, false, &pairing);
        assert_eq!(m.early_leave_minutes, 0);
    }

    // -- overtime -------------------------------------------------------------

    #[test]
    fn departure_inside_threshold_earns_no_overtime() {
        let pairing = paired(&[
            Punch::clock_in(dt(0, 9, 0)),
            Punch::clock_out(dt(0, 18, 25)),
        ]);
        let m = compute_day(&policy(), date(), Some(&day_shift()), false, false, &pairing);
        assert_eq!(m.overtime_minutes, 0);
    }

    // -- cross-midnight shift -------------------------------------------------

    #[test]
    fn cross_midnight_shift_has_no_negative_durations() {
        // 22:00-06:00 schedule, clock-out 06:10 the next day. The end is
        // shifted +1 day, so this is 10 minutes past end, inside the
        // 30-minute overtime threshold, not a negative duration.
        let pairing = paired(&[
            Punch::clock_in(dt(0, 22, 0)),
            Punch::clock_out(dt(1, 6, 10)),
        ]);
        let m = compute_day(&policy(), date(), Some(&night_shift()), false, false, &pairing);

        assert_eq!(m.status, DayStatus::Ok);
        assert_eq!(m.scheduled_minutes, Some(480));
        assert_eq!(m.overtime_minutes, 0);
        assert_eq!(m.early_leave_minutes, 0);
        assert_eq!(m.worked_minutes, 490);
    }

    #[test]
    fn cross_midnight_overtime_measures_beyond_shifted_threshold() {
        let pairing = paired(&[
            Punch::clock_in(dt(0, 22, 0)),
            Punch::clock_out(dt(1, 7, 0)),
        ]);
        let m = compute_day(&policy(), date(), Some(&night_shift()), false, false, &pairing);
        // Threshold is 06:30 next day; 07:00 is 30 minutes past it.
        assert_eq!(m.overtime_minutes, 30);
    }

    #[test]
    fn cross_midnight_early_leave() {
        let pairing = paired(&[
            Punch::clock_in(dt(0, 22, 0)),
            Punch::clock_out(dt(1, 5, 0)),
        ]);
        let m = compute_day(&policy(), date(), Some(&night_shift()), false, false, &pairing);
        assert_eq!(m.early_leave_minutes, 60);
    }

    // -- night minutes --------------------------------------------------------

    #[test]
    fn night_overlap_before_midnight() {
        assert_eq!(night_overlap_minutes(dt(0, 21, 0), dt(0, 23, 30), 22, 6), 90);
    }

    #[test]
    fn night_overlap_after_midnight() {
        assert_eq!(night_overlap_minutes(dt(0, 5, 0), dt(0, 7, 0), 22, 6), 60);
    }

    #[test]
    fn night_overlap_across_midnight() {
        assert_eq!(night_overlap_minutes(dt(0, 23, 0), dt(1, 2, 0), 22, 6), 180);
    }

    #[test]
    fn daytime_session_has_no_night_minutes() {
        assert_eq!(night_overlap_minutes(dt(0, 9, 0), dt(0, 18, 0), 22, 6), 0);
    }

    #[test]
    fn empty_night_window_disables_night_minutes() {
        assert_eq!(night_overlap_minutes(dt(0, 23, 0), dt(1, 2, 0), 0, 0), 0);
    }

    #[test]
    fn full_night_shift_accrues_night_minutes() {
        let pairing = paired(&[
            Punch::clock_in(dt(0, 22, 0)),
            Punch::clock_out(dt(1, 6, 0)),
        ]);
        let m = compute_day(&policy(), date(), Some(&night_shift()), false, false, &pairing);
        assert_eq!(m.night_minutes, 480);
    }

    // -- rounding -------------------------------------------------------------

    #[test]
    fn rounding_half_up() {
        assert_eq!(round_half_up(570, 5), 570);
        assert_eq!(round_half_up(572, 5), 570);
        assert_eq!(round_half_up(573, 5), 575);
        assert_eq!(round_half_up(8, 5), 10);
        assert_eq!(round_half_up(7, 5), 5);
    }

    #[test]
    fn rounding_exact_half_rounds_up() {
        assert_eq!(round_half_up(3, 2), 4);
        assert_eq!(round_half_up(1, 2), 2);
    }

    #[test]
    fn rounding_unit_one_is_identity() {
        assert_eq!(round_half_up(571, 1), 571);
        assert_eq!(round_half_up(571, 0), 571);
    }

    // -- classification -------------------------------------------------------

    #[test]
    fn scheduled_day_without_punches_is_missing() {
        let m = compute_day(
            &policy(),
            date(),
            Some(&day_shift()),
            false,
            false,
            &paired(&[]),
        );
        assert_eq!(m.status, DayStatus::Missing);
        assert_eq!(m.scheduled_minutes, Some(540));
        assert_eq!(m.worked_minutes, 0);
    }

    #[test]
    fn incomplete_session_flags_day_for_approval() {
        let pairing = paired(&[Punch::clock_in(dt(0, 9, 0))]);
        let m = compute_day(&policy(), date(), Some(&day_shift()), false, false, &pairing);
        assert_eq!(m.status, DayStatus::Incomplete);
        assert!(m.requires_approval);
    }

    #[test]
    fn holiday_work_is_tracked_separately() {
        let pairing = paired(&[
            Punch::clock_in(dt(0, 10, 0)),
            Punch::clock_out(dt(0, 14, 2)),
        ]);
        let m = compute_day(&policy(), date(), Some(&day_shift()), true, false, &pairing);

        assert_eq!(m.status, DayStatus::Holiday);
        assert_eq!(m.worked_minutes, 240);
        assert_eq!(m.holiday_minutes, 240);
        assert_eq!(m.late_minutes, 0);
        assert_eq!(m.overtime_minutes, 0);
        assert_eq!(m.scheduled_minutes, None);
    }

    #[test]
    fn holiday_without_punches_is_still_holiday() {
        let m = compute_day(&policy(), date(), None, true, false, &paired(&[]));
        assert_eq!(m.status, DayStatus::Holiday);
        assert_eq!(m.worked_minutes, 0);
    }

    #[test]
    fn weekend_without_schedule_counts_worked_only() {
        let pairing = paired(&[
            Punch::clock_in(dt(0, 10, 0)),
            Punch::clock_out(dt(0, 13, 0)),
        ]);
        let m = compute_day(&policy(), date(), None, false, true, &pairing);

        assert_eq!(m.status, DayStatus::Weekend);
        assert_eq!(m.worked_minutes, 180);
        assert_eq!(m.holiday_minutes, 0);
    }

    #[test]
    fn no_schedule_no_punches_is_absent() {
        let m = compute_day(&policy(), date(), None, false, false, &paired(&[]));
        assert_eq!(m.status, DayStatus::Absent);
    }

    #[test]
    fn no_schedule_with_punches_is_incomplete() {
        let pairing = paired(&[
            Punch::clock_in(dt(0, 10, 0)),
            Punch::clock_out(dt(0, 12, 0)),
        ]);
        let m = compute_day(&policy(), date(), None, false, false, &pairing);
        assert_eq!(m.status, DayStatus::Incomplete);
        assert_eq!(m.worked_minutes, 120);
        assert_eq!(m.late_minutes, 0);
        assert_eq!(m.scheduled_minutes, None);
    }

    #[test]
    fn weekend_with_schedule_is_a_regular_scheduled_day() {
        let pairing = paired(&[
            Punch::clock_in(dt(0, 9, 0)),
            Punch::clock_out(dt(0, 18, 0)),
        ]);
        let m = compute_day(&policy(), date(), Some(&day_shift()), false, true, &pairing);
        assert_eq!(m.status, DayStatus::Ok);
        assert_eq!(m.worked_minutes, 540);
    }

    // -- anomaly escalation ---------------------------------------------------

    #[test]
    fn excessive_lateness_escalates_for_approval() {
        let pairing = paired(&[
            Punch::clock_in(dt(0, 10, 1)),
            Punch::clock_out(dt(0, 18, 0)),
        ]);
        let m = compute_day(&policy(), date(), Some(&day_shift()), false, false, &pairing);
        assert_eq!(m.status, DayStatus::Ok);
        assert_eq!(m.late_minutes, 61);
        assert!(m.requires_approval);
    }

    #[test]
    fn excessive_overtime_escalates_for_approval() {
        let pairing = paired(&[
            Punch::clock_in(dt(0, 9, 0)),
            Punch::clock_out(dt(0, 21, 31)),
        ]);
        let m = compute_day(&policy(), date(), Some(&day_shift()), false, false, &pairing);
        // 21:31 is 181 minutes past the 18:30 threshold.
        assert_eq!(m.overtime_minutes, 181);
        assert!(m.requires_approval);
    }

    #[test]
    fn moderate_overtime_does_not_escalate() {
        let pairing = paired(&[
            Punch::clock_in(dt(0, 9, 0)),
            Punch::clock_out(dt(0, 19, 30)),
        ]);
        let m = compute_day(&policy(), date(), Some(&day_shift()), false, false, &pairing);
        assert_eq!(m.overtime_minutes, 30);
        assert!(!m.requires_approval);
    }

    // -- split shifts ---------------------------------------------------------

    #[test]
    fn split_shift_sums_both_sessions() {
        let pairing = paired(&[
            Punch::clock_in(dt(0, 9, 0)),
            Punch::clock_out(dt(0, 13, 0)),
            Punch::clock_in(dt(0, 14, 0)),
            Punch::clock_out(dt(0, 18, 0)),
        ]);
        let m = compute_day(&policy(), date(), Some(&day_shift()), false, false, &pairing);
        assert_eq!(m.status, DayStatus::Ok);
        assert_eq!(m.worked_minutes, 480);
        assert_eq!(m.first_clock_in, Some(dt(0, 9, 0)));
        assert_eq!(m.last_clock_out, Some(dt(0, 18, 0)));
    }
}
