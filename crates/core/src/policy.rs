//! Reconciliation policy configuration.
//!
//! All time-math knobs live in one immutable struct that is constructed
//! once (from the environment or a test literal) and passed into the
//! reconciler. Nothing in the time math reads the process environment at
//! call time, which keeps the computation deterministic and testable with
//! varied configurations.

/// Grace, rounding, overtime, and night-window policy for a deployment.
///
/// Grace-in, grace-out, and the overtime threshold are three independent
/// values; no symmetry between them is assumed anywhere.
#[derive(Debug, Clone)]
pub struct ReconcilePolicy {
    /// Minutes after scheduled start within which arrival is not late.
    pub grace_in_minutes: i64,
    /// Minutes before scheduled end within which departure is not early.
    pub grace_out_minutes: i64,
    /// Minutes past scheduled end before overtime starts accruing.
    pub overtime_threshold_minutes: i64,
    /// Worked minutes are rounded to the nearest multiple of this unit.
    pub rounding_minutes: i64,
    /// Hour (0-23) at which the night-shift window opens.
    pub night_start_hour: u32,
    /// Hour (0-23) at which the night-shift window closes.
    pub night_end_hour: u32,
    /// Lateness above this many minutes escalates the record for approval.
    pub late_alert_minutes: i64,
    /// Overtime above this many minutes escalates the record for approval.
    pub overtime_alert_minutes: i64,
    /// Early leave above this many minutes escalates the record for approval.
    pub early_leave_alert_minutes: i64,
    /// Upper bound on events considered for a single day's reconciliation.
    pub max_events_per_day: i64,
    /// UTC offset applied to device timestamps that carry no offset of
    /// their own.
    pub default_utc_offset_minutes: i32,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            grace_in_minutes: 15,
            grace_out_minutes: 15,
            overtime_threshold_minutes: 30,
            rounding_minutes: 5,
            night_start_hour: 22,
            night_end_hour: 6,
            late_alert_minutes: 60,
            overtime_alert_minutes: 180,
            early_leave_alert_minutes: 60,
            max_events_per_day: 200,
            default_utc_offset_minutes: 0,
        }
    }
}

impl ReconcilePolicy {
    /// Load the policy from environment variables with defaults.
    ///
    /// | Env Var                     | Default |
    /// |-----------------------------|---------|
    /// | `GRACE_IN_MINUTES`          | `15`    |
    /// | `GRACE_OUT_MINUTES`         | `15`    |
    /// | `OVERTIME_THRESHOLD_MINUTES`| `30`    |
    /// | `ROUNDING_MINUTES`          | `5`     |
    /// | `NIGHT_START_HOUR`          | `22`    |
    /// | `NIGHT_END_HOUR`            | `6`     |
    /// | `LATE_ALERT_MINUTES`        | `60`    |
    /// | `OVERTIME_ALERT_MINUTES`    | `180`   |
    /// | `EARLY_LEAVE_ALERT_MINUTES` | `60`    |
    /// | `MAX_EVENTS_PER_DAY`        | `200`   |
    /// | `DEFAULT_UTC_OFFSET_MINUTES`| `0`     |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            grace_in_minutes: env_i64("GRACE_IN_MINUTES", defaults.grace_in_minutes),
            grace_out_minutes: env_i64("GRACE_OUT_MINUTES", defaults.grace_out_minutes),
            overtime_threshold_minutes: env_i64(
                "OVERTIME_THRESHOLD_MINUTES",
                defaults.overtime_threshold_minutes,
            ),
            rounding_minutes: env_i64("ROUNDING_MINUTES", defaults.rounding_minutes),
            night_start_hour: env_u32("NIGHT_START_HOUR", defaults.night_start_hour),
            night_end_hour: env_u32("NIGHT_END_HOUR", defaults.night_end_hour),
            late_alert_minutes: env_i64("LATE_ALERT_MINUTES", defaults.late_alert_minutes),
            overtime_alert_minutes: env_i64(
                "OVERTIME_ALERT_MINUTES",
                defaults.overtime_alert_minutes,
            ),
            early_leave_alert_minutes: env_i64(
                "EARLY_LEAVE_ALERT_MINUTES",
                defaults.early_leave_alert_minutes,
            ),
            max_events_per_day: env_i64("MAX_EVENTS_PER_DAY", defaults.max_events_per_day),
            default_utc_offset_minutes: env_i32(
                "DEFAULT_UTC_OFFSET_MINUTES",
                defaults.default_utc_offset_minutes,
            ),
        }
    }
}

fn env_i64(name: &str, default: i64) -> i64 {
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .unwrap_or_else(|_| panic!("{name} must be a valid integer")),
        Err(_) => default,
    }
}

fn env_i32(name: &str, default: i32) -> i32 {
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .unwrap_or_else(|_| panic!("{name} must be a valid integer")),
        Err(_) => default,
    }
}

fn env_u32(name: &str, default: u32) -> u32 {
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .unwrap_or_else(|_| panic!("{name} must be a valid unsigned integer")),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_grace_values_are_independent() {
        let policy = ReconcilePolicy::default();
        assert_eq!(policy.grace_in_minutes, 15);
        assert_eq!(policy.grace_out_minutes, 15);
        assert_eq!(policy.overtime_threshold_minutes, 30);
    }

    #[test]
    fn default_night_window_crosses_midnight() {
        let policy = ReconcilePolicy::default();
        assert!(policy.night_start_hour > policy.night_end_hour);
    }

    #[test]
    fn default_rounding_unit() {
        assert_eq!(ReconcilePolicy::default().rounding_minutes, 5);
    }

    #[test]
    fn default_alert_thresholds() {
        let policy = ReconcilePolicy::default();
        assert_eq!(policy.late_alert_minutes, 60);
        assert_eq!(policy.overtime_alert_minutes, 180);
        assert_eq!(policy.early_leave_alert_minutes, 60);
    }
}
