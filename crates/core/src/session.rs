//! Punch-to-session pairing.
//!
//! Pure function over one user's chronologically ordered punches for a
//! single local day. The tie-break is deliberate: a clock-in that arrives
//! while a session is still open closes the previous session as incomplete
//! instead of dropping either punch, because an incomplete session is what
//! flags the whole day for review.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Punch
// ---------------------------------------------------------------------------

/// Direction of a raw punch from a terminal device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PunchDirection {
    In,
    Out,
}

/// One raw punch, in device-local time.
#[derive(Debug, Clone, Copy)]
pub struct Punch {
    pub at: NaiveDateTime,
    pub direction: PunchDirection,
}

impl Punch {
    pub fn clock_in(at: NaiveDateTime) -> Self {
        Self {
            at,
            direction: PunchDirection::In,
        }
    }

    pub fn clock_out(at: NaiveDateTime) -> Self {
        Self {
            at,
            direction: PunchDirection::Out,
        }
    }
}

// ---------------------------------------------------------------------------
// WorkSession
// ---------------------------------------------------------------------------

/// One clock-in paired with its clock-out, or left incomplete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkSession {
    pub clock_in: NaiveDateTime,
    pub clock_out: Option<NaiveDateTime>,
}

impl WorkSession {
    pub fn is_complete(&self) -> bool {
        self.clock_out.is_some()
    }

    /// Session length in whole minutes. Incomplete or inverted sessions
    /// contribute zero.
    pub fn length_minutes(&self) -> i64 {
        match self.clock_out {
            Some(out) if out > self.clock_in => (out - self.clock_in).num_minutes(),
            _ => 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Pairing
// ---------------------------------------------------------------------------

/// Result of pairing a day's punches.
#[derive(Debug, Clone, Default)]
pub struct Pairing {
    /// Sessions in chronological order of their clock-in.
    pub sessions: Vec<WorkSession>,
    /// Clock-outs that arrived with no open session. These never happen on
    /// healthy devices; the count is surfaced in the processing log.
    pub unmatched_out_count: usize,
}

impl Pairing {
    pub fn has_incomplete_session(&self) -> bool {
        self.sessions.iter().any(|s| !s.is_complete())
    }

    pub fn punch_count(&self) -> usize {
        self.sessions
            .iter()
            .map(|s| if s.is_complete() { 2 } else { 1 })
            .sum::<usize>()
            + self.unmatched_out_count
    }
}

/// Pair a chronologically ordered list of punches into work sessions.
///
/// - A clock-in opens a session.
/// - A clock-out closes the most recently opened, still-open session.
/// - A clock-in while a session is open closes the previous session as
///   incomplete (no clock-out) before opening the new one.
/// - A session still open at the end of the list stays incomplete.
pub fn pair_sessions(punches: &[Punch]) -> Pairing {
    let mut pairing = Pairing::default();
    let mut open: Option<WorkSession> = None;

    for punch in punches {
        match punch.direction {
            PunchDirection::In => {
                if let Some(previous) = open.take() {
                    // Close over drop: the earlier session stays, incomplete.
                    pairing.sessions.push(previous);
                }
                open = Some(WorkSession {
                    clock_in: punch.at,
                    clock_out: None,
                });
            }
            PunchDirection::Out => match open.take() {
                Some(mut session) => {
                    session.clock_out = Some(punch.at);
                    pairing.sessions.push(session);
                }
                None => pairing.unmatched_out_count += 1,
            },
        }
    }

    if let Some(trailing) = open {
        pairing.sessions.push(trailing);
    }

    pairing
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    // -- complete pairing -----------------------------------------------------

    #[test]
    fn two_in_out_pairs_yield_two_complete_sessions() {
        let punches = [
            Punch::clock_in(at(9, 0)),
            Punch::clock_out(at(13, 0)),
            Punch::clock_in(at(14, 0)),
            Punch::clock_out(at(18, 0)),
        ];
        let pairing = pair_sessions(&punches);

        assert_eq!(pairing.sessions.len(), 2);
        assert!(pairing.sessions.iter().all(|s| s.is_complete()));
        assert_eq!(pairing.sessions[0].clock_in, at(9, 0));
        assert_eq!(pairing.sessions[0].clock_out, Some(at(13, 0)));
        assert_eq!(pairing.sessions[1].clock_in, at(14, 0));
        assert_eq!(pairing.sessions[1].clock_out, Some(at(18, 0)));
    }

    #[test]
    fn single_pair() {
        let punches = [Punch::clock_in(at(9, 0)), Punch::clock_out(at(18, 0))];
        let pairing = pair_sessions(&punches);
        assert_eq!(pairing.sessions.len(), 1);
        assert_eq!(pairing.sessions[0].length_minutes(), 540);
    }

    // -- double clock-in tie-break --------------------------------------------

    #[test]
    fn double_clock_in_closes_first_as_incomplete() {
        let punches = [
            Punch::clock_in(at(9, 0)),
            Punch::clock_in(at(9, 5)),
            Punch::clock_out(at(18, 0)),
        ];
        let pairing = pair_sessions(&punches);

        assert_eq!(pairing.sessions.len(), 2);
        assert_eq!(pairing.sessions[0].clock_in, at(9, 0));
        assert_eq!(pairing.sessions[0].clock_out, None);
        assert_eq!(pairing.sessions[1].clock_in, at(9, 5));
        assert_eq!(pairing.sessions[1].clock_out, Some(at(18, 0)));
        assert!(pairing.has_incomplete_session());
    }

    // -- trailing open session ------------------------------------------------

    #[test]
    fn missing_final_out_leaves_session_incomplete() {
        let punches = [
            Punch::clock_in(at(9, 0)),
            Punch::clock_out(at(13, 0)),
            Punch::clock_in(at(14, 0)),
        ];
        let pairing = pair_sessions(&punches);

        assert_eq!(pairing.sessions.len(), 2);
        assert!(pairing.sessions[0].is_complete());
        assert!(!pairing.sessions[1].is_complete());
    }

    // -- unmatched outs -------------------------------------------------------

    #[test]
    fn leading_out_is_counted_not_paired() {
        let punches = [
            Punch::clock_out(at(0, 10)),
            Punch::clock_in(at(9, 0)),
            Punch::clock_out(at(18, 0)),
        ];
        let pairing = pair_sessions(&punches);

        assert_eq!(pairing.unmatched_out_count, 1);
        assert_eq!(pairing.sessions.len(), 1);
        assert!(pairing.sessions[0].is_complete());
    }

    // -- empty input ----------------------------------------------------------

    #[test]
    fn no_punches_no_sessions() {
        let pairing = pair_sessions(&[]);
        assert!(pairing.sessions.is_empty());
        assert_eq!(pairing.unmatched_out_count, 0);
        assert!(!pairing.has_incomplete_session());
    }

    // -- session length -------------------------------------------------------

    #[test]
    fn incomplete_session_has_zero_length() {
        let session = WorkSession {
            clock_in: at(9, 0),
            clock_out: None,
        };
        assert_eq!(session.length_minutes(), 0);
    }

    #[test]
    fn inverted_session_has_zero_length() {
        let session = WorkSession {
            clock_in: at(18, 0),
            clock_out: Some(at(9, 0)),
        };
        assert_eq!(session.length_minutes(), 0);
    }

    #[test]
    fn punch_count_counts_both_sides() {
        let punches = [
            Punch::clock_out(at(0, 10)),
            Punch::clock_in(at(9, 0)),
            Punch::clock_out(at(13, 0)),
            Punch::clock_in(at(14, 0)),
        ];
        let pairing = pair_sessions(&punches);
        assert_eq!(pairing.punch_count(), 4);
    }
}
