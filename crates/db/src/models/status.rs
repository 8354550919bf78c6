//! Status helper enums mapping to SMALLINT columns.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding `*_statuses` database table.

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// Attendance event processing status.
    EventStatus {
        /// Persisted, identity not yet attached (no terminal user id).
        Pending = 1,
        /// Identity resolved; contributes to reconciliation.
        Processed = 2,
        /// A reconciliation run over this event failed.
        Failed = 3,
        /// Terminal user id carried no active mapping; awaiting manual
        /// resolution.
        Quarantined = 4,
    }
}

define_status_enum! {
    /// Daily attendance record classification.
    RecordStatus {
        Ok = 1,
        Missing = 2,
        Incomplete = 3,
        Absent = 4,
        Holiday = 5,
        Weekend = 6,
    }
}

define_status_enum! {
    /// Reconciliation job execution status.
    JobStatus {
        Pending = 1,
        Running = 2,
        Completed = 3,
        Failed = 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_status_ids_match_seed_data() {
        assert_eq!(EventStatus::Pending.id(), 1);
        assert_eq!(EventStatus::Processed.id(), 2);
        assert_eq!(EventStatus::Failed.id(), 3);
        assert_eq!(EventStatus::Quarantined.id(), 4);
    }

    #[test]
    fn record_status_ids_match_seed_data() {
        assert_eq!(RecordStatus::Ok.id(), 1);
        assert_eq!(RecordStatus::Missing.id(), 2);
        assert_eq!(RecordStatus::Incomplete.id(), 3);
        assert_eq!(RecordStatus::Absent.id(), 4);
        assert_eq!(RecordStatus::Holiday.id(), 5);
        assert_eq!(RecordStatus::Weekend.id(), 6);
    }

    #[test]
    fn job_status_ids_match_seed_data() {
        assert_eq!(JobStatus::Pending.id(), 1);
        assert_eq!(JobStatus::Running.id(), 2);
        assert_eq!(JobStatus::Completed.id(), 3);
        assert_eq!(JobStatus::Failed.id(), 4);
    }

    #[test]
    fn status_into_status_id() {
        let id: StatusId = EventStatus::Quarantined.into();
        assert_eq!(id, 4);
    }
}
