//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts
//! - Query parameter structs for list endpoints

pub mod event;
pub mod job;
pub mod mapping;
pub mod processing_log;
pub mod record;
pub mod status;
