//! Shared foundation for the MerlinDB planner-migration tooling: error
//! types, scalar type ids, the table catalog, and the SQL batch splitter.

pub mod error;
pub mod schema;
pub mod split;
pub mod types;
