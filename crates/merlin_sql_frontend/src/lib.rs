//! SQL frontend shared by both planners: parsing, statement
//! classification, DDL loading, and name binding.

pub mod analysis;
pub mod binder;
pub mod ddl;
pub mod parser;
#[cfg(test)]
mod tests;
pub mod types;

pub use analysis::{collect_columns, combine_conjuncts, remap_columns, split_conjuncts};
pub use binder::Binder;
pub use ddl::load_schema;
pub use parser::{
    classify, parse_one, parse_partition_directive, PartitionDirective, StatementKind,
};
pub use types::*;
