use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{SqlError, SqlResult};
use crate::types::{ColumnId, DataType, TableId};

/// How a table's rows are distributed across partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PartitioningPolicy {
    /// Hash-partitioned on the declared partition column. Touching such
    /// a table is multi-partition work unless the statement pins the
    /// partition column to a single value.
    Hash,
    /// Reference table: fully replicated on every partition.
    Reference,
    /// No partitioning declared (single-site table).
    #[default]
    None,
}

/// Column definition in a table schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub id: ColumnId,
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

/// Table schema metadata, including the partitioning declaration the
/// routing inference in both planners works from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub id: TableId,
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub partitioning: PartitioningPolicy,
    /// Index into `columns` of the partition column (Hash tables only).
    pub partition_column: Option<usize>,
}

impl TableSchema {
    pub fn new(id: TableId, name: impl Into<String>) -> Self {
        TableSchema {
            id,
            name: name.into(),
            columns: Vec::new(),
            partitioning: PartitioningPolicy::None,
            partition_column: None,
        }
    }

    /// Find column index by name (case-insensitive).
    pub fn find_column(&self, name: &str) -> Option<usize> {
        let lower = name.to_lowercase();
        self.columns.iter().position(|c| c.name.to_lowercase() == lower)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Whether this table is hash-partitioned.
    pub fn is_partitioned(&self) -> bool {
        self.partitioning == PartitioningPolicy::Hash
    }

    /// Whether every partition holds a full copy of this table.
    pub fn is_replicated(&self) -> bool {
        matches!(
            self.partitioning,
            PartitioningPolicy::Reference | PartitioningPolicy::None
        )
    }
}

/// In-memory catalog of table schemas, keyed by lowercase table name.
/// Loaded once per process from the DDL file and shared (read-only)
/// across every statement of a batch.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tables: HashMap<String, TableSchema>,
    next_table_id: u64,
}

impl Catalog {
    pub fn new() -> Self {
        Catalog {
            tables: HashMap::new(),
            next_table_id: 1,
        }
    }

    pub fn next_table_id(&mut self) -> TableId {
        let id = TableId(self.next_table_id);
        self.next_table_id += 1;
        id
    }

    pub fn add_table(&mut self, schema: TableSchema) -> SqlResult<()> {
        let key = schema.name.to_lowercase();
        if self.tables.contains_key(&key) {
            return Err(SqlError::catalog(format!(
                "table '{}' already exists",
                schema.name
            )));
        }
        self.tables.insert(key, schema);
        Ok(())
    }

    pub fn find_table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(&name.to_lowercase())
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn list_tables(&self) -> Vec<&TableSchema> {
        self.tables.values().collect()
    }

    /// Apply a `PARTITION TABLE t ON COLUMN c` declaration.
    pub fn set_partitioning(&mut self, table: &str, column: &str) -> SqlResult<()> {
        let schema = self
            .tables
            .get_mut(&table.to_lowercase())
            .ok_or_else(|| SqlError::catalog(format!("unknown table '{}'", table)))?;
        let col_idx = schema.find_column(column).ok_or_else(|| {
            SqlError::catalog(format!(
                "unknown column '{}' in table '{}'",
                column, schema.name
            ))
        })?;
        schema.partitioning = PartitioningPolicy::Hash;
        schema.partition_column = Some(col_idx);
        Ok(())
    }
}
