use serde::{Deserialize, Serialize};

/// Catalog-assigned table identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TableId(pub u64);

/// Column identifier within a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnId(pub u32);

/// Scalar column types understood by the frontend and planners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Integer,
    BigInt,
    Float,
    Varchar,
    Timestamp,
}

impl DataType {
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Boolean => "boolean",
            DataType::Integer => "integer",
            DataType::BigInt => "bigint",
            DataType::Float => "float",
            DataType::Varchar => "varchar",
            DataType::Timestamp => "timestamp",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_names() {
        assert_eq!(DataType::Integer.name(), "integer");
        assert_eq!(DataType::Varchar.name(), "varchar");
    }
}
