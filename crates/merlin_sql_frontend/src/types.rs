use std::fmt;

use merlin_common::schema::TableSchema;

/// A fully bound and resolved statement ready for planning.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundStatement {
    Select(BoundSelect),
}

/// A bound SELECT. Column references in every expression are ordinals
/// into the combined row: base table columns first, then each joined
/// table's columns starting at its `col_offset`.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundSelect {
    pub base: TableSchema,
    pub joins: Vec<BoundJoin>,
    pub filter: Option<BoundExpr>,
    pub projections: Vec<BoundProjection>,
    /// Grouping columns as combined-row ordinals, in declaration order.
    pub group_by: Vec<usize>,
    pub order_by: Vec<BoundOrderBy>,
    pub limit: Option<LimitValue>,
    pub offset: Option<LimitValue>,
    pub distinct: bool,
}

impl BoundSelect {
    /// Total width of the combined row.
    pub fn combined_width(&self) -> usize {
        self.base.num_columns()
            + self.joins.iter().map(|j| j.table.num_columns()).sum::<usize>()
    }

    /// Resolve a combined-row ordinal to the table it comes from and
    /// the column index local to that table.
    pub fn resolve_column(&self, idx: usize) -> Option<(&TableSchema, usize)> {
        if idx < self.base.num_columns() {
            return Some((&self.base, idx));
        }
        for join in &self.joins {
            if idx >= join.col_offset && idx < join.col_offset + join.table.num_columns() {
                return Some((&join.table, idx - join.col_offset));
            }
        }
        None
    }

    /// Name of a combined-row column.
    pub fn column_name(&self, idx: usize) -> Option<&str> {
        self.resolve_column(idx)
            .map(|(table, local)| table.columns[local].name.as_str())
    }

    /// Whether this select aggregates (explicit GROUP BY or any
    /// aggregate in the projection list).
    pub fn is_aggregating(&self) -> bool {
        !self.group_by.is_empty()
            || self
                .projections
                .iter()
                .any(|p| matches!(p, BoundProjection::Aggregate { .. }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundJoin {
    pub join_type: JoinType,
    pub table: TableSchema,
    /// Offset of this table's columns in the combined row.
    pub col_offset: usize,
    pub condition: Option<BoundExpr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

impl JoinType {
    pub fn name(&self) -> &'static str {
        match self {
            JoinType::Inner => "inner",
            JoinType::Left => "left",
        }
    }
}

/// One output column of a SELECT. `alias` is `None` for anonymous
/// computed columns; each planner assigns its own positional name to
/// those.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundProjection {
    Expr {
        expr: BoundExpr,
        alias: Option<String>,
    },
    Aggregate {
        func: AggFunc,
        arg: Option<BoundExpr>,
        alias: Option<String>,
    },
}

impl BoundProjection {
    pub fn alias(&self) -> Option<&str> {
        match self {
            BoundProjection::Expr { alias, .. } => alias.as_deref(),
            BoundProjection::Aggregate { alias, .. } => alias.as_deref(),
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, BoundProjection::Aggregate { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    Count,
    Sum,
    Min,
    Max,
}

impl AggFunc {
    pub fn name(&self) -> &'static str {
        match self {
            AggFunc::Count => "COUNT",
            AggFunc::Sum => "SUM",
            AggFunc::Min => "MIN",
            AggFunc::Max => "MAX",
        }
    }
}

/// Sort key. For plain selects `column` is a combined-row ordinal; for
/// aggregating selects it is an ordinal into the output row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundOrderBy {
    pub column: usize,
    pub asc: bool,
}

/// LIMIT / OFFSET operand: a literal count or a `?` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitValue {
    Count(u64),
    Parameter(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Integer(v) => write!(f, "{}", v),
            Literal::Float(v) => write!(f, "{}", v),
            Literal::String(s) => write!(f, "'{}'", s),
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::Null => write!(f, "NULL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Multiply,
    Divide,
    And,
    Or,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Eq => "=",
            BinOp::NotEq => "<>",
            BinOp::Lt => "<",
            BinOp::LtEq => "<=",
            BinOp::Gt => ">",
            BinOp::GtEq => ">=",
            BinOp::Plus => "+",
            BinOp::Minus => "-",
            BinOp::Multiply => "*",
            BinOp::Divide => "/",
            BinOp::And => "AND",
            BinOp::Or => "OR",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::NotEq | BinOp::Lt | BinOp::LtEq | BinOp::Gt | BinOp::GtEq
        )
    }
}

/// Bound expression tree. Column references are combined-row ordinals.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundExpr {
    ColumnRef(usize),
    Literal(Literal),
    /// `?` placeholder, numbered left to right across the statement.
    Parameter(usize),
    BinaryOp {
        left: Box<BoundExpr>,
        op: BinOp,
        right: Box<BoundExpr>,
    },
    Not(Box<BoundExpr>),
    IsNull(Box<BoundExpr>),
    IsNotNull(Box<BoundExpr>),
}
