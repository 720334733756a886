use merlin_common::error::{SqlError, SqlResult};
use merlin_common::schema::{Catalog, TableSchema};
use sqlparser::ast::{self, Expr, SelectItem, SetExpr, Statement, Value};

use crate::types::*;

/// One table visible to name resolution: its alias (or name), schema,
/// and column offset in the combined row.
struct ScopeEntry {
    alias: String,
    table: TableSchema,
    offset: usize,
}

/// The binder resolves names against the catalog, producing bound
/// statements. `?` placeholders are numbered left to right in clause
/// order: select list, join conditions, WHERE, LIMIT, OFFSET.
pub struct Binder<'a> {
    catalog: &'a Catalog,
    next_param: usize,
}

impl<'a> Binder<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Binder {
            catalog,
            next_param: 0,
        }
    }

    pub fn bind(&mut self, stmt: &Statement) -> SqlResult<BoundStatement> {
        self.next_param = 0;
        match stmt {
            Statement::Query(query) => Ok(BoundStatement::Select(self.bind_query(query)?)),
            _ => Err(SqlError::bind("only SELECT statements can be bound")),
        }
    }

    fn bind_query(&mut self, query: &ast::Query) -> SqlResult<BoundSelect> {
        if query.with.is_some() {
            return Err(SqlError::bind("WITH clauses are not supported"));
        }
        let select = match query.body.as_ref() {
            SetExpr::Select(select) => select,
            SetExpr::SetOperation { .. } => {
                return Err(SqlError::bind("set operations are not supported"));
            }
            _ => return Err(SqlError::bind("unsupported query body")),
        };

        let distinct = match &select.distinct {
            None => false,
            Some(ast::Distinct::Distinct) => true,
            Some(ast::Distinct::On(_)) => {
                return Err(SqlError::bind("DISTINCT ON is not supported"));
            }
        };
        if select.having.is_some() {
            return Err(SqlError::bind("HAVING is not supported"));
        }

        // Resolve the FROM chain structurally first so every table is
        // in scope, then bind expressions in textual clause order.
        let from = match select.from.as_slice() {
            [single] => single,
            [] => return Err(SqlError::bind("FROM clause is required")),
            _ => return Err(SqlError::bind("comma join syntax is not supported")),
        };
        let (base, base_alias) = self.resolve_table(&from.relation)?;
        let mut scope = vec![ScopeEntry {
            alias: base_alias,
            table: base.clone(),
            offset: 0,
        }];
        let mut width = base.num_columns();

        struct PendingJoin<'q> {
            join_type: JoinType,
            table: TableSchema,
            col_offset: usize,
            on: Option<&'q Expr>,
        }
        let mut pending: Vec<PendingJoin> = Vec::new();
        for join in &from.joins {
            let (table, alias) = self.resolve_table(&join.relation)?;
            if scope.iter().any(|e| e.alias == alias) {
                return Err(SqlError::bind(format!("duplicate table alias '{}'", alias)));
            }
            let (join_type, on) = match &join.join_operator {
                ast::JoinOperator::Inner(constraint) => {
                    (JoinType::Inner, Self::on_condition(constraint)?)
                }
                ast::JoinOperator::LeftOuter(constraint) => {
                    (JoinType::Left, Self::on_condition(constraint)?)
                }
                ast::JoinOperator::CrossJoin => (JoinType::Inner, None),
                ast::JoinOperator::RightOuter(_) => {
                    return Err(SqlError::bind("RIGHT JOIN is not supported"));
                }
                ast::JoinOperator::FullOuter(_) => {
                    return Err(SqlError::bind("FULL JOIN is not supported"));
                }
                _ => return Err(SqlError::bind("unsupported join type")),
            };
            let col_offset = width;
            width += table.num_columns();
            scope.push(ScopeEntry {
                alias,
                table: table.clone(),
                offset: col_offset,
            });
            pending.push(PendingJoin {
                join_type,
                table,
                col_offset,
                on,
            });
        }

        let projections = self.bind_projections(&select.projection, &scope)?;

        let mut joins = Vec::with_capacity(pending.len());
        for p in pending {
            let condition = p.on.map(|e| self.bind_expr(e, &scope)).transpose()?;
            joins.push(BoundJoin {
                join_type: p.join_type,
                table: p.table,
                col_offset: p.col_offset,
                condition,
            });
        }

        let filter = select
            .selection
            .as_ref()
            .map(|e| self.bind_expr(e, &scope))
            .transpose()?;

        let group_by = self.bind_group_by(&select.group_by, &projections, &scope)?;

        let mut bound = BoundSelect {
            base,
            joins,
            filter,
            projections,
            group_by,
            order_by: Vec::new(),
            limit: None,
            offset: None,
            distinct,
        };
        self.check_aggregation(&bound)?;

        if let Some(order_by) = &query.order_by {
            for key in &order_by.exprs {
                bound.order_by.push(self.resolve_order_key(key, &bound, &scope)?);
            }
        }
        bound.limit = query
            .limit
            .as_ref()
            .map(|e| self.bind_limit_value(e, "LIMIT"))
            .transpose()?;
        bound.offset = query
            .offset
            .as_ref()
            .map(|o| self.bind_limit_value(&o.value, "OFFSET"))
            .transpose()?;

        Ok(bound)
    }

    fn on_condition(constraint: &ast::JoinConstraint) -> SqlResult<Option<&Expr>> {
        match constraint {
            ast::JoinConstraint::On(expr) => Ok(Some(expr)),
            ast::JoinConstraint::None => Ok(None),
            ast::JoinConstraint::Using(_) => Err(SqlError::bind("JOIN USING is not supported")),
            ast::JoinConstraint::Natural => Err(SqlError::bind("NATURAL JOIN is not supported")),
        }
    }

    fn resolve_table(&self, relation: &ast::TableFactor) -> SqlResult<(TableSchema, String)> {
        match relation {
            ast::TableFactor::Table {
                name,
                alias,
                args: None,
                ..
            } => {
                let table_name = name.to_string();
                let schema = self
                    .catalog
                    .find_table(&table_name)
                    .ok_or_else(|| SqlError::bind(format!("unknown table '{}'", table_name)))?
                    .clone();
                let alias = alias
                    .as_ref()
                    .map(|a| a.name.value.to_lowercase())
                    .unwrap_or_else(|| table_name.to_lowercase());
                Ok((schema, alias))
            }
            ast::TableFactor::Derived { .. } => {
                Err(SqlError::bind("subqueries in FROM are not supported"))
            }
            _ => Err(SqlError::bind("unsupported FROM source")),
        }
    }

    fn bind_projections(
        &mut self,
        items: &[SelectItem],
        scope: &[ScopeEntry],
    ) -> SqlResult<Vec<BoundProjection>> {
        let mut projections = Vec::new();
        for item in items {
            match item {
                SelectItem::Wildcard(_) => {
                    for entry in scope {
                        for (i, col) in entry.table.columns.iter().enumerate() {
                            projections.push(BoundProjection::Expr {
                                expr: BoundExpr::ColumnRef(entry.offset + i),
                                alias: Some(col.name.clone()),
                            });
                        }
                    }
                }
                SelectItem::QualifiedWildcard(name, _) => {
                    let qualifier = name.to_string().to_lowercase();
                    let entry = scope
                        .iter()
                        .find(|e| e.alias == qualifier)
                        .ok_or_else(|| {
                            SqlError::bind(format!("unknown table or alias '{}'", qualifier))
                        })?;
                    for (i, col) in entry.table.columns.iter().enumerate() {
                        projections.push(BoundProjection::Expr {
                            expr: BoundExpr::ColumnRef(entry.offset + i),
                            alias: Some(col.name.clone()),
                        });
                    }
                }
                SelectItem::UnnamedExpr(expr) => {
                    projections.push(self.bind_projection_expr(expr, None, scope)?);
                }
                SelectItem::ExprWithAlias { expr, alias } => {
                    projections.push(self.bind_projection_expr(
                        expr,
                        Some(alias.value.clone()),
                        scope,
                    )?);
                }
            }
        }
        if projections.is_empty() {
            return Err(SqlError::bind("empty select list"));
        }
        Ok(projections)
    }

    fn bind_projection_expr(
        &mut self,
        expr: &Expr,
        alias: Option<String>,
        scope: &[ScopeEntry],
    ) -> SqlResult<BoundProjection> {
        if let Expr::Function(func) = expr {
            return self.bind_aggregate(func, alias, scope);
        }
        let bound = self.bind_expr(expr, scope)?;
        // Plain column references inherit the declared column name.
        let alias = match (&bound, alias) {
            (_, Some(explicit)) => Some(explicit),
            (BoundExpr::ColumnRef(idx), None) => {
                Some(Self::column_name(scope, *idx).to_string())
            }
            (_, None) => None,
        };
        Ok(BoundProjection::Expr { expr: bound, alias })
    }

    fn bind_aggregate(
        &mut self,
        func: &ast::Function,
        alias: Option<String>,
        scope: &[ScopeEntry],
    ) -> SqlResult<BoundProjection> {
        let func_name = func.name.to_string().to_uppercase();
        let agg = match func_name.as_str() {
            "COUNT" => AggFunc::Count,
            "SUM" => AggFunc::Sum,
            "MIN" => AggFunc::Min,
            "MAX" => AggFunc::Max,
            other => {
                return Err(SqlError::bind(format!("unsupported function '{}'", other)));
            }
        };
        if func.over.is_some() {
            return Err(SqlError::bind("window functions are not supported"));
        }
        if func.filter.is_some() {
            return Err(SqlError::bind("aggregate FILTER is not supported"));
        }
        let arg = match &func.args {
            ast::FunctionArguments::List(args) => {
                if matches!(
                    args.duplicate_treatment,
                    Some(ast::DuplicateTreatment::Distinct)
                ) {
                    return Err(SqlError::bind("DISTINCT aggregates are not supported"));
                }
                match args.args.as_slice() {
                    [] => None,
                    [ast::FunctionArg::Unnamed(ast::FunctionArgExpr::Wildcard)] => None,
                    [ast::FunctionArg::Unnamed(ast::FunctionArgExpr::Expr(inner))] => {
                        Some(self.bind_expr(inner, scope)?)
                    }
                    _ => {
                        return Err(SqlError::bind(format!(
                            "{} takes a single argument",
                            func_name
                        )));
                    }
                }
            }
            ast::FunctionArguments::None => None,
            _ => return Err(SqlError::bind("unsupported aggregate argument form")),
        };
        if arg.is_none() && agg != AggFunc::Count {
            return Err(SqlError::bind(format!("{} requires an argument", func_name)));
        }
        Ok(BoundProjection::Aggregate {
            func: agg,
            arg,
            alias,
        })
    }

    fn bind_group_by(
        &mut self,
        group_by: &ast::GroupByExpr,
        projections: &[BoundProjection],
        scope: &[ScopeEntry],
    ) -> SqlResult<Vec<usize>> {
        let exprs = match group_by {
            ast::GroupByExpr::Expressions(exprs, _) => exprs,
            ast::GroupByExpr::All(_) => {
                return Err(SqlError::bind("GROUP BY ALL is not supported"));
            }
        };
        let mut out = Vec::new();
        for expr in exprs {
            let ordinal = match expr {
                Expr::Value(Value::Number(n, _)) => {
                    let pos: usize = n
                        .parse()
                        .map_err(|_| SqlError::bind("invalid GROUP BY ordinal"))?;
                    if pos == 0 || pos > projections.len() {
                        return Err(SqlError::bind("GROUP BY ordinal out of range"));
                    }
                    match &projections[pos - 1] {
                        BoundProjection::Expr {
                            expr: BoundExpr::ColumnRef(idx),
                            ..
                        } => *idx,
                        _ => {
                            return Err(SqlError::bind(
                                "GROUP BY ordinal must name a plain column",
                            ));
                        }
                    }
                }
                other => match self.bind_expr(other, scope)? {
                    BoundExpr::ColumnRef(idx) => idx,
                    _ => {
                        return Err(SqlError::bind(
                            "GROUP BY expressions must be plain columns",
                        ));
                    }
                },
            };
            out.push(ordinal);
        }
        Ok(out)
    }

    /// In an aggregating select, every non-aggregate projection must be
    /// a grouping column.
    fn check_aggregation(&self, select: &BoundSelect) -> SqlResult<()> {
        if !select.is_aggregating() {
            return Ok(());
        }
        for proj in &select.projections {
            if let BoundProjection::Expr { expr, .. } = proj {
                match expr {
                    BoundExpr::ColumnRef(idx) if select.group_by.contains(idx) => {}
                    BoundExpr::ColumnRef(idx) => {
                        let name = select.column_name(*idx).unwrap_or("?");
                        return Err(SqlError::bind(format!(
                            "column '{}' must appear in GROUP BY",
                            name
                        )));
                    }
                    _ => {
                        return Err(SqlError::bind(
                            "non-aggregate projections must appear in GROUP BY",
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    fn resolve_order_key(
        &mut self,
        key: &ast::OrderByExpr,
        select: &BoundSelect,
        scope: &[ScopeEntry],
    ) -> SqlResult<BoundOrderBy> {
        if key.nulls_first.is_some() {
            return Err(SqlError::bind("NULLS FIRST/LAST is not supported"));
        }
        let asc = key.asc.unwrap_or(true);
        let column = if select.is_aggregating() {
            self.resolve_output_position(&key.expr, select)?
        } else {
            self.resolve_scan_ordinal(&key.expr, select, scope)?
        };
        Ok(BoundOrderBy { column, asc })
    }

    /// ORDER BY key for aggregating selects: an index into the output
    /// projection list.
    fn resolve_output_position(&self, expr: &Expr, select: &BoundSelect) -> SqlResult<usize> {
        match expr {
            Expr::Value(Value::Number(n, _)) => {
                let pos: usize = n
                    .parse()
                    .map_err(|_| SqlError::bind("invalid ORDER BY ordinal"))?;
                if pos == 0 || pos > select.projections.len() {
                    return Err(SqlError::bind("ORDER BY ordinal out of range"));
                }
                Ok(pos - 1)
            }
            Expr::Identifier(ident) => {
                let want = ident.value.to_lowercase();
                select
                    .projections
                    .iter()
                    .position(|p| p.alias().map(|a| a.to_lowercase()) == Some(want.clone()))
                    .ok_or_else(|| {
                        SqlError::bind(format!(
                            "ORDER BY column '{}' is not in the output",
                            ident.value
                        ))
                    })
            }
            _ => Err(SqlError::bind("unsupported ORDER BY expression")),
        }
    }

    /// ORDER BY key for plain selects: a combined-row ordinal.
    fn resolve_scan_ordinal(
        &mut self,
        expr: &Expr,
        select: &BoundSelect,
        scope: &[ScopeEntry],
    ) -> SqlResult<usize> {
        match expr {
            Expr::Value(Value::Number(n, _)) => {
                let pos: usize = n
                    .parse()
                    .map_err(|_| SqlError::bind("invalid ORDER BY ordinal"))?;
                if pos == 0 || pos > select.projections.len() {
                    return Err(SqlError::bind("ORDER BY ordinal out of range"));
                }
                match &select.projections[pos - 1] {
                    BoundProjection::Expr {
                        expr: BoundExpr::ColumnRef(idx),
                        ..
                    } => Ok(*idx),
                    _ => Err(SqlError::bind(
                        "ORDER BY ordinal refers to a computed column",
                    )),
                }
            }
            Expr::Identifier(_) | Expr::CompoundIdentifier(_) => {
                // Prefer an output alias, fall back to a table column.
                if let Expr::Identifier(ident) = expr {
                    let want = ident.value.to_lowercase();
                    for proj in &select.projections {
                        if proj.alias().map(|a| a.to_lowercase()) == Some(want.clone()) {
                            if let BoundProjection::Expr {
                                expr: BoundExpr::ColumnRef(idx),
                                ..
                            } = proj
                            {
                                return Ok(*idx);
                            }
                        }
                    }
                }
                match self.bind_expr(expr, scope)? {
                    BoundExpr::ColumnRef(idx) => Ok(idx),
                    _ => Err(SqlError::bind("unsupported ORDER BY expression")),
                }
            }
            _ => Err(SqlError::bind("unsupported ORDER BY expression")),
        }
    }

    fn bind_limit_value(&mut self, expr: &Expr, clause: &str) -> SqlResult<LimitValue> {
        match expr {
            Expr::Value(Value::Number(n, _)) => {
                let count: u64 = n
                    .parse()
                    .map_err(|_| SqlError::bind(format!("invalid {} value", clause)))?;
                Ok(LimitValue::Count(count))
            }
            Expr::Value(Value::Placeholder(p)) if p == "?" => {
                Ok(LimitValue::Parameter(self.take_param()))
            }
            _ => Err(SqlError::bind(format!(
                "unsupported {} expression",
                clause
            ))),
        }
    }

    fn take_param(&mut self) -> usize {
        let idx = self.next_param;
        self.next_param += 1;
        idx
    }

    fn column_name(scope: &[ScopeEntry], idx: usize) -> &str {
        for entry in scope {
            if idx >= entry.offset && idx < entry.offset + entry.table.num_columns() {
                return entry.table.columns[idx - entry.offset].name.as_str();
            }
        }
        ""
    }

    fn bind_expr(&mut self, expr: &Expr, scope: &[ScopeEntry]) -> SqlResult<BoundExpr> {
        match expr {
            Expr::Identifier(ident) => {
                let want = ident.value.to_lowercase();
                let mut found = None;
                for entry in scope {
                    if let Some(local) = entry.table.find_column(&want) {
                        if found.is_some() {
                            return Err(SqlError::bind(format!(
                                "ambiguous column '{}'",
                                ident.value
                            )));
                        }
                        found = Some(entry.offset + local);
                    }
                }
                found
                    .map(BoundExpr::ColumnRef)
                    .ok_or_else(|| SqlError::bind(format!("unknown column '{}'", ident.value)))
            }
            Expr::CompoundIdentifier(parts) if parts.len() == 2 => {
                let qualifier = parts[0].value.to_lowercase();
                let entry = scope
                    .iter()
                    .find(|e| e.alias == qualifier)
                    .ok_or_else(|| {
                        SqlError::bind(format!("unknown table or alias '{}'", parts[0].value))
                    })?;
                let local = entry.table.find_column(&parts[1].value).ok_or_else(|| {
                    SqlError::bind(format!(
                        "unknown column '{}.{}'",
                        parts[0].value, parts[1].value
                    ))
                })?;
                Ok(BoundExpr::ColumnRef(entry.offset + local))
            }
            Expr::Value(Value::Placeholder(s)) => {
                if s == "?" {
                    Ok(BoundExpr::Parameter(self.take_param()))
                } else {
                    Err(SqlError::bind(format!("unsupported placeholder '{}'", s)))
                }
            }
            Expr::Value(value) => Ok(BoundExpr::Literal(Self::value_to_literal(value)?)),
            Expr::BinaryOp { left, op, right } => {
                let bound_left = self.bind_expr(left, scope)?;
                let bound_right = self.bind_expr(right, scope)?;
                Ok(BoundExpr::BinaryOp {
                    left: Box::new(bound_left),
                    op: Self::resolve_bin_op(op)?,
                    right: Box::new(bound_right),
                })
            }
            Expr::UnaryOp {
                op: ast::UnaryOperator::Not,
                expr,
            } => Ok(BoundExpr::Not(Box::new(self.bind_expr(expr, scope)?))),
            Expr::UnaryOp {
                op: ast::UnaryOperator::Minus,
                expr,
            } => {
                let bound = self.bind_expr(expr, scope)?;
                match bound {
                    BoundExpr::Literal(Literal::Integer(v)) => {
                        Ok(BoundExpr::Literal(Literal::Integer(-v)))
                    }
                    BoundExpr::Literal(Literal::Float(v)) => {
                        Ok(BoundExpr::Literal(Literal::Float(-v)))
                    }
                    other => Ok(BoundExpr::BinaryOp {
                        left: Box::new(BoundExpr::Literal(Literal::Integer(0))),
                        op: BinOp::Minus,
                        right: Box::new(other),
                    }),
                }
            }
            Expr::UnaryOp {
                op: ast::UnaryOperator::Plus,
                expr,
            } => self.bind_expr(expr, scope),
            Expr::IsNull(inner) => Ok(BoundExpr::IsNull(Box::new(self.bind_expr(inner, scope)?))),
            Expr::IsNotNull(inner) => {
                Ok(BoundExpr::IsNotNull(Box::new(self.bind_expr(inner, scope)?)))
            }
            Expr::Nested(inner) => self.bind_expr(inner, scope),
            Expr::Between {
                expr: operand,
                negated,
                low,
                high,
            } => {
                let bound = self.bind_expr(operand, scope)?;
                let bound_low = self.bind_expr(low, scope)?;
                let bound_high = self.bind_expr(high, scope)?;
                let range = BoundExpr::BinaryOp {
                    left: Box::new(BoundExpr::BinaryOp {
                        left: Box::new(bound.clone()),
                        op: BinOp::GtEq,
                        right: Box::new(bound_low),
                    }),
                    op: BinOp::And,
                    right: Box::new(BoundExpr::BinaryOp {
                        left: Box::new(bound),
                        op: BinOp::LtEq,
                        right: Box::new(bound_high),
                    }),
                };
                if *negated {
                    Ok(BoundExpr::Not(Box::new(range)))
                } else {
                    Ok(range)
                }
            }
            Expr::Like { .. } | Expr::ILike { .. } => {
                Err(SqlError::bind("LIKE is not supported"))
            }
            Expr::InList { .. } | Expr::InSubquery { .. } => {
                Err(SqlError::bind("IN is not supported"))
            }
            Expr::Subquery(_) | Expr::Exists { .. } => {
                Err(SqlError::bind("subqueries are not supported"))
            }
            Expr::Case { .. } => Err(SqlError::bind("CASE is not supported")),
            Expr::Cast { .. } => Err(SqlError::bind("CAST is not supported")),
            Expr::Function(_) => {
                Err(SqlError::bind("aggregates are only allowed in the select list"))
            }
            other => Err(SqlError::bind(format!("unsupported expression: {}", other))),
        }
    }

    fn resolve_bin_op(op: &ast::BinaryOperator) -> SqlResult<BinOp> {
        match op {
            ast::BinaryOperator::Eq => Ok(BinOp::Eq),
            ast::BinaryOperator::NotEq => Ok(BinOp::NotEq),
            ast::BinaryOperator::Lt => Ok(BinOp::Lt),
            ast::BinaryOperator::LtEq => Ok(BinOp::LtEq),
            ast::BinaryOperator::Gt => Ok(BinOp::Gt),
            ast::BinaryOperator::GtEq => Ok(BinOp::GtEq),
            ast::BinaryOperator::Plus => Ok(BinOp::Plus),
            ast::BinaryOperator::Minus => Ok(BinOp::Minus),
            ast::BinaryOperator::Multiply => Ok(BinOp::Multiply),
            ast::BinaryOperator::Divide => Ok(BinOp::Divide),
            ast::BinaryOperator::And => Ok(BinOp::And),
            ast::BinaryOperator::Or => Ok(BinOp::Or),
            other => Err(SqlError::bind(format!("unsupported operator '{}'", other))),
        }
    }

    fn value_to_literal(value: &Value) -> SqlResult<Literal> {
        match value {
            Value::Number(n, _) => {
                if let Ok(i) = n.parse::<i64>() {
                    Ok(Literal::Integer(i))
                } else if let Ok(f) = n.parse::<f64>() {
                    Ok(Literal::Float(f))
                } else {
                    Err(SqlError::bind(format!("cannot parse number: {}", n)))
                }
            }
            Value::SingleQuotedString(s) => Ok(Literal::String(s.clone())),
            Value::Boolean(b) => Ok(Literal::Boolean(*b)),
            Value::Null => Ok(Literal::Null),
            other => Err(SqlError::bind(format!("unsupported literal: {}", other))),
        }
    }
}
