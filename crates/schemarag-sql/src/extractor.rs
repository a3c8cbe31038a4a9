//! Join-edge extraction from parsed SQL
//!
//! Builds an alias-to-table map per SELECT scope, then decomposes JOIN ... ON
//! predicates into one directed edge per equality comparison. Comma joins in
//! the FROM list paired with WHERE equalities are extracted with kind
//! UNKNOWN. Edges connect physical tables only; CTEs and derived tables are
//! tracked as opaque aliases and never become endpoints.

use schemarag_core::{JoinEdge, JoinKind, Provenance};
use sqlparser::ast::{
    Cte, Expr, JoinConstraint, JoinOperator, ObjectName, Query, Select, SetExpr, Statement,
    TableFactor, TableWithJoins,
};
use std::collections::{HashMap, HashSet};

use crate::parser::ParsedSql;

/// Extract zero or more join edges from one parsed statement.
///
/// Never fails: statements without joins (or statement kinds the walker does
/// not cover) simply yield an empty list. Deduplication against previously
/// stored edges happens in the relation store, not here.
pub fn extract_join_edges(parsed: &ParsedSql, provenance: &Provenance) -> Vec<JoinEdge> {
    let mut edges = Vec::new();
    for statement in &parsed.statements {
        walk_statement(statement, &Scope::default(), provenance, &mut edges);
    }
    edges
}

/// Alias resolution scope for one query level.
///
/// `aliases` maps a lowercased alias (or self-aliased table name) to
/// `Some(table)` for physical tables and `None` for opaque relations
/// (derived tables, CTE references). Inner scopes inherit outer entries so
/// correlated references resolve.
#[derive(Debug, Clone, Default)]
struct Scope {
    aliases: HashMap<String, Option<String>>,
    ctes: HashSet<String>,
}

impl Scope {
    /// Resolve a column qualifier to a physical table name
    fn resolve(&self, qualifier: &str) -> Option<&str> {
        match self.aliases.get(qualifier) {
            Some(Some(table)) => Some(table.as_str()),
            _ => None,
        }
    }
}

fn walk_statement(statement: &Statement, scope: &Scope, prov: &Provenance, edges: &mut Vec<JoinEdge>) {
    match statement {
        Statement::Query(query) => walk_query(query, scope.clone(), prov, edges),
        Statement::Insert(insert) => {
            if let Some(source) = &insert.source {
                walk_query(source, scope.clone(), prov, edges);
            }
        }
        _ => {}
    }
}

fn walk_query(query: &Query, mut scope: Scope, prov: &Provenance, edges: &mut Vec<JoinEdge>) {
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            walk_cte(cte, &scope, prov, edges);
            scope.ctes.insert(cte.alias.name.value.to_lowercase());
        }
    }
    walk_set_expr(&query.body, &scope, prov, edges);
}

fn walk_cte(cte: &Cte, scope: &Scope, prov: &Provenance, edges: &mut Vec<JoinEdge>) {
    // The CTE body sees previously defined CTEs but not its own name.
    walk_query(&cte.query, scope.clone(), prov, edges);
}

fn walk_set_expr(set_expr: &SetExpr, scope: &Scope, prov: &Provenance, edges: &mut Vec<JoinEdge>) {
    match set_expr {
        SetExpr::Select(select) => walk_select(select, scope.clone(), prov, edges),
        SetExpr::Query(query) => walk_query(query, scope.clone(), prov, edges),
        SetExpr::SetOperation { left, right, .. } => {
            walk_set_expr(left, scope, prov, edges);
            walk_set_expr(right, scope, prov, edges);
        }
        _ => {}
    }
}

fn walk_select(select: &Select, mut scope: Scope, prov: &Provenance, edges: &mut Vec<JoinEdge>) {
    // Register every relation first so ON predicates written against a later
    // alias still resolve.
    for table_with_joins in &select.from {
        register_table_with_joins(table_with_joins, &mut scope, prov, edges);
    }

    for table_with_joins in &select.from {
        extract_from_joins(table_with_joins, &scope, prov, edges);
    }

    if let Some(selection) = &select.selection {
        // Comma joins carry their equality predicates in WHERE; position
        // disambiguation is not attempted, so the kind stays UNKNOWN.
        if select.from.len() > 1 {
            collect_equalities(selection, &scope, JoinKind::Unknown, prov, edges);
        }
        walk_subqueries(selection, &scope, prov, edges);
    }
}

/// Register aliases for a relation chain, recursing into derived tables
fn register_table_with_joins(
    twj: &TableWithJoins,
    scope: &mut Scope,
    prov: &Provenance,
    edges: &mut Vec<JoinEdge>,
) {
    register_factor(&twj.relation, scope, prov, edges);
    for join in &twj.joins {
        register_factor(&join.relation, scope, prov, edges);
    }
}

fn register_factor(factor: &TableFactor, scope: &mut Scope, prov: &Provenance, edges: &mut Vec<JoinEdge>) {
    match factor {
        TableFactor::Table { name, alias, .. } => {
            let table = object_name_string(name);
            let key = alias
                .as_ref()
                .map(|a| a.name.value.to_lowercase())
                .unwrap_or_else(|| table.clone());
            if scope.ctes.contains(&table) {
                scope.aliases.insert(key, None);
            } else {
                scope.aliases.insert(key, Some(table));
            }
        }
        TableFactor::Derived { subquery, alias, .. } => {
            walk_query(subquery, scope.clone(), prov, edges);
            if let Some(alias) = alias {
                scope.aliases.insert(alias.name.value.to_lowercase(), None);
            }
        }
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => {
            register_table_with_joins(table_with_joins, scope, prov, edges);
        }
        _ => {}
    }
}

/// Extract edges from the explicit JOIN clauses of one relation chain
fn extract_from_joins(
    twj: &TableWithJoins,
    scope: &Scope,
    prov: &Provenance,
    edges: &mut Vec<JoinEdge>,
) {
    let mut previous = physical_table(&twj.relation, scope);

    for join in &twj.joins {
        let joined = physical_table(&join.relation, scope);
        let (kind, constraint) = join_kind_and_constraint(&join.join_operator);

        match constraint {
            Some(JoinConstraint::On(expr)) => {
                collect_equalities(expr, scope, kind, prov, edges);
            }
            Some(JoinConstraint::Using(columns)) => {
                // USING names the same column on both sides; the left side is
                // the closest preceding physical table in the chain.
                if let (Some(left), Some(right)) = (previous.as_deref(), joined.as_deref()) {
                    for column in columns {
                        let column = column.to_string().to_lowercase();
                        edges.push(JoinEdge::new(
                            left,
                            right,
                            format!("{left}.{column} = {right}.{column}"),
                            kind,
                            prov.clone(),
                        ));
                    }
                }
            }
            _ => {}
        }

        if joined.is_some() {
            previous = joined;
        }
    }

    if let TableFactor::NestedJoin {
        table_with_joins, ..
    } = &twj.relation
    {
        extract_from_joins(table_with_joins, scope, prov, edges);
    }
}

/// Physical table name behind a factor, if any
fn physical_table(factor: &TableFactor, scope: &Scope) -> Option<String> {
    match factor {
        TableFactor::Table { name, .. } => {
            let table = object_name_string(name);
            if scope.ctes.contains(&table) {
                None
            } else {
                Some(table)
            }
        }
        _ => None,
    }
}

fn join_kind_and_constraint(operator: &JoinOperator) -> (JoinKind, Option<&JoinConstraint>) {
    match operator {
        JoinOperator::Inner(c) => (JoinKind::Inner, Some(c)),
        JoinOperator::LeftOuter(c) => (JoinKind::Left, Some(c)),
        JoinOperator::RightOuter(c) => (JoinKind::Right, Some(c)),
        JoinOperator::FullOuter(c) => (JoinKind::Full, Some(c)),
        JoinOperator::CrossJoin => (JoinKind::Cross, None),
        _ => (JoinKind::Unknown, None),
    }
}

/// Decompose ANDed equality comparisons into directed edges.
///
/// A single ON clause with multiple ANDed equalities yields multiple edges
/// (composite-key joins are parallel edges sharing provenance). Direction is
/// as written: the left side of the equality is `from_table`. Non-equality
/// predicates are filters, not join edges.
fn collect_equalities(
    expr: &Expr,
    scope: &Scope,
    kind: JoinKind,
    prov: &Provenance,
    edges: &mut Vec<JoinEdge>,
) {
    use sqlparser::ast::BinaryOperator;

    match expr {
        Expr::BinaryOp { left, op, right } => match op {
            BinaryOperator::And => {
                collect_equalities(left, scope, kind, prov, edges);
                collect_equalities(right, scope, kind, prov, edges);
            }
            BinaryOperator::Eq => {
                let (Some((lq, lcol)), Some((rq, rcol))) =
                    (qualified_column(left), qualified_column(right))
                else {
                    return;
                };
                let (Some(lt), Some(rt)) = (scope.resolve(&lq), scope.resolve(&rq)) else {
                    return;
                };
                if lt == rt {
                    return;
                }
                edges.push(JoinEdge::new(
                    lt,
                    rt,
                    format!("{lt}.{lcol} = {rt}.{rcol}"),
                    kind,
                    prov.clone(),
                ));
            }
            _ => {}
        },
        Expr::Nested(inner) => collect_equalities(inner, scope, kind, prov, edges),
        _ => {}
    }
}

/// `alias.column` shape from an expression, lowercased
fn qualified_column(expr: &Expr) -> Option<(String, String)> {
    match expr {
        Expr::CompoundIdentifier(parts) if parts.len() >= 2 => {
            let column = parts[parts.len() - 1].value.to_lowercase();
            let qualifier = parts[parts.len() - 2].value.to_lowercase();
            Some((qualifier, column))
        }
        _ => None,
    }
}

/// Walk subqueries nested in WHERE so their joins are extracted too
fn walk_subqueries(expr: &Expr, scope: &Scope, prov: &Provenance, edges: &mut Vec<JoinEdge>) {
    match expr {
        Expr::BinaryOp { left, right, .. } => {
            walk_subqueries(left, scope, prov, edges);
            walk_subqueries(right, scope, prov, edges);
        }
        Expr::Nested(inner) | Expr::UnaryOp { expr: inner, .. } => {
            walk_subqueries(inner, scope, prov, edges);
        }
        Expr::Subquery(query) => walk_query(query, scope.clone(), prov, edges),
        Expr::InSubquery { subquery, .. } => walk_query(subquery, scope.clone(), prov, edges),
        Expr::Exists { subquery, .. } => walk_query(subquery, scope.clone(), prov, edges),
        _ => {}
    }
}

fn object_name_string(name: &ObjectName) -> String {
    name.0
        .iter()
        .map(|ident| ident.value.to_lowercase())
        .collect::<Vec<_>>()
        .join(".")
}
