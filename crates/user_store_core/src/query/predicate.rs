//! Dynamic predicate builder for user search and aggregates.
//!
//! # Responsibility
//! - Turn optional filter criteria into `AND column = :param` clauses.
//! - Produce a `BoundQuery` whose bindings mirror the clause list.
//!
//! # Invariants
//! - Clause order is fixed (department, then active) regardless of the order
//!   in which criteria were supplied.
//! - Absent criteria add neither a clause nor a binding.
//! - Filter values never appear in the generated query text.

use crate::gateway::BoundQuery;
use crate::model::user::UserQuery;
use crate::query::USER_SELECT_SQL;
use rusqlite::types::Value;

const BASE_PREDICATE: &str = "1 = 1";
const ORDER_BY: &str = "ORDER BY id ASC";

/// Filterable `users` columns. Declaration order is clause order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UserField {
    Department,
    Active,
}

impl UserField {
    pub fn column(self) -> &'static str {
        match self {
            Self::Department => "department",
            Self::Active => "active",
        }
    }

    pub fn param(self) -> &'static str {
        match self {
            Self::Department => "dept",
            Self::Active => "active",
        }
    }

    fn clause(self) -> String {
        format!("AND {} = :{}", self.column(), self.param())
    }
}

/// Accumulates optional equality criteria for a `users` query.
#[derive(Debug, Clone, Default)]
pub struct PredicateBuilder {
    criteria: Vec<(UserField, Value)>,
}

impl PredicateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a builder with every present field of `filter`.
    pub fn from_query(filter: &UserQuery) -> Self {
        Self::new()
            .department(filter.department.as_deref())
            .active(filter.active)
    }

    pub fn department(self, department: Option<&str>) -> Self {
        self.with(
            UserField::Department,
            department.map(|value| Value::Text(value.to_string())),
        )
    }

    pub fn active(self, active: Option<bool>) -> Self {
        self.with(UserField::Active, active.map(|value| Value::Integer(i64::from(value))))
    }

    fn with(mut self, field: UserField, value: Option<Value>) -> Self {
        let Some(value) = value else {
            return self;
        };
        match self.criteria.iter_mut().find(|(current, _)| *current == field) {
            Some(slot) => slot.1 = value,
            None => self.criteria.push((field, value)),
        }
        self.criteria.sort_by_key(|(field, _)| *field);
        self
    }

    /// Returns the generated clauses in emission order.
    pub fn clauses(&self) -> Vec<String> {
        self.criteria
            .iter()
            .map(|(field, _)| field.clause())
            .collect()
    }

    /// Builds the full select query with bindings.
    pub fn build(&self) -> BoundQuery {
        let mut sql = format!("{USER_SELECT_SQL} WHERE {BASE_PREDICATE}");
        for clause in self.clauses() {
            sql.push(' ');
            sql.push_str(&clause);
        }
        sql.push(' ');
        sql.push_str(ORDER_BY);

        self.criteria
            .iter()
            .fold(BoundQuery::new(sql), |query, (field, value)| {
                query.bind(field.param(), value.clone())
            })
    }
}

/// Counts active users of one department.
pub fn count_active_in_department(department: &str) -> BoundQuery {
    BoundQuery::new(format!(
        "SELECT COUNT(*) FROM users WHERE {} = :{} AND active = 1",
        UserField::Department.column(),
        UserField::Department.param()
    ))
    .bind(
        UserField::Department.param(),
        Value::Text(department.to_string()),
    )
}
