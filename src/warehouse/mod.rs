pub mod auth;
pub mod embedded;
pub mod session;

use crate::error::FetchError;
use crate::query::table::Table;

/// A SQL statement with positional `?` parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    sql: String,
    params: Vec<String>,
}

impl Statement {
    pub const fn new(sql: String, params: Vec<String>) -> Self {
        Self { sql, params }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }
}

/// Query/response contract of the data warehouse.
pub trait Warehouse: Send {
    /// Run one read-only statement and return its full result.
    fn execute(&mut self, statement: &Statement) -> Result<Table, FetchError>;
}

impl<W: Warehouse + ?Sized> Warehouse for Box<W> {
    fn execute(&mut self, statement: &Statement) -> Result<Table, FetchError> {
        (**self).execute(statement)
    }
}
