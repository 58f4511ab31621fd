use serde::Serialize;

/// A single value in a result table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    /// Integer view of the cell. Floats are truncated; text and NULL yield `None`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) if v.is_finite() => Some(*v as i64),
            _ => None,
        }
    }

    /// Counts are never negative; anything else reads as zero.
    pub fn as_count(&self) -> u64 {
        self.as_i64()
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(0)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// Tabular result of one warehouse statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from literal column names and rows. Rows shorter than the
    /// column list are padded with NULL.
    pub fn from_rows(columns: &[&str], rows: Vec<Vec<Cell>>) -> Self {
        let mut table = Self::new(columns.iter().map(|c| (*c).to_string()).collect());
        for row in rows {
            table.push_row(row);
        }
        table
    }

    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Null);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Case-insensitive column lookup.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Iterate rows through a name-addressable view.
    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        self.rows.iter().map(move |cells| Record { table: self, cells })
    }
}

/// One row of a [`Table`], addressable by column name.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    table: &'a Table,
    cells: &'a [Cell],
}

impl Record<'_> {
    pub fn get(&self, column: &str) -> &Cell {
        self.table
            .column_index(column)
            .and_then(|i| self.cells.get(i))
            .unwrap_or(&Cell::Null)
    }

    pub fn count(&self, column: &str) -> u64 {
        self.get(column).as_count()
    }

    /// Text value of a dimension column, or `default` for NULL.
    pub fn label<'b>(&'b self, column: &str, default: &'b str) -> &'b str {
        self.get(column).as_str().unwrap_or(default)
    }
}
