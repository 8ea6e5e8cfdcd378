use crate::error::DriverError;

#[cfg(test)]
pub(crate) mod fake;
pub mod selector;
pub mod sqlite;

/// A single column as reported by schema introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub type_name: String,
    /// Binary columns are always dumped as hex literals.
    pub binary: bool,
    pub charset: Option<String>,
    pub nullable: bool,
    /// Position inside the primary key, if the column is part of it.
    pub primary_key: Option<usize>,
}

impl Column {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            binary: false,
            charset: None,
            nullable: true,
            primary_key: None,
        }
    }

    pub fn binary(mut self) -> Self {
        self.binary = true;
        self
    }

    pub fn primary_key(mut self, position: usize) -> Self {
        self.primary_key = Some(position);
        self.nullable = false;
        self
    }

    /// Values of this column must be treated as opaque bytes.
    pub fn is_binary(&self) -> bool {
        self.binary || self.charset.as_deref().is_some_and(|c| c.eq_ignore_ascii_case("binary"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    /// Complete, `;`-terminated statements recreating the table and its indexes.
    pub create_statements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    pub name: String,
    /// Statements that create or replace the view, `;`-terminated.
    pub create_statements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(Vec<u8>),
    Blob(Vec<u8>),
}

pub type Row = Vec<Value>;

/// The database collaborator the backup engine dumps from and restores into.
///
/// Implementations report their catalog in any order; the dumpers sort it.
pub trait Connection {
    fn name(&self) -> &'static str;

    fn list_tables(&mut self) -> Result<Vec<Table>, DriverError>;

    fn list_views(&mut self) -> Result<Vec<View>, DriverError>;

    /// Fetch at most `limit` rows of `table` starting at `offset`, in a stable
    /// order. Values are in the order of `table.columns`.
    fn fetch_rows(&mut self, table: &Table, offset: u64, limit: usize) -> Result<Vec<Row>, DriverError>;

    /// Execute one complete statement.
    fn execute(&mut self, statement: &str) -> Result<(), DriverError>;

    fn is_auto_commit(&self) -> bool;

    fn set_auto_commit(&mut self, enabled: bool) -> Result<(), DriverError>;

    fn begin_transaction(&mut self) -> Result<(), DriverError>;

    fn commit(&mut self) -> Result<(), DriverError>;

    fn roll_back(&mut self) -> Result<(), DriverError>;

    /// Quote a string as a SQL literal.
    fn quote(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len() + 2);
        out.push('\'');
        for c in value.chars() {
            match c {
                '\'' => out.push_str("''"),
                '\\' => out.push_str("\\\\"),
                _ => out.push(c),
            }
        }
        out.push('\'');
        out
    }

    /// Literal for raw bytes stored in a binary column.
    fn hex_literal(&self, bytes: &[u8]) -> String {
        format!("UNHEX('{}')", hex::encode_upper(bytes))
    }

    /// Literal for text bytes that cannot be quoted safely.
    fn hex_text_literal(&self, bytes: &[u8]) -> String {
        self.hex_literal(bytes)
    }
}

/// Quote an identifier with backticks, doubling embedded backticks.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_escape_backticks() {
        assert_eq!(quote_identifier("tl_page"), "`tl_page`");
        assert_eq!(quote_identifier("we`ird"), "`we``ird`");
    }

    #[test]
    fn binary_charset_marks_column_binary() {
        let mut col = Column::new("data", "VARCHAR(255)");
        assert!(!col.is_binary());
        col.charset = Some("BINARY".into());
        assert!(col.is_binary());
        assert!(Column::new("uuid", "BLOB").binary().is_binary());
    }
}
