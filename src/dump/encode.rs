use std::borrow::Cow;
use std::collections::HashMap;

use super::transform::ValueTransform;
use crate::drivers::{quote_identifier, Column, Connection, Table, Value};

/// Repeated values (foreign keys, enums) are common, so quoted literals are
/// cached. The cache is dropped wholesale once it reaches this size.
pub const QUOTE_CACHE_LIMIT: usize = 100_000;

const RESERVED: &[&str] = &[
    "ADD", "ALL", "ALTER", "AND", "AS", "ASC", "BETWEEN", "BY", "CASE", "CHECK", "COLUMN", "CONSTRAINT",
    "CREATE", "CROSS", "DEFAULT", "DELETE", "DESC", "DISTINCT", "DROP", "ELSE", "EXISTS", "FOREIGN", "FROM",
    "GROUP", "HAVING", "IN", "INDEX", "INNER", "INSERT", "INTO", "IS", "JOIN", "KEY", "LEFT", "LIKE", "LIMIT",
    "NOT", "NULL", "ON", "OR", "ORDER", "OUTER", "PRIMARY", "REFERENCES", "RIGHT", "SELECT", "SET", "TABLE",
    "THEN", "TO", "UNION", "UNIQUE", "UPDATE", "USING", "VALUES", "WHEN", "WHERE", "WITH",
];

pub const NO_TRANSFORMS: &[Box<dyn ValueTransform>] = &[];

/// How column identifiers in `INSERT` statements are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierQuoting {
    Always,
    WhenRequired,
}

impl IdentifierQuoting {
    pub fn quote(self, name: &str) -> String {
        match self {
            IdentifierQuoting::Always => quote_identifier(name),
            IdentifierQuoting::WhenRequired if requires_quoting(name) => quote_identifier(name),
            IdentifierQuoting::WhenRequired => name.to_string(),
        }
    }
}

fn requires_quoting(name: &str) -> bool {
    let mut chars = name.chars();
    let valid_start = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    !(valid_start && valid_rest) || RESERVED.contains(&name.to_ascii_uppercase().as_str())
}

fn has_control_chars(text: &str) -> bool {
    text.chars().any(|c| c < ' ' || c == '\u{7f}')
}

/// Renders rows as `INSERT` statements.
pub struct ValueEncoder<'a> {
    quoting: IdentifierQuoting,
    transforms: &'a [Box<dyn ValueTransform>],
    cache: HashMap<String, String>,
}

impl<'a> ValueEncoder<'a> {
    pub fn new(quoting: IdentifierQuoting, transforms: &'a [Box<dyn ValueTransform>]) -> Self {
        Self { quoting, transforms, cache: HashMap::new() }
    }

    /// `INSERT INTO `t` (a, b) VALUES (...)` prefix shared by every row of a table.
    pub fn insert_prefix(&self, table: &Table) -> String {
        let columns = table
            .columns
            .iter()
            .map(|c| self.quoting.quote(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        format!("INSERT INTO {} ({}) VALUES", quote_identifier(&table.name), columns)
    }

    pub fn values(&mut self, connection: &dyn Connection, table: &Table, row: &[Value]) -> String {
        let encoded: Vec<String> = table
            .columns
            .iter()
            .zip(row)
            .map(|(column, value)| self.encode(connection, &table.name, column, value))
            .collect();
        format!("({})", encoded.join(", "))
    }

    pub fn encode(&mut self, connection: &dyn Connection, table: &str, column: &Column, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Real(f) if f.is_finite() => format!("{f:?}"),
            Value::Real(_) => "NULL".to_string(),
            Value::Blob(bytes) => connection.hex_literal(bytes),
            Value::Text(bytes) if column.is_binary() => connection.hex_literal(bytes),
            Value::Text(bytes) if bytes.is_empty() => "''".to_string(),
            Value::Text(bytes) => {
                let text = match std::str::from_utf8(bytes) {
                    Ok(text) => self.transform(table, column, text),
                    Err(_) => return connection.hex_text_literal(bytes),
                };
                if has_control_chars(&text) {
                    connection.hex_text_literal(text.as_bytes())
                } else {
                    self.quote_cached(connection, &text)
                }
            }
        }
    }

    fn transform<'v>(&self, table: &str, column: &Column, text: &'v str) -> Cow<'v, str> {
        let mut text = Cow::Borrowed(text);
        for transform in self.transforms.iter().filter(|t| t.applies_to(table, column)) {
            let changed = match transform.transform(&text) {
                Cow::Owned(changed) => Some(changed),
                Cow::Borrowed(_) => None,
            };
            if let Some(changed) = changed {
                text = Cow::Owned(changed);
            }
        }
        text
    }

    fn quote_cached(&mut self, connection: &dyn Connection, text: &str) -> String {
        if let Some(quoted) = self.cache.get(text) {
            return quoted.clone();
        }
        if self.cache.len() >= QUOTE_CACHE_LIMIT {
            self.cache.clear();
        }
        let quoted = connection.quote(text);
        self.cache.insert(text.to_string(), quoted.clone());
        quoted
    }

    #[cfg(test)]
    pub(crate) fn cached(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::fake::FakeConnection;
    use crate::dump::transform::ColumnTransform;

    fn text(s: &str) -> Value {
        Value::Text(s.as_bytes().to_vec())
    }

    fn encode(value: Value, column: Column) -> String {
        let conn = FakeConnection::new();
        ValueEncoder::new(IdentifierQuoting::WhenRequired, NO_TRANSFORMS).encode(&conn, "t", &column, &value)
    }

    #[test]
    fn encodes_each_kind_of_value() {
        let col = Column::new("c", "TEXT");
        assert_eq!(encode(Value::Null, col.clone()), "NULL");
        assert_eq!(encode(Value::Integer(-42), col.clone()), "-42");
        assert_eq!(encode(Value::Real(1.5), col.clone()), "1.5");
        assert_eq!(encode(Value::Real(2.0), col.clone()), "2.0");
        assert_eq!(encode(Value::Real(f64::NAN), col.clone()), "NULL");
        assert_eq!(encode(text(""), col.clone()), "''");
        assert_eq!(encode(text("it's"), col.clone()), "'it''s'");
        assert_eq!(encode(Value::Blob(vec![0xde, 0xad]), col.clone()), "UNHEX('DEAD')");
    }

    #[test]
    fn binary_columns_and_unsafe_text_become_hex() {
        let binary = Column::new("uuid", "BINARY(16)").binary();
        assert_eq!(encode(text("ab"), binary), "UNHEX('6162')");

        let col = Column::new("c", "TEXT");
        assert_eq!(encode(Value::Text(vec![0xff, 0xfe]), col.clone()), "UNHEX('FFFE')");
        assert_eq!(encode(text("line\nbreak"), col.clone()), "UNHEX('6C696E650A627265616B')");
        assert_eq!(encode(text("tab\there"), col.clone()), "UNHEX('7461620968657265')");
        assert_eq!(encode(text("héllo"), col), "'héllo'");
    }

    #[test]
    fn quotes_identifiers_only_when_needed() {
        assert_eq!(IdentifierQuoting::WhenRequired.quote("title"), "title");
        assert_eq!(IdentifierQuoting::WhenRequired.quote("order"), "`order`");
        assert_eq!(IdentifierQuoting::WhenRequired.quote("my col"), "`my col`");
        assert_eq!(IdentifierQuoting::WhenRequired.quote("1st"), "`1st`");
        assert_eq!(IdentifierQuoting::Always.quote("title"), "`title`");
    }

    #[test]
    fn builds_insert_statements() {
        let conn = FakeConnection::new();
        let table = Table {
            name: "tl_page".into(),
            columns: vec![Column::new("id", "INT"), Column::new("key", "TEXT")],
            create_statements: vec![],
        };
        let mut encoder = ValueEncoder::new(IdentifierQuoting::WhenRequired, NO_TRANSFORMS);
        assert_eq!(encoder.insert_prefix(&table), "INSERT INTO `tl_page` (id, `key`) VALUES");
        assert_eq!(encoder.values(&conn, &table, &[Value::Integer(1), text("a")]), "(1, 'a')");
    }

    #[test]
    fn cache_is_reset_at_the_limit() {
        let conn = FakeConnection::new();
        let col = Column::new("c", "TEXT");
        let mut encoder = ValueEncoder::new(IdentifierQuoting::WhenRequired, NO_TRANSFORMS);
        for i in 0..QUOTE_CACHE_LIMIT {
            encoder.encode(&conn, "t", &col, &text(&format!("v{i}")));
        }
        assert_eq!(encoder.cached(), QUOTE_CACHE_LIMIT);

        assert_eq!(encoder.encode(&conn, "t", &col, &text("v0")), "'v0'");
        assert_eq!(encoder.cached(), QUOTE_CACHE_LIMIT);

        assert_eq!(encoder.encode(&conn, "t", &col, &text("fresh")), "'fresh'");
        assert_eq!(encoder.cached(), 1);
    }

    #[test]
    fn transforms_run_before_quoting() {
        let conn = FakeConnection::new();
        let transforms: Vec<Box<dyn ValueTransform>> =
            vec![Box::new(ColumnTransform::new("t", "c", |v: &str| v.to_uppercase()))];
        let mut encoder = ValueEncoder::new(IdentifierQuoting::Always, &transforms);

        assert_eq!(encoder.encode(&conn, "t", &Column::new("c", "TEXT"), &text("abc")), "'ABC'");
        assert_eq!(encoder.encode(&conn, "t", &Column::new("d", "TEXT"), &text("abc")), "'abc'");
    }
}
