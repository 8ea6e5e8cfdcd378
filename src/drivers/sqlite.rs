use rusqlite::types::ValueRef;
use rusqlite::params;
use std::path::Path;

use super::{quote_identifier, Column, Connection, Row, Table, Value, View};
use crate::error::DriverError;

/// [`Connection`] backed by a SQLite database file.
///
/// SQLite has no session-level autocommit switch, so the flag is tracked here
/// and only reported back to the transaction guard.
pub struct SqliteConnection {
    conn: rusqlite::Connection,
    auto_commit: bool,
}

impl SqliteConnection {
    pub fn open(path: &Path) -> Result<Self, DriverError> {
        Ok(Self::from_connection(rusqlite::Connection::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self, DriverError> {
        Ok(Self::from_connection(rusqlite::Connection::open_in_memory()?))
    }

    pub fn from_connection(conn: rusqlite::Connection) -> Self {
        Self { conn, auto_commit: true }
    }

    pub fn inner(&self) -> &rusqlite::Connection {
        &self.conn
    }

    fn columns(&self, table: &str) -> Result<Vec<Column>, DriverError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1) ORDER BY cid")?;
        let columns = stmt
            .query_map(params![table], |row| {
                let name: String = row.get(0)?;
                let type_name: String = row.get(1)?;
                let not_null: bool = row.get(2)?;
                let pk: i64 = row.get(3)?;
                let upper = type_name.to_ascii_uppercase();
                Ok(Column {
                    name,
                    binary: upper.contains("BLOB") || upper.contains("BINARY"),
                    type_name,
                    charset: None,
                    nullable: !not_null,
                    primary_key: if pk > 0 { Some(pk as usize - 1) } else { None },
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    fn index_statements(&self, table: &str) -> Result<Vec<String>, DriverError> {
        let mut stmt = self.conn.prepare(
            "SELECT sql FROM sqlite_master WHERE type = 'index' AND tbl_name = ?1 AND sql IS NOT NULL ORDER BY name",
        )?;
        let sql = stmt
            .query_map(params![table], |row| row.get::<_, String>(0))?
            .map(|s| s.map(|s| terminate(&s)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sql)
    }
}

impl Connection for SqliteConnection {
    fn name(&self) -> &'static str { "sqlite" }

    fn list_tables(&mut self) -> Result<Vec<Table>, DriverError> {
        let entries = {
            let mut stmt = self.conn.prepare(
                "SELECT name, sql FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' AND sql IS NOT NULL",
            )?;
            stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
                .collect::<Result<Vec<_>, _>>()?
        };

        let mut tables = Vec::with_capacity(entries.len());
        for (name, sql) in entries {
            let mut create_statements = vec![terminate(&sql)];
            create_statements.extend(self.index_statements(&name)?);
            tables.push(Table { columns: self.columns(&name)?, name, create_statements });
        }
        Ok(tables)
    }

    fn list_views(&mut self) -> Result<Vec<View>, DriverError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, sql FROM sqlite_master WHERE type = 'view' AND sql IS NOT NULL")?;
        let views = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .map(|entry| {
                entry.map(|(name, sql)| View {
                    create_statements: vec![
                        format!("DROP VIEW IF EXISTS {};", quote_identifier(&name)),
                        terminate(&sql),
                    ],
                    name,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(views)
    }

    fn fetch_rows(&mut self, table: &Table, offset: u64, limit: usize) -> Result<Vec<Row>, DriverError> {
        let select = table
            .columns
            .iter()
            .map(|c| quote_identifier(&c.name))
            .collect::<Vec<_>>()
            .join(", ");

        let mut keys: Vec<&Column> = table.columns.iter().filter(|c| c.primary_key.is_some()).collect();
        keys.sort_by_key(|c| c.primary_key);
        let order = if keys.is_empty() {
            "rowid".to_string()
        } else {
            keys.iter().map(|c| quote_identifier(&c.name)).collect::<Vec<_>>().join(", ")
        };

        let sql = format!(
            "SELECT {select} FROM {} ORDER BY {order} LIMIT ?1 OFFSET ?2",
            quote_identifier(&table.name)
        );
        let width = table.columns.len();
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt
            .query_map(params![limit as i64, offset as i64], |row| {
                (0..width).map(|i| row.get_ref(i).map(to_value)).collect::<Result<Row, _>>()
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn execute(&mut self, statement: &str) -> Result<(), DriverError> {
        // The dump format brackets everything in FOREIGN_KEY_CHECKS; SQLite
        // can only defer its checks to commit time inside a transaction.
        if let Some(enabled) = foreign_key_checks(statement) {
            self.conn.pragma_update(None, "defer_foreign_keys", !enabled)?;
            return Ok(());
        }
        self.conn.execute_batch(statement)?;
        Ok(())
    }

    fn is_auto_commit(&self) -> bool {
        self.auto_commit
    }

    fn set_auto_commit(&mut self, enabled: bool) -> Result<(), DriverError> {
        self.auto_commit = enabled;
        Ok(())
    }

    fn begin_transaction(&mut self) -> Result<(), DriverError> {
        self.conn.execute_batch("BEGIN")?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn roll_back(&mut self) -> Result<(), DriverError> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    fn quote(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    fn hex_text_literal(&self, bytes: &[u8]) -> String {
        format!("CAST({} AS TEXT)", self.hex_literal(bytes))
    }
}

fn to_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(bytes) => Value::Text(bytes.to_vec()),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

fn terminate(sql: &str) -> String {
    let sql = sql.trim();
    if sql.ends_with(';') { sql.to_string() } else { format!("{sql};") }
}

fn foreign_key_checks(statement: &str) -> Option<bool> {
    let compact: String = statement
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase();
    match compact.trim_end_matches(';') {
        "SETFOREIGN_KEY_CHECKS=0" => Some(false),
        "SETFOREIGN_KEY_CHECKS=1" => Some(true),
        _ => None,
    }
}
