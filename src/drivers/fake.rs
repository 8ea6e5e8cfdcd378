use std::collections::BTreeMap;

use super::{Column, Connection, Row, Table, Value, View};
use crate::error::DriverError;

/// In-memory connection that serves generated rows and records what was asked of it.
#[derive(Default)]
pub struct FakeConnection {
    pub tables: Vec<Table>,
    pub views: Vec<View>,
    pub rows: BTreeMap<String, Vec<Row>>,
    /// Fail the fetch that starts at this offset.
    pub fail_at_offset: Option<u64>,
    pub fetches: Vec<(String, u64, usize)>,
    pub executed: Vec<String>,
    pub fail_on: Option<String>,
    pub auto_commit: bool,
    pub log: Vec<&'static str>,
}

impl FakeConnection {
    pub fn new() -> Self {
        Self { auto_commit: true, ..Self::default() }
    }

    pub fn with_table(mut self, name: &str, columns: Vec<Column>, rows: Vec<Row>) -> Self {
        self.tables.push(Table {
            name: name.to_string(),
            columns,
            create_statements: vec![format!("CREATE TABLE `{name}` (id INT);")],
        });
        self.rows.insert(name.to_string(), rows);
        self
    }

    pub fn with_view(mut self, name: &str) -> Self {
        self.views.push(View {
            name: name.to_string(),
            create_statements: vec![format!("CREATE OR REPLACE VIEW `{name}` AS SELECT 1;")],
        });
        self
    }

    pub fn with_generated_rows(self, name: &str, count: i64) -> Self {
        let rows = (0..count).map(|i| vec![Value::Integer(i)]).collect();
        self.with_table(name, vec![Column::new("id", "INT").primary_key(0)], rows)
    }
}

impl Connection for FakeConnection {
    fn name(&self) -> &'static str { "fake" }

    fn list_tables(&mut self) -> Result<Vec<Table>, DriverError> {
        self.log.push("list_tables");
        Ok(self.tables.clone())
    }

    fn list_views(&mut self) -> Result<Vec<View>, DriverError> {
        Ok(self.views.clone())
    }

    fn fetch_rows(&mut self, table: &Table, offset: u64, limit: usize) -> Result<Vec<Row>, DriverError> {
        self.fetches.push((table.name.clone(), offset, limit));
        if self.fail_at_offset == Some(offset) {
            return Err(DriverError::Other("connection lost".into()));
        }
        let rows = self.rows.get(&table.name).map(Vec::as_slice).unwrap_or_default();
        Ok(rows.iter().skip(offset as usize).take(limit).cloned().collect())
    }

    fn execute(&mut self, statement: &str) -> Result<(), DriverError> {
        if self.fail_on.as_deref().is_some_and(|f| statement.contains(f)) {
            return Err(DriverError::Other("syntax error".into()));
        }
        self.executed.push(statement.to_string());
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
        self.log.push("begin");
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        self.log.push("commit");
        Ok(())
    }

    fn roll_back(&mut self) -> Result<(), DriverError> {
        self.log.push("rollback");
        Ok(())
    }
}
