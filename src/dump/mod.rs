use std::collections::VecDeque;

use crate::config::CreateConfig;
use crate::drivers::{quote_identifier, Connection, Table};
use crate::error::{BackupError, DriverError};

pub mod dumper;
pub mod encode;
pub mod migration;
pub mod transform;

pub use dumper::Dumper;
pub use encode::IdentifierQuoting;
pub use migration::MigrationDumper;
pub use transform::{ColumnTransform, DecodeHtmlEntities, ValueTransform};

use encode::ValueEncoder;

/// Produces the statement stream of a backup.
pub trait DumpStrategy {
    fn dump<'a>(&'a self, connection: &'a mut dyn Connection, config: &'a CreateConfig) -> DumpLines<'a>;
}

enum Stage {
    Start,
    Structure(usize),
    Data { table: usize, offset: u64 },
    Views,
    Done,
}

/// Lazy, single-pass sequence of dump lines.
///
/// Nothing is read from the connection until the first line is pulled, and at
/// most one batch of rows is held at a time. The first error is yielded as
/// [`BackupError::DumpFailed`] and ends the sequence.
pub struct DumpLines<'a> {
    connection: &'a mut dyn Connection,
    config: &'a CreateConfig,
    encoder: ValueEncoder<'a>,
    tables: Vec<Table>,
    insert_prefix: String,
    pending: VecDeque<String>,
    stage: Stage,
}

impl<'a> DumpLines<'a> {
    pub fn new(
        connection: &'a mut dyn Connection,
        config: &'a CreateConfig,
        quoting: IdentifierQuoting,
        transforms: &'a [Box<dyn ValueTransform>],
    ) -> Self {
        Self {
            connection,
            config,
            encoder: ValueEncoder::new(quoting, transforms),
            tables: Vec::new(),
            insert_prefix: String::new(),
            pending: VecDeque::new(),
            stage: Stage::Start,
        }
    }

    fn advance(&mut self) -> Result<(), BackupError> {
        match self.stage {
            Stage::Start => {
                let mut tables = self
                    .connection
                    .list_tables()
                    .map_err(|source| BackupError::DumpFailed { table: None, source })?;
                tables.retain(|t| !self.config.is_ignored(&t.name));
                tables.sort_by(|a, b| a.name.cmp(&b.name));
                self.tables = tables;

                self.pending.push_back("SET FOREIGN_KEY_CHECKS = 0;".to_string());
                self.stage = if self.tables.is_empty() { Stage::Views } else { Stage::Structure(0) };
            }
            Stage::Structure(index) => {
                let table = &self.tables[index];
                tracing::debug!(table = %table.name, "dumping table");

                self.pending.push_back(format!("-- BEGIN STRUCTURE {}", table.name));
                self.pending.push_back(format!("DROP TABLE IF EXISTS {};", quote_identifier(&table.name)));
                self.pending.extend(table.create_statements.iter().cloned());
                self.pending.push_back(format!("-- BEGIN DATA {}", table.name));

                self.insert_prefix = self.encoder.insert_prefix(table);
                self.stage = Stage::Data { table: index, offset: 0 };
            }
            Stage::Data { table: index, offset } => {
                let table = &self.tables[index];
                let limit = self.config.batch_size();
                let failed = |source| BackupError::DumpFailed { table: Some(table.name.clone()), source };

                let rows = self.connection.fetch_rows(table, offset, limit).map_err(failed)?;
                for row in &rows {
                    if row.len() != table.columns.len() {
                        return Err(failed(DriverError::Other(format!(
                            "row has {} values but the table has {} columns",
                            row.len(),
                            table.columns.len()
                        ))));
                    }
                    let values = self.encoder.values(&*self.connection, table, row);
                    self.pending.push_back(format!("{} {};", self.insert_prefix, values));
                }

                self.stage = if rows.len() == limit {
                    Stage::Data { table: index, offset: offset + rows.len() as u64 }
                } else if index + 1 < self.tables.len() {
                    Stage::Structure(index + 1)
                } else {
                    Stage::Views
                };
            }
            Stage::Views => {
                let mut views = self
                    .connection
                    .list_views()
                    .map_err(|source| BackupError::DumpFailed { table: None, source })?;
                views.sort_by(|a, b| a.name.cmp(&b.name));

                for view in views {
                    self.pending.push_back(format!("-- BEGIN VIEW {}", view.name));
                    self.pending.extend(view.create_statements);
                }
                self.pending.push_back("SET FOREIGN_KEY_CHECKS = 1;".to_string());
                self.stage = Stage::Done;
            }
            Stage::Done => {}
        }
        Ok(())
    }
}

impl Iterator for DumpLines<'_> {
    type Item = Result<String, BackupError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(line) = self.pending.pop_front() {
                return Some(Ok(line));
            }
            if matches!(self.stage, Stage::Done) {
                return None;
            }
            if let Err(e) = self.advance() {
                self.stage = Stage::Done;
                self.pending.clear();
                return Some(Err(e));
            }
        }
    }
}
