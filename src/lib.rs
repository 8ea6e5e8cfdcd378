//! Streaming SQL backups with retention pruning and transactional restore.

pub mod config;
pub mod drivers;
pub mod dump;
pub mod error;
pub mod manager;
pub mod storage;
pub mod utils;

pub use config::{BackupSettings, CreateConfig, DumpStrategyKind, RestoreConfig};
pub use drivers::Connection;
pub use dump::{DumpStrategy, Dumper, MigrationDumper};
pub use error::{BackupError, DriverError, Result};
pub use manager::{BackupManager, RestoreSummary};
pub use storage::backup::Backup;
pub use storage::retention::RetentionPolicy;
