pub mod operation;
pub mod settings;

pub use operation::{CreateConfig, RestoreConfig, DUMP_HEADER};
pub use settings::{BackupSettings, DumpStrategyKind};
