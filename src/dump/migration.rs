use super::transform::ValueTransform;
use super::{DumpLines, DumpStrategy, IdentifierQuoting};
use crate::config::CreateConfig;
use crate::drivers::Connection;

/// Dump for moving data between installations: every identifier is quoted and
/// text values pass through the configured transforms before quoting.
#[derive(Default)]
pub struct MigrationDumper {
    transforms: Vec<Box<dyn ValueTransform>>,
}

impl MigrationDumper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transform(mut self, transform: impl ValueTransform + 'static) -> Self {
        self.transforms.push(Box::new(transform));
        self
    }
}

impl DumpStrategy for MigrationDumper {
    fn dump<'a>(&'a self, connection: &'a mut dyn Connection, config: &'a CreateConfig) -> DumpLines<'a> {
        DumpLines::new(connection, config, IdentifierQuoting::Always, &self.transforms)
    }
}
