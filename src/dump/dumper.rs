use super::encode::NO_TRANSFORMS;
use super::{DumpLines, DumpStrategy, IdentifierQuoting};
use crate::config::CreateConfig;
use crate::drivers::Connection;

/// Plain dump: values as stored, identifiers quoted only where SQL needs it.
#[derive(Debug, Default, Clone, Copy)]
pub struct Dumper;

impl DumpStrategy for Dumper {
    fn dump<'a>(&'a self, connection: &'a mut dyn Connection, config: &'a CreateConfig) -> DumpLines<'a> {
        DumpLines::new(connection, config, IdentifierQuoting::WhenRequired, NO_TRANSFORMS)
    }
}
