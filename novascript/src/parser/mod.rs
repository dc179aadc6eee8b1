pub mod attributes;
pub mod error;
pub mod scanner;
mod structural;

pub use error::{ParseError, ParseErrorKind};
pub use structural::parse_blocks;

use crate::Script;

/// Parser entry point.
pub struct Parser {
    source: String,
    file_id: usize,
}

impl Parser {
    pub fn new(source: String, file_id: usize) -> Self {
        Parser { source, file_id }
    }

    /// Parse the whole script. The first error aborts the parse.
    pub fn parse(&self) -> Result<Script, ParseError> {
        let blocks = structural::parse_blocks(&self.source, self.file_id)?;
        Ok(Script {
            blocks,
            source_id: self.file_id,
        })
    }
}
