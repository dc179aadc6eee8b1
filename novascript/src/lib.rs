pub mod block;
pub mod chunk;
pub mod parser;

use std::fmt;

pub use crate::block::attributes::Attributes;
pub use crate::block::{Block, BlockType};
pub use crate::chunk::Chunk;
pub use crate::parser::{ParseError, ParseErrorKind};

/// A parsed script.
#[derive(Debug, Clone)]
pub struct Script {
    /// Blocks in source order.
    pub blocks: Vec<Block>,
    /// The source file ID (for error reporting with codespan-reporting).
    pub source_id: usize,
}

impl Script {
    /// Group the blocks into dialogue chunks.
    pub fn chunks(&self) -> Vec<Chunk> {
        chunk::split_chunks(self.blocks.clone())
    }
}

/// Renders the script back to source, one block per line.
impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in &self.blocks {
            writeln!(f, "{}", block)?;
        }
        Ok(())
    }
}

/// Parse script source into blocks.
pub fn parse(source: &str) -> Result<Vec<Block>, ParseError> {
    parser::parse_blocks(source, 0)
}
