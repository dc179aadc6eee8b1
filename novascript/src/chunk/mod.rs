use serde::Serialize;

use crate::block::{Block, BlockType};

/// Consecutive blocks that make up one dialogue entry, or a single eager block.
/// Chunks are never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub blocks: Vec<Block>,
}

impl Chunk {
    /// Line of the first block.
    pub fn line(&self) -> usize {
        self.blocks.first().map_or(0, |b| b.line)
    }

    /// A chunk holding a single eager execution block.
    pub fn is_eager(&self) -> bool {
        matches!(
            self.blocks.as_slice(),
            [block] if block.block_type == BlockType::EagerExecution
        )
    }

    /// The text lines of the chunk joined with newlines.
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .filter(|b| b.block_type == BlockType::Text)
            .map(|b| b.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn lazy_blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks
            .iter()
            .filter(|b| b.block_type == BlockType::LazyExecution)
    }
}

/// Split blocks at separators and around eager execution blocks.
/// Separators themselves are dropped.
pub fn split_chunks(blocks: Vec<Block>) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current = Vec::new();

    fn flush(current: &mut Vec<Block>, chunks: &mut Vec<Chunk>) {
        if !current.is_empty() {
            chunks.push(Chunk {
                blocks: std::mem::take(current),
            });
        }
    }

    for block in blocks {
        match block.block_type {
            BlockType::Separator => flush(&mut current, &mut chunks),
            BlockType::EagerExecution => {
                flush(&mut current, &mut chunks);
                current.push(block);
                flush(&mut current, &mut chunks);
            }
            BlockType::LazyExecution | BlockType::Text => current.push(block),
        }
    }
    flush(&mut current, &mut chunks);

    chunks
}
