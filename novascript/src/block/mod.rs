pub mod attributes;

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::block::attributes::Attributes;

/// How a block's content is treated by the flow-graph builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockType {
    /// `@<| ... |>`: run while the flow graph is built.
    EagerExecution,
    /// `<| ... |>`: run when the dialogue is reached.
    LazyExecution,
    /// A literal dialogue line.
    Text,
    /// Paragraph boundary collapsed from one or more blank lines.
    Separator,
}

impl BlockType {
    pub fn name(self) -> &'static str {
        match self {
            BlockType::EagerExecution => "EagerExecution",
            BlockType::LazyExecution => "LazyExecution",
            BlockType::Text => "Text",
            BlockType::Separator => "Separator",
        }
    }
}

/// One unit of a parsed script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    #[serde(rename = "type")]
    pub block_type: BlockType,
    /// Code between `<|` and `|>`, or the text line. Empty for separators.
    pub content: String,
    /// Always present, empty when the block has no attribute list.
    pub attributes: Attributes,
    /// 1-based line where the block starts.
    pub line: usize,
    /// Byte span in source for error reporting.
    pub span: Range<usize>,
}

impl Block {
    pub fn text(content: impl Into<String>, line: usize, span: Range<usize>) -> Self {
        Block {
            block_type: BlockType::Text,
            content: content.into(),
            attributes: Attributes::new(),
            line,
            span,
        }
    }

    pub fn separator(line: usize, span: Range<usize>) -> Self {
        Block {
            block_type: BlockType::Separator,
            content: String::new(),
            attributes: Attributes::new(),
            line,
            span,
        }
    }

    pub fn execution(
        eager: bool,
        content: impl Into<String>,
        attributes: Attributes,
        line: usize,
        span: Range<usize>,
    ) -> Self {
        Block {
            block_type: if eager {
                BlockType::EagerExecution
            } else {
                BlockType::LazyExecution
            },
            content: content.into(),
            attributes,
            line,
            span,
        }
    }

    /// Whether type, content and attributes match, ignoring source location.
    pub fn same_as(&self, other: &Block) -> bool {
        self.block_type == other.block_type
            && self.content == other.content
            && self.attributes == other.attributes
    }
}

/// Renders the block back as script source.
impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.block_type {
            BlockType::Text => write!(f, "{}", self.content),
            BlockType::Separator => Ok(()),
            BlockType::EagerExecution | BlockType::LazyExecution => {
                if self.block_type == BlockType::EagerExecution {
                    write!(f, "@")?;
                }
                if !self.attributes.is_empty() {
                    write!(f, "{}", self.attributes)?;
                }
                write!(f, "<|{}|>", self.content)
            }
        }
    }
}
