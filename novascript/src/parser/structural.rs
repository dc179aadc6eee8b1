use std::ops::Range;

use tracing::{debug, trace};

use crate::block::Block;
use crate::block::attributes::Attributes;
use crate::parser::attributes::parse_attribute_list;
use crate::parser::error::{ParseError, ParseErrorKind};
use crate::parser::scanner::{Position, Scanner, is_inline_whitespace};

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Split script source into text, execution and separator blocks.
pub fn parse_blocks(source: &str, file_id: usize) -> Result<Vec<Block>, ParseError> {
    let mut state = ParseState::new(source, file_id);
    state.run()?;
    Ok(state.finalize())
}

// ---------------------------------------------------------------------------
// Parse state
// ---------------------------------------------------------------------------

enum AssemblerState {
    BetweenBlocks,
    /// The cursor is at the start of a prose line.
    InText,
    /// The cursor is at the start of an execution block header.
    InExecution(Header),
}

/// Offsets of an execution block header: `@[attrs]<|`.
#[derive(Debug, Clone)]
struct Header {
    /// Byte offset of the first header character.
    start: usize,
    eager: bool,
    /// Byte range of `[ ... ]` and any whitespace before `<|`.
    attributes: Option<Range<usize>>,
    /// Byte offset of `<|`.
    opener: usize,
}

impl Header {
    /// Turn line-relative offsets into document offsets.
    fn shift(&mut self, by: usize) {
        self.start += by;
        self.opener += by;
        if let Some(range) = &mut self.attributes {
            range.start += by;
            range.end += by;
        }
    }
}

struct ParseState<'a> {
    source: &'a str,
    scanner: Scanner<'a>,
    state: AssemblerState,
    blocks: Vec<Block>,
    /// Start of a blank-line run following a content block, and where it ends.
    pending_separator: Option<(Position, usize)>,
}

impl<'a> ParseState<'a> {
    fn new(source: &'a str, file_id: usize) -> Self {
        ParseState {
            source,
            scanner: Scanner::new(source, file_id),
            state: AssemblerState::BetweenBlocks,
            blocks: Vec::new(),
            pending_separator: None,
        }
    }

    fn run(&mut self) -> Result<(), ParseError> {
        self.scanner.eat("\u{feff}");

        loop {
            match std::mem::replace(&mut self.state, AssemblerState::BetweenBlocks) {
                AssemblerState::BetweenBlocks => {
                    if self.scanner.is_eof() {
                        return Ok(());
                    }
                    self.state = self.between_blocks();
                }
                AssemblerState::InText => self.text_line(),
                AssemblerState::InExecution(header) => self.execution_block(header)?,
            }
        }
    }

    /// Look at the line under the cursor and decide what it starts.
    fn between_blocks(&mut self) -> AssemblerState {
        let line_start = self.scanner.offset();
        let line = current_line(self.scanner.rest());

        if line.chars().all(is_inline_whitespace) {
            self.blank_line(line.len());
            return AssemblerState::BetweenBlocks;
        }

        self.flush_separator();

        match classify_line(line) {
            Some(mut header) => {
                header.shift(line_start);
                self.scanner.advance_to(header.start);
                AssemblerState::InExecution(header)
            }
            None => AssemblerState::InText,
        }
    }

    fn blank_line(&mut self, len: usize) {
        let start = self.scanner.position();
        self.scanner.advance_by(len);
        let end = self.scanner.offset();
        self.scanner.eat("\n");

        // Blank lines before the first block are trimmed.
        if self.blocks.is_empty() {
            return;
        }
        match &mut self.pending_separator {
            Some((_, run_end)) => *run_end = end,
            None => self.pending_separator = Some((start, end)),
        }
    }

    fn flush_separator(&mut self) {
        if let Some((start, end)) = self.pending_separator.take() {
            self.push(Block::separator(start.line, start.offset..end));
        }
    }

    fn text_line(&mut self) {
        let start = self.scanner.position();
        let line = current_line(self.scanner.rest());
        let content = line.strip_suffix('\r').unwrap_or(line);

        self.scanner.advance_by(line.len());
        let end = self.scanner.offset();
        self.scanner.eat("\n");

        self.push(Block::text(content, start.line, start.offset..end));
    }

    fn execution_block(&mut self, header: Header) -> Result<(), ParseError> {
        let start = self.scanner.position();

        let attributes = match &header.attributes {
            Some(range) => {
                let mut attrs = self.scanner.clone();
                attrs.advance_to(range.start);
                parse_attribute_list(attrs.bounded(range.end))?
            }
            None => Attributes::new(),
        };

        self.scanner.advance_to(header.opener);
        self.scanner.advance_by(2);
        let content_start = self.scanner.offset();

        let Some(close) = self.scanner.scan_to_block_close()? else {
            return Err(self
                .scanner
                .error_at(
                    start,
                    header.opener + 2 - start.offset,
                    ParseErrorKind::UnterminatedBlock,
                    "unterminated execution block",
                )
                .with_note("expected a matching `|>` outside strings and comments"));
        };
        let content = self.source[content_start..close].replace("\r\n", "\n");

        self.scanner.advance_by(2);
        let end = self.scanner.offset();

        self.scanner.skip_inline_whitespace();
        if !self.scanner.is_eof() && !self.scanner.eat("\n") {
            let trailing = current_line(self.scanner.rest());
            return Err(self
                .scanner
                .error_at(
                    self.scanner.position(),
                    trailing.len(),
                    ParseErrorKind::TrailingContent,
                    "unexpected content after `|>`",
                )
                .with_note("an execution block must be the last thing on its line"));
        }

        self.push(Block::execution(
            header.eager,
            content,
            attributes,
            start.line,
            start.offset..end,
        ));
        Ok(())
    }

    fn push(&mut self, block: Block) {
        trace!(
            line = block.line,
            block_type = block.block_type.name(),
            "parsed block"
        );
        self.blocks.push(block);
    }

    fn finalize(self) -> Vec<Block> {
        // A trailing blank run never becomes a separator.
        debug!(blocks = self.blocks.len(), "parsed script");
        self.blocks
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// The text up to (not including) the next `\n`.
fn current_line(rest: &str) -> &str {
    rest.find('\n').map_or(rest, |end| &rest[..end])
}

/// Return the header, with offsets relative to `line`, if `line` opens an
/// execution block. `None` if it is prose.
///
/// After leading whitespace and an optional `@`, a header is either `<|` or an
/// attribute list followed by `<|`.
fn classify_line(line: &str) -> Option<Header> {
    let skip_ws = |from: usize| {
        line.len() - line[from..].trim_start_matches(is_inline_whitespace).len()
    };

    let start = skip_ws(0);
    let eager = line[start..].starts_with('@');
    let i = if eager { skip_ws(start + 1) } else { start };

    let rest = &line[i..];
    let (attributes, opener) = if rest.starts_with("<|") {
        (None, i)
    } else if rest.starts_with('[') {
        let opener = i + find_block_opener(rest)?;
        (Some(i..opener), opener)
    } else {
        return None;
    };

    Some(Header {
        start,
        eager,
        attributes,
        opener,
    })
}

/// Offset of the `<|` after the attribute list that opens `header`.
///
/// The list ends at the first `]` outside quotes, and only whitespace may sit
/// between that `]` and `<|`. A `<|` reached before the `]` still counts, so
/// the attribute parser reports the unclosed list.
fn find_block_opener(header: &str) -> Option<usize> {
    let mut quote = None;
    let mut escaped = false;

    for (i, c) in header.char_indices() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == ']' => {
                let after = &header[i + 1..];
                let gap = after.len() - after.trim_start_matches(is_inline_whitespace).len();
                return after[gap..].starts_with("<|").then_some(i + 1 + gap);
            }
            None if header[i..].starts_with("<|") => return Some(i),
            None => {}
        }
    }

    // An unclosed quote hides every opener. Still treat the line as a header
    // so the attribute parser reports the quote.
    if quote.is_some() {
        header.find("<|")
    } else {
        None
    }
}
