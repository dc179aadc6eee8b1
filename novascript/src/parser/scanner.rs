use crate::parser::error::{ParseError, ParseErrorKind};

/// A location in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Byte offset.
    pub offset: usize,
    /// 1-based line.
    pub line: usize,
    /// 1-based column, counted in chars.
    pub column: usize,
}

impl Position {
    pub const START: Position = Position {
        offset: 0,
        line: 1,
        column: 1,
    };
}

/// Spans of embedded code inside which `|>` is not a delimiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpaqueSpan {
    /// `--[[ ... ]]`, `--[==[ ... ]==]`
    BlockComment,
    /// `-- ...` up to the end of the line
    LineComment,
    /// `[[ ... ]]`, `[==[ ... ]==]`
    LongString,
    /// `'...'` or `"..."` with backslash escapes
    QuotedString,
}

/// Tried in order at every position: the openers share prefixes.
const OPENERS: [OpaqueSpan; 4] = [
    OpaqueSpan::BlockComment,
    OpaqueSpan::LineComment,
    OpaqueSpan::LongString,
    OpaqueSpan::QuotedString,
];

impl OpaqueSpan {
    /// Byte length of this span's opener if `rest` starts with one.
    fn match_opener(self, rest: &str) -> Option<usize> {
        match self {
            OpaqueSpan::BlockComment => rest
                .strip_prefix("--")
                .and_then(long_bracket_level)
                .map(|level| level + 4),
            OpaqueSpan::LineComment => rest.starts_with("--").then_some(2),
            OpaqueSpan::LongString => long_bracket_level(rest).map(|level| level + 2),
            OpaqueSpan::QuotedString => {
                matches!(rest.as_bytes().first(), Some(b'\'' | b'"')).then_some(1)
            }
        }
    }
}

/// Number of `=` in a long-bracket opener (`[[` is level 0, `[==[` level 2).
fn long_bracket_level(rest: &str) -> Option<usize> {
    let bytes = rest.as_bytes();
    if bytes.first() != Some(&b'[') {
        return None;
    }
    let level = bytes[1..].iter().take_while(|&&b| b == b'=').count();
    (bytes.get(level + 1) == Some(&b'[')).then_some(level)
}

/// Any whitespace except `\n`, which ends a line.
pub fn is_inline_whitespace(c: char) -> bool {
    c.is_whitespace() && c != '\n'
}

/// Character cursor over a script, tracking line and column.
#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    text: &'a str,
    end: usize,
    pos: Position,
    file_id: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(text: &'a str, file_id: usize) -> Self {
        Scanner {
            text,
            end: text.len(),
            pos: Position::START,
            file_id,
        }
    }

    /// A copy of this cursor that treats `end` as the end of input.
    pub fn bounded(&self, end: usize) -> Scanner<'a> {
        Scanner {
            end: end.clamp(self.pos.offset, self.end),
            ..self.clone()
        }
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    pub fn file_id(&self) -> usize {
        self.file_id
    }

    pub fn position(&self) -> Position {
        self.pos
    }

    pub fn offset(&self) -> usize {
        self.pos.offset
    }

    pub fn is_eof(&self) -> bool {
        self.pos.offset >= self.end
    }

    /// Unconsumed input.
    pub fn rest(&self) -> &'a str {
        &self.text[self.pos.offset..self.end]
    }

    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    pub fn starts_with(&self, pat: &str) -> bool {
        self.rest().starts_with(pat)
    }

    pub fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos.offset += c.len_utf8();
        if c == '\n' {
            self.pos.line += 1;
            self.pos.column = 1;
        } else {
            self.pos.column += 1;
        }
        Some(c)
    }

    /// Consume `pat` if the input starts with it.
    pub fn eat(&mut self, pat: &str) -> bool {
        if self.starts_with(pat) {
            self.advance_by(pat.len());
            true
        } else {
            false
        }
    }

    pub fn advance_by(&mut self, bytes: usize) {
        self.advance_to(self.pos.offset + bytes);
    }

    /// Move forward to `offset`, counting lines on the way.
    pub fn advance_to(&mut self, offset: usize) {
        while self.pos.offset < offset && self.bump().is_some() {}
    }

    /// Skip whitespace up to, not including, the next newline.
    pub fn skip_inline_whitespace(&mut self) {
        while self.peek().is_some_and(is_inline_whitespace) {
            self.bump();
        }
    }

    pub fn error_at(
        &self,
        at: Position,
        len: usize,
        kind: ParseErrorKind,
        message: impl Into<String>,
    ) -> ParseError {
        ParseError::new(
            kind,
            message,
            at.offset..at.offset + len,
            at.line,
            at.column,
            self.file_id,
        )
    }

    /// The opaque span opening at the cursor, if any.
    pub fn opaque_span_at(&self) -> Option<OpaqueSpan> {
        let rest = self.rest();
        OPENERS
            .into_iter()
            .find(|span| span.match_opener(rest).is_some())
    }

    /// Consume a whole opaque span if one opens at the cursor.
    pub fn skip_opaque_span(&mut self) -> Result<Option<OpaqueSpan>, ParseError> {
        let rest = self.rest();
        let Some((span, opener_len)) = OPENERS
            .into_iter()
            .find_map(|span| span.match_opener(rest).map(|len| (span, len)))
        else {
            return Ok(None);
        };
        let start = self.position();

        match span {
            OpaqueSpan::BlockComment | OpaqueSpan::LongString => {
                let brackets = if span == OpaqueSpan::BlockComment { 4 } else { 2 };
                let closer = format!("]{}]", "=".repeat(opener_len - brackets));
                self.advance_by(opener_len);
                let Some(found) = self.rest().find(&closer) else {
                    return Err(self
                        .error_at(
                            start,
                            opener_len,
                            ParseErrorKind::UnterminatedLongBracket,
                            "unterminated long bracket",
                        )
                        .with_note(format!("expected a closing `{}`", closer)));
                };
                self.advance_by(found + closer.len());
            }
            OpaqueSpan::LineComment => {
                self.advance_by(opener_len);
                while self.peek().is_some_and(|c| c != '\n') {
                    self.bump();
                }
            }
            OpaqueSpan::QuotedString => {
                let quote = self.bump();
                loop {
                    match self.bump() {
                        Some('\\') => {
                            self.bump();
                        }
                        Some(c) if Some(c) == quote => break,
                        Some(_) => {}
                        None => {
                            return Err(self.error_at(
                                start,
                                opener_len,
                                ParseErrorKind::UnterminatedQuotedString,
                                "unterminated quoted string",
                            ));
                        }
                    }
                }
            }
        }

        Ok(Some(span))
    }

    /// Advance to the first `|>` outside any opaque span and return its offset,
    /// leaving the cursor on it. `Ok(None)` if input ends first.
    pub fn scan_to_block_close(&mut self) -> Result<Option<usize>, ParseError> {
        loop {
            if self.is_eof() {
                return Ok(None);
            }
            if self.starts_with("|>") {
                return Ok(Some(self.offset()));
            }
            if self.skip_opaque_span()?.is_none() {
                self.bump();
            }
        }
    }
}

/// Find the `|>` closing an execution block whose content starts at `start`.
pub fn scan_until_block_close(text: &str, start: usize) -> Result<Option<usize>, ParseError> {
    let mut scanner = Scanner::new(text, 0);
    scanner.advance_to(start);
    scanner.scan_to_block_close()
}
