use std::fmt;
use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic, Label, Severity};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The reason a parse was aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
pub enum ParseErrorKind {
    /// `<|` with no matching `|>` outside strings and comments.
    #[error("unterminated execution block")]
    UnterminatedBlock,
    #[error("malformed attribute list")]
    MalformedAttributeList,
    #[error("duplicated attribute key")]
    DuplicatedAttributeKey,
    #[error("unterminated quoted string")]
    UnterminatedQuotedString,
    /// `[[` or `--[[` with no matching closing bracket.
    #[error("unterminated long bracket")]
    UnterminatedLongBracket,
    /// Non-whitespace text after `|>` on the same line.
    #[error("unexpected content after block end")]
    TrailingContent,
}

impl ParseErrorKind {
    /// Variant name, used as the diagnostic code.
    pub fn name(self) -> &'static str {
        match self {
            ParseErrorKind::UnterminatedBlock => "UnterminatedBlock",
            ParseErrorKind::MalformedAttributeList => "MalformedAttributeList",
            ParseErrorKind::DuplicatedAttributeKey => "DuplicatedAttributeKey",
            ParseErrorKind::UnterminatedQuotedString => "UnterminatedQuotedString",
            ParseErrorKind::UnterminatedLongBracket => "UnterminatedLongBracket",
            ParseErrorKind::TrailingContent => "TrailingContent",
        }
    }
}

/// Parse error with source location information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Byte span in source.
    pub span: Range<usize>,
    /// 1-based line of `span.start`.
    pub line: usize,
    /// 1-based column (in chars) of `span.start`.
    pub column: usize,
    pub file_id: usize,
    pub notes: Vec<String>,
}

impl ParseError {
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        span: Range<usize>,
        line: usize,
        column: usize,
        file_id: usize,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            span,
            line,
            column,
            file_id,
            notes: Vec::new(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Convert to a codespan-reporting Diagnostic for display.
    pub fn to_diagnostic(&self) -> Diagnostic<usize> {
        Diagnostic::new(Severity::Error)
            .with_message(&self.message)
            .with_code(self.kind.name())
            .with_labels(vec![
                Label::primary(self.file_id, self.span.clone()).with_message(self.kind.to_string()),
            ])
            .with_notes(self.notes.clone())
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}: {}", self.line, self.column, self.message)
    }
}

impl std::error::Error for ParseError {}
