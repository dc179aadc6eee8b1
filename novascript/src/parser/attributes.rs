use crate::block::attributes::{Attributes, DuplicateKey, is_bare_char};
use crate::parser::error::{ParseError, ParseErrorKind};
use crate::parser::scanner::{Position, Scanner};

/// Parse `[k1 = v1, flag, 'quoted key' = 'v']`.
///
/// `scanner` must be bounded to the attribute list: everything between the
/// optional `@` and the block opener `<|`. Only whitespace may follow the `]`.
pub fn parse_attribute_list(scanner: Scanner<'_>) -> Result<Attributes, ParseError> {
    AttributeParser { scanner }.parse()
}

struct AttributeParser<'a> {
    scanner: Scanner<'a>,
}

impl AttributeParser<'_> {
    fn error(&self, msg: impl Into<String>) -> ParseError {
        let len = self.scanner.peek().map_or(0, char::len_utf8);
        self.scanner.error_at(
            self.scanner.position(),
            len,
            ParseErrorKind::MalformedAttributeList,
            msg,
        )
    }

    fn parse(mut self) -> Result<Attributes, ParseError> {
        self.scanner.skip_inline_whitespace();
        let open = self.scanner.position();
        if !self.scanner.eat("[") {
            return Err(self.error("expected `[` to open the attribute list"));
        }

        let mut attributes = Attributes::new();
        loop {
            self.scanner.skip_inline_whitespace();
            if self.scanner.eat("]") {
                break;
            }
            if self.scanner.is_eof() {
                return Err(self.unclosed(open));
            }

            let key_start = self.scanner.position();
            let key = self.expect_token("attribute key")?;
            let key_len = self.scanner.offset() - key_start.offset;

            self.scanner.skip_inline_whitespace();
            let value = if self.scanner.eat("=") {
                self.scanner.skip_inline_whitespace();
                Some(self.expect_token("attribute value after `=`")?)
            } else {
                None
            };

            attributes.insert(key, value).map_err(|DuplicateKey(key)| {
                self.scanner.error_at(
                    key_start,
                    key_len,
                    ParseErrorKind::DuplicatedAttributeKey,
                    format!("duplicated attribute key `{}`", key),
                )
            })?;

            self.scanner.skip_inline_whitespace();
            if self.scanner.eat(",") {
                continue;
            }
            if self.scanner.eat("]") {
                break;
            }
            if self.scanner.is_eof() {
                return Err(self.unclosed(open));
            }
            return Err(self.error("expected `,` or `]` in attribute list"));
        }

        self.scanner.skip_inline_whitespace();
        if !self.scanner.is_eof() {
            return Err(self.error("unexpected text between attribute list and `<|`"));
        }
        Ok(attributes)
    }

    fn unclosed(&self, open: Position) -> ParseError {
        self.scanner
            .error_at(
                open,
                1,
                ParseErrorKind::MalformedAttributeList,
                "unclosed attribute list",
            )
            .with_note("expected `]` before `<|`")
    }

    /// A bare identifier or a quoted string.
    fn expect_token(&mut self, what: &str) -> Result<String, ParseError> {
        match self.scanner.peek() {
            Some(quote @ ('\'' | '"')) => self.quoted(quote),
            Some(c) if is_bare_char(c) => {
                let start = self.scanner.offset();
                while self.scanner.peek().is_some_and(is_bare_char) {
                    self.scanner.bump();
                }
                Ok(self.scanner.text()[start..self.scanner.offset()].to_string())
            }
            _ => Err(self.error(format!("expected {}", what))),
        }
    }

    fn quoted(&mut self, quote: char) -> Result<String, ParseError> {
        let start = self.scanner.position();
        self.scanner.bump();
        let mut out = String::new();
        loop {
            match self.scanner.bump() {
                Some('\\') => {
                    if let Some(c) = self.scanner.bump() {
                        out.push(unescape(c));
                    }
                }
                Some(c) if c == quote => return Ok(out),
                Some(c) => out.push(c),
                None => {
                    return Err(self.scanner.error_at(
                        start,
                        1,
                        ParseErrorKind::MalformedAttributeList,
                        "unterminated quoted string in attribute list",
                    ));
                }
            }
        }
    }
}

fn unescape(c: char) -> char {
    match c {
        'a' => '\u{7}',
        'b' => '\u{8}',
        'f' => '\u{c}',
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        'v' => '\u{b}',
        c => c,
    }
}
