use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Ordered key → optional value metadata attached to a block.
/// A `None` value is a bare flag such as `[skip]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: Vec<(String, Option<String>)>,
}

/// Returned by [`Attributes::insert`] when the key is already present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateKey(pub String);

impl Attributes {
    pub fn new() -> Self {
        Attributes::default()
    }

    /// Append an entry. Existing keys are never overwritten.
    pub fn insert(&mut self, key: String, value: Option<String>) -> Result<(), DuplicateKey> {
        if self.contains_key(&key) {
            return Err(DuplicateKey(key));
        }
        self.entries.push((key, value));
        Ok(())
    }

    /// `Some(None)` for a flag, `Some(Some(v))` for a valued key.
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_deref())
    }

    /// The value of `key`, if it is present and has one.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.get(key).flatten()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Attributes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Renders as script source: `[label = entry, flag, '$name' = 'it\'s']`.
impl fmt::Display for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, (key, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write_token(f, key)?;
            if let Some(value) = value {
                write!(f, " = ")?;
                write_token(f, value)?;
            }
        }
        write!(f, "]")
    }
}

/// Characters that end a bare attribute token.
pub(crate) fn is_bare_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '@' | ',' | '=' | '\'' | '"' | '[' | ']' | '{' | '}' | '<' | '>' | '|')
}

fn write_token(f: &mut fmt::Formatter<'_>, token: &str) -> fmt::Result {
    if !token.is_empty() && token.chars().all(is_bare_char) {
        return write!(f, "{}", token);
    }
    write!(f, "'")?;
    for c in token.chars() {
        match c {
            '\\' => write!(f, "\\\\")?,
            '\'' => write!(f, "\\'")?,
            '\n' => write!(f, "\\n")?,
            '\r' => write!(f, "\\r")?,
            '\t' => write!(f, "\\t")?,
            c => write!(f, "{}", c)?,
        }
    }
    write!(f, "'")
}
