//! Named-parameter binding.
//!
//! Statements are written with `:name` placeholders and rendered into
//! PostgreSQL positional placeholders (`$1`, `$2`, ...) plus an argument
//! list in slot order. Each distinct name occupies one slot no matter how
//! often it appears, and slots are assigned in parameter insertion order.

use std::collections::{HashMap, HashSet};

use sqlx::Arguments;
use sqlx::postgres::PgArguments;

use authgate_core::error::AppError;
use authgate_core::result::AppResult;
use authgate_core::types::FilterValue;

/// Ordered `name -> value` pairs for one statement build.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedParams {
    entries: Vec<(String, FilterValue)>,
}

impl NamedParams {
    /// Create an empty parameter list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter. An existing name keeps its position and takes the
    /// new value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FilterValue>) -> &mut Self {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
        self
    }

    /// Builder form of [`NamedParams::set`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Look up a parameter value by name.
    pub fn get(&self, name: &str) -> Option<&FilterValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    /// Append every entry of `other`, overriding duplicates in place.
    pub fn merge(&mut self, other: &NamedParams) {
        for (name, value) in &other.entries {
            self.set(name.clone(), value.clone());
        }
    }

    /// Iterate over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no parameters are set.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A statement with positional placeholders and its arguments in slot order.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundQuery {
    /// The rewritten statement.
    pub sql: String,
    /// `args[k - 1]` is the value for `$k`.
    pub args: Vec<FilterValue>,
}

impl BoundQuery {
    /// Encode the arguments for execution with `sqlx::query_with` and friends.
    pub fn arguments(&self) -> AppResult<PgArguments> {
        let mut args = PgArguments::default();
        for value in &self.args {
            let added = match value {
                FilterValue::String(v) => args.add(v.clone()),
                FilterValue::Integer(v) => args.add(*v),
                FilterValue::Float(v) => args.add(*v),
                FilterValue::Boolean(v) => args.add(*v),
                FilterValue::Uuid(v) => args.add(*v),
                FilterValue::NullableUuid(v) => args.add(*v),
                FilterValue::Timestamp(v) => args.add(*v),
                FilterValue::StringList(v) => args.add(v.clone()),
                FilterValue::UuidList(v) => args.add(v.clone()),
            };
            added.map_err(|e| AppError::internal(format!("Failed to encode query argument: {e}")))?;
        }
        Ok(args)
    }
}

/// A lexical piece of a statement template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    /// Text copied verbatim.
    Text(&'a str),
    /// A `:name` placeholder (name without the colon).
    Param(&'a str),
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Index just past the closing `quote` of a literal opened at `start`.
fn skip_quoted(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    bytes[start + 1..]
        .iter()
        .position(|&b| b == quote)
        .map_or(bytes.len(), |offset| start + offset + 2)
}

/// Index just past the newline ending a `--` comment opened at `start`.
fn skip_line_comment(bytes: &[u8], start: usize) -> usize {
    bytes[start + 2..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |offset| start + offset + 3)
}

/// Index just past the `*/` closing a block comment opened at `start`.
fn skip_block_comment(bytes: &[u8], start: usize) -> usize {
    bytes[start + 2..]
        .windows(2)
        .position(|w| w == b"*/")
        .map_or(bytes.len(), |offset| start + offset + 4)
}

/// Index just past a `$tag$ ... $tag$` body opened at `start`.
///
/// A `$` that does not open a tag (such as `$1`) only advances by one.
fn skip_dollar_quoted(template: &str, start: usize) -> usize {
    let bytes = template.as_bytes();
    let mut tag_end = start + 1;
    if bytes
        .get(tag_end)
        .is_some_and(|b| b.is_ascii_alphabetic() || *b == b'_')
    {
        while bytes.get(tag_end).is_some_and(|b| is_name_byte(*b)) {
            tag_end += 1;
        }
    }
    if bytes.get(tag_end) != Some(&b'$') {
        return start + 1;
    }

    let tag = &template[start..=tag_end];
    let body_start = tag_end + 1;
    template[body_start..]
        .find(tag)
        .map_or(template.len(), |offset| body_start + offset + tag.len())
}

/// Split a template into verbatim text and `:name` placeholders.
///
/// Quoted literals and identifiers, dollar-quoted bodies and comments are
/// copied untouched, and `::type` casts are never read as placeholders.
fn tokenize(template: &str) -> Vec<Token<'_>> {
    let bytes = template.as_bytes();
    let mut tokens = Vec::new();
    let mut text_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let next = bytes.get(i + 1).copied();
        i = match (bytes[i], next) {
            (b'\'' | b'"', _) => skip_quoted(bytes, i),
            (b'-', Some(b'-')) => skip_line_comment(bytes, i),
            (b'/', Some(b'*')) => skip_block_comment(bytes, i),
            (b'$', _) => skip_dollar_quoted(template, i),
            (b':', Some(b':')) => i + 2,
            (b':', Some(n)) if is_name_byte(n) => {
                let name_start = i + 1;
                let mut name_end = name_start;
                while bytes.get(name_end).is_some_and(|b| is_name_byte(*b)) {
                    name_end += 1;
                }
                if text_start < i {
                    tokens.push(Token::Text(&template[text_start..i]));
                }
                tokens.push(Token::Param(&template[name_start..name_end]));
                text_start = name_end;
                name_end
            }
            _ => i + 1,
        };
    }

    if text_start < template.len() {
        tokens.push(Token::Text(&template[text_start..]));
    }
    tokens
}

/// Rewrite `:name` placeholders into positional ones.
///
/// Only non-empty names present in `params` are substituted. A parameter
/// whose placeholder does not occur in the template gets no slot and no
/// argument. Placeholders with no matching parameter are left as written.
pub fn bind_named(template: &str, params: &NamedParams) -> BoundQuery {
    let tokens = tokenize(template);
    let used: HashSet<&str> = tokens
        .iter()
        .filter_map(|t| match t {
            Token::Param(name) => Some(*name),
            Token::Text(_) => None,
        })
        .collect();

    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut args = Vec::new();
    for (name, value) in params.iter() {
        if name.is_empty() || !used.contains(name) || slots.contains_key(name) {
            continue;
        }
        args.push(value.clone());
        slots.insert(name, args.len());
    }

    let mut sql = String::with_capacity(template.len());
    for token in tokens {
        match token {
            Token::Text(text) => sql.push_str(text),
            Token::Param(name) => match slots.get(name) {
                Some(slot) => {
                    sql.push('$');
                    sql.push_str(&slot.to_string());
                }
                None => {
                    sql.push(':');
                    sql.push_str(name);
                }
            },
        }
    }

    BoundQuery { sql, args }
}

/// Number every occurrence of a literal placeholder `$1..$N`, left to right.
///
/// Returns the rewritten template and the number of occurrences.
pub fn number_placeholders(template: &str, placeholder: &str) -> (String, usize) {
    if placeholder.is_empty() {
        return (template.to_string(), 0);
    }

    let mut sql = String::with_capacity(template.len());
    let mut count = 0;
    for (i, part) in template.split(placeholder).enumerate() {
        if i > 0 {
            count += 1;
            sql.push('$');
            sql.push_str(&count.to_string());
        }
        sql.push_str(part);
    }
    (sql, count)
}
