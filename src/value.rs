//! Parsed values and the result mapping handed to the formatters.

use serde::Serialize;
use std::collections::BTreeMap;

/// Value of a single usage element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// An argument or value-taking option that received nothing.
    Null,
    /// A command or flag.
    Bool(bool),
    /// A repeatable command or flag.
    Count(u64),
    /// An argument or option value.
    Text(String),
    /// A repeatable argument or option.
    List(Vec<String>),
}

impl Value {
    /// Returns `true` for a set flag, a matched command, a non-zero count
    /// or any text value.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Count(n) => *n > 0,
            Value::Text(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_count(&self) -> Option<u64> {
        match self {
            Value::Count(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Fold a repeated match into an accumulating value.
    ///
    /// Counts add up and lists are extended; any other combination is
    /// replaced by `other`.
    pub(crate) fn accumulate(&mut self, other: Value) {
        match (self, other) {
            (Value::Count(n), Value::Count(m)) => *n += m,
            (Value::List(items), Value::List(more)) => items.extend(more),
            (slot, other) => *slot = other,
        }
    }
}

/// Result of a successful match: element display name to value.
///
/// Names are the ones written in the usage pattern: `--verbose`, `-v`,
/// `<file>`, `FILE` or a command word. Iteration is ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ParsedArgs {
    values: BTreeMap<String, Value>,
}

impl ParsedArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Whether the flag or command `name` was given. Unknown names are `false`.
    pub fn get_bool(&self, name: &str) -> bool {
        self.get(name).is_some_and(Value::is_truthy)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_list(&self, name: &str) -> &[String] {
        self.get(name).and_then(Value::as_list).unwrap_or(&[])
    }

    pub fn get_count(&self, name: &str) -> u64 {
        match self.get(name) {
            Some(Value::Count(n)) => *n,
            Some(Value::Bool(true)) => 1,
            _ => 0,
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, Value)> for ParsedArgs {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
