//! Option definitions and the help-text section scanner.

use crate::value::Value;
use regex::Regex;
use std::sync::LazyLock;

static USAGE_SECTION: LazyLock<Regex> = LazyLock::new(|| section_regex("usage:"));
static OPTIONS_SECTION: LazyLock<Regex> = LazyLock::new(|| section_regex("options:"));
static DEFAULT_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[default: ([^\]]*)\]").expect("static regex must compile")
});

/// A section starts at any line containing `name` and runs over every
/// following indented line.
fn section_regex(name: &str) -> Regex {
    let pattern = format!(
        r"(?im)^([^\n]*{}[^\n]*\n?(?:[ \t].*?(?:\n|$))*)",
        regex::escape(name)
    );
    Regex::new(&pattern).expect("static regex must compile")
}

fn find_sections(section: &Regex, doc: &str) -> Vec<String> {
    section
        .captures_iter(doc)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .collect()
}

/// All "usage:" sections of `doc`, trimmed.
pub fn usage_sections(doc: &str) -> Vec<String> {
    find_sections(&USAGE_SECTION, doc)
}

/// All "options:" sections of `doc`, trimmed.
pub fn options_sections(doc: &str) -> Vec<String> {
    find_sections(&OPTIONS_SECTION, doc)
}

/// One option as declared in an options block or discovered in a usage
/// pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionDef {
    /// Short flag including the dash, e.g. `-v`.
    pub short: Option<String>,
    /// Long flag including the dashes, e.g. `--verbose`.
    pub long: Option<String>,
    /// Whether the option consumes one value.
    pub takes_value: bool,
    /// `[default: X]`, only meaningful for value-taking options.
    pub default: Option<String>,
}

impl OptionDef {
    pub fn flag(short: Option<&str>, long: Option<&str>) -> Self {
        Self {
            short: short.map(str::to_string),
            long: long.map(str::to_string),
            takes_value: false,
            default: None,
        }
    }

    pub fn with_value(short: Option<&str>, long: Option<&str>, default: Option<&str>) -> Self {
        Self {
            short: short.map(str::to_string),
            long: long.map(str::to_string),
            takes_value: true,
            default: default.map(str::to_string),
        }
    }

    /// Parse one options-block entry such as
    /// `-o FILE, --output=FILE  Where to write [default: out.txt]`.
    ///
    /// Returns `None` when the entry names no flag.
    pub fn parse(entry: &str) -> Option<Self> {
        let entry = entry.trim();
        let (flags, description) = entry.split_once("  ").unwrap_or((entry, ""));
        let flags = flags.replace([',', '='], " ");

        let mut def = Self::flag(None, None);
        for word in flags.split_whitespace() {
            if word.starts_with("--") {
                def.long = Some(word.to_string());
            } else if word.starts_with('-') {
                def.short = Some(word.to_string());
            } else {
                def.takes_value = true;
            }
        }
        if def.short.is_none() && def.long.is_none() {
            return None;
        }
        if def.takes_value {
            def.default = DEFAULT_VALUE
                .captures(description)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string());
        }
        Some(def)
    }

    /// The name the option is reported under: long if present, else short.
    pub fn name(&self) -> &str {
        self.long
            .as_deref()
            .or(self.short.as_deref())
            .unwrap_or_default()
    }

    /// Two definitions are the same option when both flags agree.
    pub fn same_identity(&self, other: &OptionDef) -> bool {
        self.short == other.short && self.long == other.long
    }

    /// Value of the option before anything is matched.
    pub fn initial_value(&self) -> Value {
        if self.takes_value {
            self.default.clone().map_or(Value::Null, Value::Text)
        } else {
            Value::Bool(false)
        }
    }
}

/// The set of known options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    defs: Vec<OptionDef>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every option declared in the options sections of `doc`.
    pub fn from_doc(doc: &str) -> Self {
        let mut registry = Self::new();
        for section in options_sections(doc) {
            let body = section.split_once(':').map_or("", |(_, rest)| rest);
            for entry in split_entries(body) {
                if let Some(def) = OptionDef::parse(&entry) {
                    registry.insert(def);
                }
            }
        }
        registry
    }

    /// Add `def`, replacing an earlier definition with the same flags.
    pub fn insert(&mut self, def: OptionDef) {
        match self.defs.iter_mut().find(|d| d.same_identity(&def)) {
            Some(existing) => *existing = def,
            None => self.defs.push(def),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &OptionDef> {
        self.defs.iter()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn with_short(&self, short: &str) -> Vec<&OptionDef> {
        self.defs
            .iter()
            .filter(|d| d.short.as_deref() == Some(short))
            .collect()
    }

    pub fn with_long(&self, long: &str) -> Vec<&OptionDef> {
        self.defs
            .iter()
            .filter(|d| d.long.as_deref() == Some(long))
            .collect()
    }

    /// Options whose long flag starts with `prefix`.
    pub fn with_long_prefix(&self, prefix: &str) -> Vec<&OptionDef> {
        self.defs
            .iter()
            .filter(|d| d.long.as_deref().is_some_and(|l| l.starts_with(prefix)))
            .collect()
    }
}

/// Split an options block into entries, one per line starting with a dash.
/// Continuation lines belong to the entry above; text before the first
/// entry is dropped.
fn split_entries(body: &str) -> Vec<String> {
    let mut entries: Vec<String> = Vec::new();
    let mut current: Option<String> = None;

    for line in body.lines() {
        let mut chars = line.trim_start().chars();
        let starts_entry =
            chars.next() == Some('-') && chars.next().is_some_and(|c| !c.is_whitespace());
        if starts_entry {
            entries.extend(current.take());
            current = Some(line.to_string());
        } else if let Some(entry) = current.as_mut() {
            entry.push('\n');
            entry.push_str(line);
        }
    }
    entries.extend(current);
    entries
}
