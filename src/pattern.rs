//! Usage-pattern compiler.
//!
//! Turns the usage section of a help text into a [`Pattern`] tree. Options
//! mentioned in the usage but absent from the options block are added to the
//! [`Registry`] as they are met, so argv tokenizing knows about them too.

use crate::docopt::DocoptError;
use crate::options::{OptionDef, Registry};
use crate::value::Value;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

static GROUPING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\[\]()|]|\.\.\.)").expect("static regex must compile"));
static USAGE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\S*<[^>]*>|\S+").expect("static regex must compile"));

/// A named element of a usage pattern together with its unmatched value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    pub name: String,
    pub value: Value,
}

impl Leaf {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Whether repeated matches accumulate into this leaf.
    pub fn is_collecting(&self) -> bool {
        matches!(self.value, Value::Count(_) | Value::List(_))
    }
}

/// Node of a compiled usage pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// `<name>` or `NAME`.
    Argument(Leaf),
    /// A literal word such as `add`, `-` or `--`.
    Command(Leaf),
    /// A short or long option, named after its long flag when it has one.
    Option(Leaf),
    /// `( ... )` and the implicit sequence of a usage line.
    Required(Vec<Pattern>),
    /// `[ ... ]`.
    Optional(Vec<Pattern>),
    /// `[options]`, filled with the options-block entries not named elsewhere.
    OptionsShortcut(Vec<Pattern>),
    /// `a | b`.
    Either(Vec<Pattern>),
    /// `x...`.
    OneOrMore(Box<Pattern>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum LeafKind {
    Argument,
    Command,
    Option,
}

impl Pattern {
    pub fn argument(name: impl Into<String>) -> Self {
        Pattern::Argument(Leaf::new(name, Value::Null))
    }

    pub fn command(name: impl Into<String>) -> Self {
        Pattern::Command(Leaf::new(name, Value::Bool(false)))
    }

    pub fn option(def: &OptionDef) -> Self {
        Pattern::Option(Leaf::new(def.name(), def.initial_value()))
    }

    pub fn children(&self) -> &[Pattern] {
        match self {
            Pattern::Required(children)
            | Pattern::Optional(children)
            | Pattern::OptionsShortcut(children)
            | Pattern::Either(children) => children,
            Pattern::OneOrMore(child) => std::slice::from_ref(child.as_ref()),
            Pattern::Argument(_) | Pattern::Command(_) | Pattern::Option(_) => &[],
        }
    }

    fn leaf(&self) -> Option<(LeafKind, &Leaf)> {
        match self {
            Pattern::Argument(leaf) => Some((LeafKind::Argument, leaf)),
            Pattern::Command(leaf) => Some((LeafKind::Command, leaf)),
            Pattern::Option(leaf) => Some((LeafKind::Option, leaf)),
            _ => None,
        }
    }

    /// Every leaf in the tree, depth first.
    pub fn leaves(&self) -> Vec<&Leaf> {
        let mut out = Vec::new();
        self.walk(&mut |node| {
            if let Some((_, leaf)) = node.leaf() {
                out.push(leaf);
            }
        });
        out
    }

    /// Names of the option leaves in the tree.
    pub fn option_names(&self) -> HashSet<String> {
        let mut names = HashSet::new();
        self.walk(&mut |node| {
            if let Pattern::Option(leaf) = node {
                names.insert(leaf.name.clone());
            }
        });
        names
    }

    fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Pattern)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }

    fn walk_mut(&mut self, visit: &mut impl FnMut(&mut Pattern)) {
        visit(self);
        match self {
            Pattern::Required(children)
            | Pattern::Optional(children)
            | Pattern::OptionsShortcut(children)
            | Pattern::Either(children) => {
                for child in children {
                    child.walk_mut(visit);
                }
            }
            Pattern::OneOrMore(child) => child.walk_mut(visit),
            Pattern::Argument(_) | Pattern::Command(_) | Pattern::Option(_) => {}
        }
    }

    /// Fill every `[options]` shortcut with the `declared` options that its
    /// usage line does not name itself. Returns how many options went behind
    /// a shortcut in total.
    pub fn fill_shortcuts(&mut self, declared: &Registry) -> usize {
        if let Pattern::Required(children) = self {
            if let [Pattern::Either(lines)] = children.as_mut_slice() {
                return lines
                    .iter_mut()
                    .map(|line| line.fill_line_shortcuts(declared))
                    .sum();
            }
        }
        self.fill_line_shortcuts(declared)
    }

    fn fill_line_shortcuts(&mut self, declared: &Registry) -> usize {
        let named = self.option_names();
        let defs: Vec<OptionDef> = declared
            .iter()
            .filter(|def| !named.contains(def.name()))
            .cloned()
            .collect();
        let mut filled = 0;
        self.walk_mut(&mut |node| {
            if let Pattern::OptionsShortcut(children) = node {
                *children = defs.iter().map(Pattern::option).collect();
                filled += defs.len();
            }
        });
        filled
    }

    /// Turn leaves that can match more than once into collecting leaves.
    ///
    /// A leaf repeats when one expansion of the pattern (choosing a single
    /// branch of every `|` and unrolling `...` twice) contains it twice.
    pub fn fix_repeating(&mut self) {
        let occurrences = self.max_occurrences();
        self.walk_mut(&mut |node| {
            let (kind, leaf) = match node {
                Pattern::Argument(leaf) => (LeafKind::Argument, leaf),
                Pattern::Command(leaf) => (LeafKind::Command, leaf),
                Pattern::Option(leaf) => (LeafKind::Option, leaf),
                _ => return,
            };
            let key = (kind, leaf.name.clone());
            if occurrences.get(&key).copied().unwrap_or(0) < 2 {
                return;
            }
            leaf.value = match (kind, &leaf.value) {
                (LeafKind::Command, _) | (LeafKind::Option, Value::Bool(_)) => Value::Count(0),
                (_, Value::Text(default)) => {
                    Value::List(default.split_whitespace().map(str::to_string).collect())
                }
                (_, Value::List(items)) => Value::List(items.clone()),
                _ => Value::List(Vec::new()),
            };
        });
    }

    /// Largest number of times each leaf occurs in a single expansion.
    fn max_occurrences(&self) -> HashMap<(LeafKind, String), usize> {
        if let Some((kind, leaf)) = self.leaf() {
            return HashMap::from([((kind, leaf.name.clone()), 1)]);
        }
        let mut total: HashMap<(LeafKind, String), usize> = HashMap::new();
        match self {
            Pattern::Either(children) => {
                for child in children {
                    for (key, n) in child.max_occurrences() {
                        let slot = total.entry(key).or_insert(0);
                        *slot = (*slot).max(n);
                    }
                }
            }
            Pattern::OneOrMore(child) => {
                for (key, n) in child.max_occurrences() {
                    total.insert(key, n * 2);
                }
            }
            _ => {
                for child in self.children() {
                    for (key, n) in child.max_occurrences() {
                        *total.entry(key).or_insert(0) += n;
                    }
                }
            }
        }
        total
    }
}

/// Compile a usage section (`Usage: prog ...` with any continuation lines)
/// into a pattern tree rooted at a [`Pattern::Required`].
pub fn compile(usage: &str, registry: &mut Registry) -> Result<Pattern, DocoptError> {
    let source = formal_usage(usage)?;
    let mut parser = UsageParser::new(tokenize(&source), registry);
    let children = parser.expr()?;
    if parser.current().is_some() {
        return Err(DocoptError::Language(format!(
            "unexpected ending: {:?}",
            parser.remaining().join(" ")
        )));
    }
    Ok(Pattern::Required(children))
}

/// Rewrite `usage: prog a\n prog b` as `( a ) | ( b )`.
fn formal_usage(section: &str) -> Result<String, DocoptError> {
    let body = section.split_once(':').map_or(section, |(_, rest)| rest);
    let mut words = body.split_whitespace();
    let program = words
        .next()
        .ok_or_else(|| DocoptError::Language("usage pattern has no program name".to_string()))?;

    let mut parts = vec!["("];
    for word in words {
        parts.push(if word == program { ") | (" } else { word });
    }
    parts.push(")");
    Ok(parts.join(" "))
}

fn tokenize(source: &str) -> Vec<String> {
    let padded = GROUPING.replace_all(source, " $1 ");
    USAGE_TOKEN
        .find_iter(&padded)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// `<name>` or an all-uppercase word.
pub(crate) fn is_argument_token(token: &str) -> bool {
    (token.starts_with('<') && token.ends_with('>'))
        || (token.chars().any(char::is_alphabetic) && !token.chars().any(char::is_lowercase))
}

struct UsageParser<'a> {
    tokens: Vec<String>,
    pos: usize,
    registry: &'a mut Registry,
}

impl<'a> UsageParser<'a> {
    fn new(tokens: Vec<String>, registry: &'a mut Registry) -> Self {
        Self {
            tokens,
            pos: 0,
            registry,
        }
    }

    fn current(&self) -> Option<&str> {
        self.peek(0)
    }

    fn peek(&self, offset: usize) -> Option<&str> {
        self.tokens.get(self.pos + offset).map(String::as_str)
    }

    fn advance(&mut self) -> Option<String> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn remaining(&self) -> &[String] {
        &self.tokens[self.pos..]
    }

    /// expr := seq ( '|' seq )*
    fn expr(&mut self) -> Result<Vec<Pattern>, DocoptError> {
        let seq = self.seq()?;
        if self.current() != Some("|") {
            return Ok(seq);
        }
        let mut branches = Vec::new();
        push_branch(&mut branches, seq);
        while self.current() == Some("|") {
            self.advance();
            let seq = self.seq()?;
            push_branch(&mut branches, seq);
        }
        if branches.len() > 1 {
            Ok(vec![Pattern::Either(branches)])
        } else {
            Ok(branches)
        }
    }

    /// seq := ( atom '...'? )*
    fn seq(&mut self) -> Result<Vec<Pattern>, DocoptError> {
        let mut result = Vec::new();
        while let Some(token) = self.current() {
            if matches!(token, "]" | ")" | "|") {
                break;
            }
            let mut atom = self.atom()?;
            if self.current() == Some("...") {
                self.advance();
                let repeated = if atom.len() == 1 {
                    atom.remove(0)
                } else {
                    Pattern::Required(atom)
                };
                atom = vec![Pattern::OneOrMore(Box::new(repeated))];
            }
            result.extend(atom);
        }
        Ok(result)
    }

    fn atom(&mut self) -> Result<Vec<Pattern>, DocoptError> {
        let Some(token) = self.current().map(str::to_string) else {
            return Ok(Vec::new());
        };
        match token.as_str() {
            "[" if self.peek(1) == Some("options") && self.peek(2) == Some("]") => {
                self.pos += 3;
                Ok(vec![Pattern::Optional(vec![Pattern::OptionsShortcut(
                    Vec::new(),
                )])])
            }
            "(" | "[" => {
                self.advance();
                let closing = if token == "(" { ")" } else { "]" };
                let children = self.expr()?;
                if self.advance().as_deref() != Some(closing) {
                    return Err(DocoptError::Language(format!("unmatched '{token}'")));
                }
                Ok(vec![if token == "(" {
                    Pattern::Required(children)
                } else {
                    Pattern::Optional(children)
                }])
            }
            "..." => Err(DocoptError::Language(
                "'...' must follow an argument, option, command or group".to_string(),
            )),
            t if t.starts_with("--") && t != "--" => self.long(),
            t if t.starts_with('-') && t != "-" && t != "--" => self.shorts(),
            t if is_argument_token(t) => {
                self.advance();
                Ok(vec![Pattern::argument(token.clone())])
            }
            _ => {
                self.advance();
                Ok(vec![Pattern::command(token.clone())])
            }
        }
    }

    /// `--name`, `--name=<value>`, or `--name VALUE` for a declared
    /// value-taking option.
    fn long(&mut self) -> Result<Vec<Pattern>, DocoptError> {
        let token = self.advance().unwrap_or_default();
        let (long, inline) = match token.split_once('=') {
            Some((long, value)) => (long, Some(value)),
            None => (token.as_str(), None),
        };

        let similar: Vec<OptionDef> = self.registry.with_long(long).into_iter().cloned().collect();
        let def = match similar.as_slice() {
            [] => {
                let def = if inline.is_some() {
                    OptionDef::with_value(None, Some(long), None)
                } else {
                    OptionDef::flag(None, Some(long))
                };
                self.registry.insert(def.clone());
                def
            }
            [known] => {
                let mut def = known.clone();
                if inline.is_some() && !def.takes_value {
                    def.takes_value = true;
                    self.registry.insert(def.clone());
                } else if inline.is_none() && def.takes_value {
                    self.skip_placeholder();
                }
                def
            }
            _ => {
                let names: Vec<&str> = similar.iter().map(OptionDef::name).collect();
                return Err(DocoptError::Language(format!(
                    "{long} is not a unique prefix: {}?",
                    names.join(", ")
                )));
            }
        };
        Ok(vec![Pattern::option(&def)])
    }

    /// `-abc`; a value-taking short swallows the rest of the cluster or the
    /// following placeholder.
    fn shorts(&mut self) -> Result<Vec<Pattern>, DocoptError> {
        let token = self.advance().unwrap_or_default();
        let cluster: Vec<char> = token.trim_start_matches('-').chars().collect();
        let mut parsed = Vec::new();

        let mut i = 0;
        while i < cluster.len() {
            let short = format!("-{}", cluster[i]);
            i += 1;
            let similar: Vec<OptionDef> =
                self.registry.with_short(&short).into_iter().cloned().collect();
            let def = match similar.as_slice() {
                [] => {
                    let def = OptionDef::flag(Some(&short), None);
                    self.registry.insert(def.clone());
                    def
                }
                [known] => {
                    if known.takes_value {
                        if i == cluster.len() {
                            self.skip_placeholder();
                        } else {
                            i = cluster.len();
                        }
                    }
                    known.clone()
                }
                _ => {
                    return Err(DocoptError::Language(format!(
                        "{short} is specified ambiguously {} times",
                        similar.len()
                    )))
                }
            };
            parsed.push(Pattern::option(&def));
        }
        Ok(parsed)
    }

    fn skip_placeholder(&mut self) {
        if self.current().is_some_and(is_argument_token) {
            self.advance();
        }
    }
}

/// Branches of more than one element are wrapped in a `Required`; empty
/// branches are dropped.
fn push_branch(branches: &mut Vec<Pattern>, mut seq: Vec<Pattern>) {
    if seq.len() > 1 {
        branches.push(Pattern::Required(seq));
    } else {
        branches.append(&mut seq);
    }
}
