//! Argument-vector tokenizing and pattern matching.

use crate::options::{OptionDef, Registry};
use crate::pattern::{Leaf, Pattern};
use crate::value::{ParsedArgs, Value};
use std::iter::Peekable;
use thiserror::Error;

/// A malformed option occurrence in argv.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TokenError(String);

/// One classified argv element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgvToken {
    /// Anything that is not an option, including `--` and what follows it.
    Positional(String),
    /// An option occurrence with its value: `Bool(true)` for flags, `Text`
    /// for value-taking options. `known` is false for options the registry
    /// has never heard of.
    Option {
        name: String,
        value: Value,
        known: bool,
    },
}

impl ArgvToken {
    pub fn is_known(&self) -> bool {
        match self {
            ArgvToken::Positional(_) => true,
            ArgvToken::Option { known, .. } => *known,
        }
    }

    /// Whether this is one of the options `names` with a set value.
    pub fn is_set_option(&self, names: &[&str]) -> bool {
        match self {
            ArgvToken::Option { name, value, .. } => {
                names.contains(&name.as_str()) && value.is_truthy()
            }
            ArgvToken::Positional(_) => false,
        }
    }

    fn known(def: &OptionDef, value: Value) -> Self {
        ArgvToken::Option {
            name: def.name().to_string(),
            value,
            known: true,
        }
    }

    fn unknown(name: &str, value: Value) -> Self {
        ArgvToken::Option {
            name: name.to_string(),
            value,
            known: false,
        }
    }
}

/// Classify `argv` into options and positionals using `registry`.
///
/// Long options may be abbreviated to any unique prefix. With
/// `options_first`, the first positional ends option parsing.
pub fn parse_argv<S: AsRef<str>>(
    argv: &[S],
    registry: &Registry,
    options_first: bool,
) -> Result<Vec<ArgvToken>, TokenError> {
    let mut tokens = Vec::new();
    let mut rest = argv.iter().map(AsRef::as_ref).peekable();

    while let Some(arg) = rest.next() {
        if arg == "--" {
            tokens.push(ArgvToken::Positional(arg.to_string()));
            tokens.extend(rest.by_ref().map(|a| ArgvToken::Positional(a.to_string())));
            break;
        } else if arg.starts_with("--") {
            tokens.push(parse_long(arg, &mut rest, registry)?);
        } else if arg.starts_with('-') && arg != "-" {
            tokens.extend(parse_shorts(arg, &mut rest, registry)?);
        } else if options_first {
            tokens.push(ArgvToken::Positional(arg.to_string()));
            tokens.extend(rest.by_ref().map(|a| ArgvToken::Positional(a.to_string())));
            break;
        } else {
            tokens.push(ArgvToken::Positional(arg.to_string()));
        }
    }

    Ok(tokens)
}

fn parse_long<'a, I>(
    arg: &str,
    rest: &mut Peekable<I>,
    registry: &Registry,
) -> Result<ArgvToken, TokenError>
where
    I: Iterator<Item = &'a str>,
{
    let (long, inline) = match arg.split_once('=') {
        Some((long, value)) => (long, Some(value)),
        None => (arg, None),
    };

    let mut similar = registry.with_long(long);
    if similar.is_empty() {
        similar = registry.with_long_prefix(long);
    }

    match similar.as_slice() {
        [] => Ok(ArgvToken::unknown(
            long,
            inline.map_or(Value::Bool(true), |v| Value::Text(v.to_string())),
        )),
        [def] => {
            let name = def.name();
            if !def.takes_value {
                if inline.is_some() {
                    return Err(TokenError(format!("{name} must not have an argument")));
                }
                return Ok(ArgvToken::known(def, Value::Bool(true)));
            }
            let value = match inline {
                Some(value) => value.to_string(),
                None => next_value(name, rest)?,
            };
            Ok(ArgvToken::known(def, Value::Text(value)))
        }
        _ => {
            let names: Vec<&str> = similar.iter().map(|d| d.name()).collect();
            Err(TokenError(format!(
                "{long} is not a unique prefix: {}?",
                names.join(", ")
            )))
        }
    }
}

fn parse_shorts<'a, I>(
    arg: &str,
    rest: &mut Peekable<I>,
    registry: &Registry,
) -> Result<Vec<ArgvToken>, TokenError>
where
    I: Iterator<Item = &'a str>,
{
    let cluster = &arg[1..];
    let mut parsed = Vec::new();

    for (i, c) in cluster.char_indices() {
        let short = format!("-{c}");
        let similar = registry.with_short(&short);
        match similar.as_slice() {
            [] => parsed.push(ArgvToken::unknown(&short, Value::Bool(true))),
            [def] if def.takes_value => {
                let attached = &cluster[i + c.len_utf8()..];
                let value = if attached.is_empty() {
                    next_value(&short, rest)?
                } else {
                    attached.to_string()
                };
                parsed.push(ArgvToken::known(def, Value::Text(value)));
                break;
            }
            [def] => parsed.push(ArgvToken::known(def, Value::Bool(true))),
            _ => {
                return Err(TokenError(format!(
                    "{short} is specified ambiguously {} times",
                    similar.len()
                )))
            }
        }
    }

    Ok(parsed)
}

/// The value of `name` from the following argv element; `--` never counts.
fn next_value<'a, I>(name: &str, rest: &mut Peekable<I>) -> Result<String, TokenError>
where
    I: Iterator<Item = &'a str>,
{
    match rest.next_if(|next| *next != "--") {
        Some(value) => Ok(value.to_string()),
        None => Err(TokenError(format!("{name} requires argument"))),
    }
}

/// Tokens still to consume and leaves matched so far.
#[derive(Debug, Clone, Default)]
pub(crate) struct MatchState {
    left: Vec<ArgvToken>,
    collected: Vec<Leaf>,
}

impl MatchState {
    fn new(tokens: Vec<ArgvToken>) -> Self {
        Self {
            left: tokens,
            collected: Vec::new(),
        }
    }
}

/// Match `tokens` against `pattern`. Succeeds only when the pattern matches
/// and every token is consumed; the result holds the unmatched value of
/// every leaf overwritten by what was matched.
pub fn match_pattern(pattern: &Pattern, tokens: Vec<ArgvToken>) -> Option<ParsedArgs> {
    let matched = pattern.matches(&MatchState::new(tokens))?;
    if !matched.left.is_empty() {
        return None;
    }

    let mut args = ParsedArgs::new();
    for leaf in pattern.leaves() {
        args.insert(leaf.name.clone(), leaf.value.clone());
    }
    for leaf in matched.collected {
        args.insert(leaf.name, leaf.value);
    }
    Some(args)
}

impl Pattern {
    /// Try to match against `state`, returning the state after the match.
    /// `state` is never modified; failed branches leave no trace.
    pub(crate) fn matches(&self, state: &MatchState) -> Option<MatchState> {
        match self {
            Pattern::Argument(leaf) => {
                let found = state.left.iter().enumerate().find_map(|(i, t)| match t {
                    ArgvToken::Positional(v) => Some((i, Value::Text(v.clone()))),
                    ArgvToken::Option { .. } => None,
                });
                found.map(|(pos, value)| consume(leaf, state, pos, value))
            }
            Pattern::Command(leaf) => {
                let pos = state
                    .left
                    .iter()
                    .position(|t| matches!(t, ArgvToken::Positional(_)))?;
                match &state.left[pos] {
                    ArgvToken::Positional(v) if *v == leaf.name => {
                        Some(consume(leaf, state, pos, Value::Bool(true)))
                    }
                    _ => None,
                }
            }
            Pattern::Option(leaf) => {
                let found = state.left.iter().enumerate().find_map(|(i, t)| match t {
                    ArgvToken::Option { name, value, .. } if *name == leaf.name => {
                        Some((i, value.clone()))
                    }
                    _ => None,
                });
                found.map(|(pos, value)| consume(leaf, state, pos, value))
            }
            Pattern::Required(children) => {
                let mut current = state.clone();
                for child in children {
                    current = child.matches(&current)?;
                }
                Some(current)
            }
            Pattern::Optional(children) | Pattern::OptionsShortcut(children) => {
                let mut current = state.clone();
                for child in children {
                    if let Some(next) = child.matches(&current) {
                        current = next;
                    }
                }
                Some(current)
            }
            Pattern::Either(children) => {
                let mut best: Option<MatchState> = None;
                for child in children {
                    if let Some(outcome) = child.matches(state) {
                        let better = best
                            .as_ref()
                            .map_or(true, |b| outcome.left.len() < b.left.len());
                        if better {
                            best = Some(outcome);
                        }
                    }
                }
                best
            }
            Pattern::OneOrMore(child) => {
                let mut current = state.clone();
                let mut times = 0;
                while let Some(next) = child.matches(&current) {
                    times += 1;
                    let stalled = next.left.len() == current.left.len();
                    current = next;
                    if stalled {
                        break;
                    }
                }
                (times > 0).then_some(current)
            }
        }
    }
}

/// Remove the token at `pos` and record `value` for `leaf`. Collecting
/// leaves fold into their earlier match instead of adding a new one.
fn consume(leaf: &Leaf, state: &MatchState, pos: usize, value: Value) -> MatchState {
    let mut next = state.clone();
    next.left.remove(pos);

    if !leaf.is_collecting() {
        next.collected.push(Leaf::new(leaf.name.clone(), value));
        return next;
    }

    let increment = match (&leaf.value, value) {
        (Value::Count(_), _) => Value::Count(1),
        (_, Value::Text(v)) => Value::List(vec![v]),
        (_, Value::List(items)) => Value::List(items),
        (_, _) => Value::List(Vec::new()),
    };
    match next.collected.iter_mut().find(|c| c.name == leaf.name) {
        Some(existing) => existing.value.accumulate(increment),
        None => next.collected.push(Leaf::new(leaf.name.clone(), increment)),
    }
    next
}
