//! Compiles a help text once and matches argument vectors against it.

use crate::matcher::{match_pattern, parse_argv, ArgvToken};
use crate::options::{usage_sections, Registry};
use crate::pattern::{compile, Pattern};
use crate::value::ParsedArgs;
use log::{debug, trace};
use thiserror::Error;

/// Errors that end a parse without a result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocoptError {
    /// The help text itself is not a valid usage description.
    #[error("{0}")]
    Language(String),

    /// The arguments do not fit the usage; `usage` is meant to be shown to
    /// the user.
    #[error("{}", usage_message(.reason.as_deref(), .usage))]
    Usage {
        usage: String,
        reason: Option<String>,
    },
}

fn usage_message(reason: Option<&str>, usage: &str) -> String {
    match reason {
        Some(reason) => format!("{reason}\n{usage}").trim().to_string(),
        None => usage.trim().to_string(),
    }
}

/// How a single parse treats help, version and option ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSettings {
    /// Answer `-h`/`--help` with the full help text.
    pub help: bool,
    /// Answer `--version` with this text.
    pub version: Option<String>,
    /// Treat everything from the first positional argument on as positional.
    pub options_first: bool,
}

impl Default for ParseSettings {
    fn default() -> Self {
        Self {
            help: true,
            version: None,
            options_first: false,
        }
    }
}

/// Outcome of a parse that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// The arguments matched the usage.
    Matched(ParsedArgs),
    /// Help was requested; carries the text to print.
    Help(String),
    /// Version was requested; carries the text to print.
    Version(String),
}

/// A compiled help text.
#[derive(Debug, Clone)]
pub struct Docopt {
    doc: String,
    usage: String,
    registry: Registry,
    pattern: Pattern,
}

impl Docopt {
    /// Compile `doc`. Fails with [`DocoptError::Language`] when it has no
    /// single usage section or the usage does not parse.
    pub fn new(doc: impl Into<String>) -> Result<Self, DocoptError> {
        let doc = doc.into();
        let mut sections = usage_sections(&doc);
        let usage = match sections.len() {
            0 => {
                return Err(DocoptError::Language(
                    "\"usage:\" (case-insensitive) not found.".to_string(),
                ))
            }
            1 => sections.remove(0),
            _ => {
                return Err(DocoptError::Language(
                    "More than one \"usage:\" (case-insensitive).".to_string(),
                ))
            }
        };

        let declared = Registry::from_doc(&doc);
        let mut registry = declared.clone();
        let mut pattern = compile(&usage, &mut registry)?;

        let shortcut = pattern.fill_shortcuts(&declared);
        pattern.fix_repeating();

        debug!(
            "compiled usage with {} known options ({} behind [options])",
            registry.len(),
            shortcut
        );
        trace!("pattern: {pattern:?}");

        Ok(Self {
            doc,
            usage,
            registry,
            pattern,
        })
    }

    /// The full help text.
    pub fn doc(&self) -> &str {
        &self.doc
    }

    /// The usage section, as shown on a usage error.
    pub fn usage(&self) -> &str {
        &self.usage
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Options from the options block plus those first seen in the usage.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Match `argv` (without the program name) against the usage.
    pub fn parse<S: AsRef<str>>(
        &self,
        argv: &[S],
        settings: &ParseSettings,
    ) -> Result<ParseOutcome, DocoptError> {
        let tokens = parse_argv(argv, &self.registry, settings.options_first)
            .map_err(|err| self.usage_error(Some(err.to_string())))?;
        trace!("argv tokens: {tokens:?}");

        if settings.help && tokens.iter().any(|t| t.is_set_option(&["-h", "--help"])) {
            debug!("help requested");
            return Ok(ParseOutcome::Help(self.doc.trim_matches('\n').to_string()));
        }
        if let Some(version) = &settings.version {
            if tokens.iter().any(|t| t.is_set_option(&["--version"])) {
                debug!("version requested");
                return Ok(ParseOutcome::Version(version.clone()));
            }
        }
        if let Some(ArgvToken::Option { name, .. }) = tokens.iter().find(|t| !t.is_known()) {
            return Err(self.usage_error(Some(format!("{name} is not recognized"))));
        }

        match match_pattern(&self.pattern, tokens) {
            Some(args) => {
                debug!("matched {} elements", args.len());
                Ok(ParseOutcome::Matched(args))
            }
            None => {
                debug!("arguments do not match the usage");
                Err(self.usage_error(None))
            }
        }
    }

    fn usage_error(&self, reason: Option<String>) -> DocoptError {
        DocoptError::Usage {
            usage: self.usage.clone(),
            reason,
        }
    }
}
