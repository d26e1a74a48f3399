//! Bash and JSON renderings of parse outcomes.

use crate::docopt::ParseOutcome;
use crate::value::{ParsedArgs, Value};
use anyhow::Result;
use regex::Regex;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::LazyLock;
use tempfile::NamedTempFile;
use thiserror::Error;

/// Exit status of the generated script on a usage error (EX_USAGE).
pub const USAGE_EXIT_STATUS: i32 = 64;

static BASH_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z]|[A-Za-z_][0-9A-Za-z_]+)$").expect("static regex must compile")
});

/// Errors that can occur while rendering a result.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("{0:?} cannot be turned into a Bash variable name")]
    InvalidName(String),

    #[error("{first:?} and {second:?} both map to the variable {var}")]
    DuplicateName {
        var: String,
        first: String,
        second: String,
    },

    #[error("failed to serialize result as JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// How a matched result is exported to the calling shell.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExportMode {
    /// One variable per element, named after the element.
    #[default]
    Flat,
    /// Like `Flat`, with every variable name prefixed by `<prefix>_`.
    Global(String),
    /// A single Bash 4 associative array keyed by element name.
    Assoc { name: String, declare: bool },
    /// One JSON object on stdout.
    Json,
}

/// Quote `value` for Bash using single quotes.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// The Bash right-hand side for `value`.
pub fn to_bash(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Count(n) => n.to_string(),
        Value::Text(s) => shell_quote(s),
        Value::List(items) => {
            let quoted: Vec<String> = items.iter().map(|i| shell_quote(i)).collect();
            format!("({})", quoted.join(" "))
        }
    }
}

pub fn is_bash_identifier(name: &str) -> bool {
    BASH_IDENTIFIER.is_match(name)
}

/// Turn an element name into a variable name.
///
/// `<file>` becomes `file`, `--dry-run` becomes `dry_run`. The bare `-` and
/// `--` commands have no variable and yield `None`.
pub fn mangle_name(name: &str) -> Result<Option<String>, OutputError> {
    if name == "-" || name == "--" {
        return Ok(None);
    }
    let stripped = if name.starts_with('<') && name.ends_with('>') && name.len() > 1 {
        &name[1..name.len() - 1]
    } else {
        name.trim_start_matches('-')
    };
    let mangled = stripped.replace('-', "_");
    if !is_bash_identifier(&mangled) {
        return Err(OutputError::InvalidName(name.to_string()));
    }
    Ok(Some(mangled))
}

/// One `name=value` line per element, optionally prefixed with `<prefix>_`.
pub fn generate_assignments(args: &ParsedArgs, prefix: Option<&str>) -> Result<String, OutputError> {
    let mut output = String::new();
    let mut seen: HashMap<String, &str> = HashMap::new();

    for (name, value) in args.iter() {
        let Some(mangled) = mangle_name(name)? else {
            continue;
        };
        let var = match prefix {
            Some(prefix) => format!("{prefix}_{mangled}"),
            None => mangled,
        };
        if let Some(first) = seen.insert(var.clone(), name) {
            return Err(OutputError::DuplicateName {
                var,
                first: first.to_string(),
                second: name.to_string(),
            });
        }
        output.push_str(&format!("{}={}\n", var, to_bash(value)));
    }

    Ok(output)
}

/// Fill the associative array `array` with every element. Lists are spread
/// into `key,#` for the length and `key,i` for each item.
pub fn generate_assoc_array(args: &ParsedArgs, array: &str, declare: bool) -> String {
    let mut output = String::new();
    if declare {
        output.push_str(&format!("declare -A {array}\n"));
    }

    for (name, value) in args.iter() {
        match value {
            Value::List(items) => {
                let len_key = shell_quote(&format!("{name},#"));
                output.push_str(&format!("{array}[{len_key}]={}\n", items.len()));
                for (i, item) in items.iter().enumerate() {
                    let key = shell_quote(&format!("{name},{i}"));
                    output.push_str(&format!("{array}[{key}]={}\n", shell_quote(item)));
                }
            }
            _ => {
                let key = shell_quote(name);
                output.push_str(&format!("{array}[{key}]={}\n", to_bash(value)));
            }
        }
    }

    output
}

pub fn generate_json(args: &ParsedArgs) -> Result<String, OutputError> {
    Ok(format!("{}\n", serde_json::to_string(args)?))
}

/// Script printing the help or version text and exiting successfully.
pub fn generate_help_output_string(text: &str) -> String {
    format!("echo {}\nexit 0\n", shell_quote(text))
}

/// Script printing `message` to stderr and exiting with the usage status.
pub fn generate_usage_error_string(message: &str) -> String {
    format!(
        "echo {} >&2\nexit {}\n",
        shell_quote(message),
        USAGE_EXIT_STATUS
    )
}

/// Render a parse outcome for `mode`. In JSON mode help and version text is
/// returned as plain text.
pub fn render(outcome: &ParseOutcome, mode: &ExportMode) -> Result<String, OutputError> {
    match (outcome, mode) {
        (ParseOutcome::Help(text) | ParseOutcome::Version(text), ExportMode::Json) => {
            Ok(format!("{text}\n"))
        }
        (ParseOutcome::Help(text) | ParseOutcome::Version(text), _) => {
            Ok(generate_help_output_string(text))
        }
        (ParseOutcome::Matched(args), ExportMode::Flat) => generate_assignments(args, None),
        (ParseOutcome::Matched(args), ExportMode::Global(prefix)) => {
            generate_assignments(args, Some(prefix))
        }
        (ParseOutcome::Matched(args), ExportMode::Assoc { name, declare }) => {
            Ok(generate_assoc_array(args, name, *declare))
        }
        (ParseOutcome::Matched(args), ExportMode::Json) => generate_json(args),
    }
}

/// Write `content` to a persisted temporary file and return its path.
pub fn write_script(content: &str) -> Result<PathBuf> {
    let mut file = NamedTempFile::new()?;
    file.write_all(content.as_bytes())?;
    let path = file.into_temp_path().keep()?;
    Ok(path)
}
