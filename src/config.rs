//! The docopts command line and the settings derived from it.

use crate::docopt::ParseSettings;
use crate::output::{is_bash_identifier, ExportMode};
use clap::Parser;
use std::ffi::OsString;
use std::io::{self, Read};
use thiserror::Error;

/// Separator between help and version text when both come from stdin.
pub const DEFAULT_SEPARATOR: &str = "----";

/// Marks the end of docopts' own options.
const ARGV_MARKER: &str = ":";

/// Long docopts options whose next element is a value, never the argv marker.
const LONG_VALUE_OPTIONS: &[&str] = &["--help", "--version", "--separator"];

/// Short docopts options taking a value, attached or as the next element.
const SHORT_VALUE_OPTIONS: &str = "hVsAG";

/// Errors that can occur while turning the command line into settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read stdin: {0}")]
    Stdin(#[from] io::Error),

    #[error("argument {0:?} is not valid Unicode")]
    NonUnicodeArgument(OsString),

    #[error("missing ':' before the arguments to parse")]
    MissingArgvMarker,

    #[error("'{0}' is not a valid Bash identifier")]
    InvalidIdentifier(String),

    #[error("separator line {0:?} not found in stdin")]
    SeparatorNotFound(String),
}

/// Shell argument parsing from a docopt help message.
#[derive(Parser, Debug)]
#[command(
    name = "docopts",
    about,
    disable_help_flag = true,
    disable_version_flag = true
)]
pub struct Cli {
    /// Help message in docopt format; '-' reads it from stdin
    #[arg(short = 'h', long = "help", value_name = "MSG", allow_hyphen_values = true)]
    pub help_msg: String,

    /// Version text; '-' reads it from stdin
    #[arg(short = 'V', long = "version", value_name = "MSG", allow_hyphen_values = true)]
    pub version_msg: Option<String>,

    /// Line separating help and version when both are read from stdin
    #[arg(short = 's', long, value_name = "STR", default_value = DEFAULT_SEPARATOR)]
    pub separator: String,

    /// Treat everything after the first positional as positional
    #[arg(short = 'O', long)]
    pub options_first: bool,

    /// Don't handle --help and --version specially
    #[arg(short = 'H', long)]
    pub no_help: bool,

    /// Export the result as a Bash 4 associative array
    #[arg(short = 'A', value_name = "NAME", conflicts_with_all = ["global", "json"])]
    pub assoc: Option<String>,

    /// Don't emit the 'declare -A' line
    #[arg(long, requires = "assoc")]
    pub no_declare: bool,

    /// Prefix every variable name with '<PREFIX>_'
    #[arg(short = 'G', value_name = "PREFIX", conflicts_with = "json")]
    pub global: Option<String>,

    /// Print the result as a JSON object
    #[arg(long)]
    pub json: bool,

    /// Write the script to a temporary file and print its path
    #[arg(long)]
    pub to_file: bool,

    /// Log debug information to stderr
    #[arg(long)]
    pub debug: bool,
}

/// Validated docopts configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub doc: String,
    pub version: Option<String>,
    pub help: bool,
    pub options_first: bool,
    pub mode: ExportMode,
    pub to_file: bool,
}

impl Settings {
    /// Build settings from `cli`, reading `-` values from `stdin`.
    pub fn from_cli<R: Read>(cli: Cli, stdin: R) -> Result<Self, ConfigError> {
        let (doc, version) = resolve_texts(cli.help_msg, cli.version_msg, &cli.separator, stdin)?;

        let mode = if let Some(name) = cli.assoc {
            ExportMode::Assoc {
                name,
                declare: !cli.no_declare,
            }
        } else if let Some(prefix) = cli.global {
            ExportMode::Global(prefix)
        } else if cli.json {
            ExportMode::Json
        } else {
            ExportMode::Flat
        };

        let settings = Self {
            doc,
            version,
            help: !cli.no_help,
            options_first: cli.options_first,
            mode,
            to_file: cli.to_file,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Check that names used in the generated script are Bash identifiers.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.mode {
            ExportMode::Assoc { name, .. } if !is_bash_identifier(name) => {
                Err(ConfigError::InvalidIdentifier(name.clone()))
            }
            ExportMode::Global(prefix) if !is_bash_identifier(prefix) => {
                Err(ConfigError::InvalidIdentifier(prefix.clone()))
            }
            _ => Ok(()),
        }
    }

    pub fn parse_settings(&self) -> ParseSettings {
        ParseSettings {
            help: self.help,
            version: self.version.clone(),
            options_first: self.options_first,
        }
    }
}

/// Replace `-` help or version text with stdin. When both are `-`, stdin
/// holds the help, a line equal to `separator`, then the version.
pub fn resolve_texts<R: Read>(
    help: String,
    version: Option<String>,
    separator: &str,
    mut stdin: R,
) -> Result<(String, Option<String>), ConfigError> {
    let help_from_stdin = help == "-";
    let version_from_stdin = version.as_deref() == Some("-");
    if !help_from_stdin && !version_from_stdin {
        return Ok((help, version));
    }

    let mut input = String::new();
    stdin.read_to_string(&mut input)?;

    if help_from_stdin && version_from_stdin {
        let (help, version) = split_at_separator(&input, separator)
            .ok_or_else(|| ConfigError::SeparatorNotFound(separator.to_string()))?;
        Ok((help, Some(version)))
    } else if help_from_stdin {
        Ok((input, version))
    } else {
        Ok((help, Some(input.trim_end_matches('\n').to_string())))
    }
}

fn split_at_separator(input: &str, separator: &str) -> Option<(String, String)> {
    let mut offset = 0;
    for line in input.split_inclusive('\n') {
        if line.trim() == separator {
            let help = &input[..offset];
            let version = &input[offset + line.len()..];
            return Some((
                help.to_string(),
                version.trim_end_matches('\n').to_string(),
            ));
        }
        offset += line.len();
    }
    None
}

/// Convert the raw process arguments, failing on the first one that is not
/// valid Unicode.
pub fn collect_args<I>(args: I) -> Result<Vec<String>, ConfigError>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| arg.into_string().map_err(ConfigError::NonUnicodeArgument))
        .collect()
}

/// Whether `arg` leaves its value to the following element: a long value
/// option, or a short cluster whose value-taking flag comes last.
fn takes_next_value(arg: &str) -> bool {
    if LONG_VALUE_OPTIONS.contains(&arg) {
        return true;
    }
    let Some(cluster) = arg.strip_prefix('-') else {
        return false;
    };
    if cluster.starts_with('-') {
        return false;
    }
    match cluster
        .char_indices()
        .find(|(_, c)| SHORT_VALUE_OPTIONS.contains(*c))
    {
        Some((i, c)) => i + c.len_utf8() == cluster.len(),
        None => false,
    }
}

/// Split the docopts command line into its own options and the argv to
/// parse, at the first `:` that is not the value of an option.
pub fn split_invocation(args: &[String]) -> Result<(Vec<String>, Vec<String>), ConfigError> {
    let mut iter = args.iter().enumerate();
    while let Some((i, arg)) = iter.next() {
        if arg == ARGV_MARKER {
            return Ok((args[..i].to_vec(), args[i + 1..].to_vec()));
        }
        if takes_next_value(arg) {
            iter.next();
        }
    }
    Err(ConfigError::MissingArgvMarker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("docopts").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_requires_help() {
        assert!(Cli::try_parse_from(["docopts"]).is_err());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = cli(&["-h", "Usage: prog"]);
        assert_eq!(cli.help_msg, "Usage: prog");
        assert_eq!(cli.separator, DEFAULT_SEPARATOR);
        assert!(cli.version_msg.is_none());
        assert!(!cli.options_first);
        assert!(!cli.no_help);
    }

    #[test]
    fn test_cli_assoc_conflicts_with_json() {
        let result = Cli::try_parse_from(["docopts", "-h", "x", "-A", "args", "--json"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_no_declare_requires_assoc() {
        let result = Cli::try_parse_from(["docopts", "-h", "x", "--no-declare"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_split_invocation() {
        let args = strings(&["-A", "args", "-h", "Usage: prog <x>", ":", "a", ":"]);
        let (head, argv) = split_invocation(&args).unwrap();
        assert_eq!(head, strings(&["-A", "args", "-h", "Usage: prog <x>"]));
        assert_eq!(argv, strings(&["a", ":"]));
    }

    #[test]
    fn test_split_invocation_marker_as_value() {
        let args = strings(&["-h", ":", "-V", ":", ":", "x"]);
        let (head, argv) = split_invocation(&args).unwrap();
        assert_eq!(head, strings(&["-h", ":", "-V", ":"]));
        assert_eq!(argv, strings(&["x"]));
    }

    #[test]
    fn test_split_invocation_clustered_value_option() {
        let args = strings(&["-Oh", ":", ":", "x"]);
        let (head, argv) = split_invocation(&args).unwrap();
        assert_eq!(head, strings(&["-Oh", ":"]));
        assert_eq!(argv, strings(&["x"]));

        let args = strings(&["-HG", ":", "-h", "d", ":"]);
        let (head, argv) = split_invocation(&args).unwrap();
        assert_eq!(head, strings(&["-HG", ":", "-h", "d"]));
        assert!(argv.is_empty());
    }

    #[test]
    fn test_split_invocation_attached_value() {
        let args = strings(&["-hdoc", ":", "x"]);
        let (head, argv) = split_invocation(&args).unwrap();
        assert_eq!(head, strings(&["-hdoc"]));
        assert_eq!(argv, strings(&["x"]));
    }

    #[test]
    fn test_cli_accepts_cluster() {
        let cli = cli(&["-Oh", "Usage: prog"]);
        assert!(cli.options_first);
        assert_eq!(cli.help_msg, "Usage: prog");
    }

    #[test]
    fn test_cli_texts_may_start_with_dash() {
        let cli = cli(&["-h", "-- odd doc", "-V", "-n"]);
        assert_eq!(cli.help_msg, "-- odd doc");
        assert_eq!(cli.version_msg.as_deref(), Some("-n"));
    }

    #[test]
    fn test_collect_args() {
        let args = collect_args(vec![OsString::from("-h"), OsString::from("x")]).unwrap();
        assert_eq!(args, strings(&["-h", "x"]));
    }

    #[cfg(unix)]
    #[test]
    fn test_collect_args_rejects_non_unicode() {
        use std::os::unix::ffi::OsStringExt;

        let bad = OsString::from_vec(vec![0xff, 0xfe]);
        let err = collect_args(vec![OsString::from("x"), bad.clone()]).unwrap_err();
        assert!(matches!(err, ConfigError::NonUnicodeArgument(arg) if arg == bad));
    }

    #[test]
    fn test_split_invocation_empty_argv() {
        let (_, argv) = split_invocation(&strings(&["-h", "x", ":"])).unwrap();
        assert!(argv.is_empty());
    }

    #[test]
    fn test_split_invocation_missing_marker() {
        let err = split_invocation(&strings(&["-h", "x"])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingArgvMarker));
    }

    #[test]
    fn test_resolve_texts_literal() {
        let (help, version) =
            resolve_texts("doc".to_string(), Some("1.0".to_string()), "----", io::empty()).unwrap();
        assert_eq!(help, "doc");
        assert_eq!(version.as_deref(), Some("1.0"));
    }

    #[test]
    fn test_resolve_texts_help_from_stdin() {
        let (help, version) =
            resolve_texts("-".to_string(), None, "----", "Usage: prog\n".as_bytes()).unwrap();
        assert_eq!(help, "Usage: prog\n");
        assert!(version.is_none());
    }

    #[test]
    fn test_resolve_texts_both_from_stdin() {
        let input = "Usage: prog\n\n  ----  \nprog 1.0\n";
        let (help, version) =
            resolve_texts("-".to_string(), Some("-".to_string()), "----", input.as_bytes())
                .unwrap();
        assert_eq!(help, "Usage: prog\n\n");
        assert_eq!(version.as_deref(), Some("prog 1.0"));
    }

    #[test]
    fn test_resolve_texts_custom_separator() {
        let input = "Usage: prog\n%%\nv2\n";
        let (help, version) =
            resolve_texts("-".to_string(), Some("-".to_string()), "%%", input.as_bytes()).unwrap();
        assert_eq!(help, "Usage: prog\n");
        assert_eq!(version.as_deref(), Some("v2"));
    }

    #[test]
    fn test_resolve_texts_separator_not_found() {
        let err = resolve_texts(
            "-".to_string(),
            Some("-".to_string()),
            "----",
            "Usage: prog\n".as_bytes(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::SeparatorNotFound(s) if s == "----"));
    }

    #[test]
    fn test_settings_modes() {
        let settings = Settings::from_cli(cli(&["-h", "d"]), io::empty()).unwrap();
        assert_eq!(settings.mode, ExportMode::Flat);

        let settings = Settings::from_cli(cli(&["-h", "d", "-G", "ARGS"]), io::empty()).unwrap();
        assert_eq!(settings.mode, ExportMode::Global("ARGS".to_string()));

        let settings =
            Settings::from_cli(cli(&["-h", "d", "-A", "args", "--no-declare"]), io::empty())
                .unwrap();
        assert_eq!(
            settings.mode,
            ExportMode::Assoc {
                name: "args".to_string(),
                declare: false
            }
        );

        let settings = Settings::from_cli(cli(&["-h", "d", "--json"]), io::empty()).unwrap();
        assert_eq!(settings.mode, ExportMode::Json);
    }

    #[test]
    fn test_settings_reject_bad_identifier() {
        let err = Settings::from_cli(cli(&["-h", "d", "-A", "my-args"]), io::empty()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidIdentifier(n) if n == "my-args"));
    }

    #[test]
    fn test_parse_settings() {
        let settings = Settings::from_cli(
            cli(&["-h", "d", "-V", "1.0", "-O", "-H"]),
            io::empty(),
        )
        .unwrap();
        let parse = settings.parse_settings();
        assert!(!parse.help);
        assert!(parse.options_first);
        assert_eq!(parse.version.as_deref(), Some("1.0"));
    }
}
