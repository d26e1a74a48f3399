//! docopts - docopt argument parsing for shell scripts.
//!
//! This library compiles a docopt help text into a usage pattern, matches
//! argument vectors against it and renders the result as Bash assignments
//! or JSON.

pub mod config;
pub mod docopt;
pub mod matcher;
pub mod options;
pub mod output;
pub mod pattern;
pub mod value;

pub use config::{ConfigError, Settings};
pub use docopt::{Docopt, DocoptError, ParseOutcome, ParseSettings};
pub use matcher::{ArgvToken, TokenError};
pub use options::{OptionDef, Registry};
pub use output::{ExportMode, OutputError};
pub use pattern::{Leaf, Pattern};
pub use value::{ParsedArgs, Value};
