use std::ffi::OsStr;
use std::io::Write;
use std::process::{Command, Output, Stdio};

const NAVAL_FATE: &str = "Naval Fate.

Usage:
  naval_fate ship new <name>...
  naval_fate ship <name> move <x> <y> [--speed=<kn>]
  naval_fate -h | --help
  naval_fate --version

Options:
  -h --help     Show this screen.
  --version     Show version.
  --speed=<kn>  Speed in knots [default: 10].
";

/// Run docopts with `args`, feeding `stdin` to it.
fn run<S: AsRef<OsStr>>(args: &[S], stdin: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_docopts"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to start docopts");
    child
        .stdin
        .take()
        .expect("stdin is piped")
        .write_all(stdin.as_bytes())
        .expect("failed to write stdin");
    child.wait_with_output().expect("failed to wait for docopts")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn flat_assignments() {
    let output = run(
        &["-h", "Usage: prog [--verbose] <file>...", ":", "--verbose", "a.txt", "b c"],
        "",
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "verbose=true\nfile=('a.txt' 'b c')\n");
}

#[test]
fn naval_fate_move() {
    let output = run(
        &["-h", NAVAL_FATE, ":", "ship", "Guardian", "move", "1", "2"],
        "",
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let script = stdout(&output);
    assert!(script.contains("ship=true\n"));
    assert!(script.contains("move=true\n"));
    assert!(script.contains("new=false\n"));
    assert!(script.contains("name=('Guardian')\n"));
    assert!(script.contains("speed='10'\n"));
    assert!(script.contains("x='1'\n"));
    assert!(script.contains("help=false\n"));
}

#[test]
fn help_requested() {
    let output = run(&["-h", "Usage: prog go\n", ":", "--help"], "");
    assert!(output.status.success());
    assert_eq!(stdout(&output), "echo 'Usage: prog go'\nexit 0\n");
}

#[test]
fn help_disabled_is_an_unknown_option() {
    let output = run(&["-H", "-h", "Usage: prog go", ":", "--help"], "");
    assert!(output.status.success());
    assert_eq!(
        stdout(&output),
        "echo '--help is not recognized\nUsage: prog go' >&2\nexit 64\n"
    );
}

#[test]
fn usage_error_script() {
    let output = run(&["-h", "Usage: prog go", ":", "stop"], "");
    assert!(output.status.success());
    assert_eq!(stdout(&output), "echo 'Usage: prog go' >&2\nexit 64\n");
}

#[test]
fn help_and_version_from_stdin() {
    let output = run(
        &["-h", "-", "-V", "-", ":", "--version"],
        "Usage: prog\n----\nprog 2.0\n",
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "echo 'prog 2.0'\nexit 0\n");
}

#[test]
fn global_prefix() {
    let output = run(&["-G", "ARGS", "-h", "Usage: prog <x>", ":", "it's"], "");
    assert!(output.status.success());
    assert_eq!(stdout(&output), "ARGS_x='it'\\''s'\n");
}

#[test]
fn associative_array() {
    let output = run(&["-A", "args", "-h", "Usage: prog <f>...", ":", "a", "b"], "");
    assert!(output.status.success());
    assert_eq!(
        stdout(&output),
        "declare -A args\nargs['<f>,#']=2\nargs['<f>,0']='a'\nargs['<f>,1']='b'\n"
    );
}

#[test]
fn json_output() {
    let output = run(&["--json", "-h", "Usage: prog [-v...] <x>", ":", "-vv", "x"], "");
    assert!(output.status.success());
    assert_eq!(stdout(&output), "{\"-v\":2,\"<x>\":\"x\"}\n");
}

#[test]
fn json_usage_error_exits_64() {
    let output = run(&["--json", "-h", "Usage: prog go", ":"], "");
    assert_eq!(output.status.code(), Some(64));
    assert!(stdout(&output).is_empty());
    assert!(stderr(&output).contains("Usage: prog go"));
}

#[test]
fn options_first() {
    let output = run(
        &["-O", "-h", "Usage: prog [-v] <cmd> [<args>...]", ":", "run", "-v"],
        "",
    );
    assert!(output.status.success());
    assert_eq!(stdout(&output), "v=false\nargs=('-v')\ncmd='run'\n");
}

#[test]
fn to_file_prints_path() {
    let output = run(&["--to-file", "-h", "Usage: prog go", ":", "go"], "");
    assert!(output.status.success());

    let path = stdout(&output).trim().to_string();
    let contents = std::fs::read_to_string(&path).expect("script file exists");
    assert_eq!(contents, "go=true\n");
    std::fs::remove_file(path).unwrap();
}

#[test]
fn invalid_doc_fails() {
    let output = run(&["-h", "no usage section here", ":"], "");
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("not found"));
}

#[test]
fn missing_argv_marker_fails() {
    let output = run(&["-h", "Usage: prog"], "");
    assert!(!output.status.success());
    assert!(stderr(&output).contains("missing ':'"));
}

#[test]
fn invalid_prefix_fails() {
    let output = run(&["-G", "1x", "-h", "Usage: prog", ":"], "");
    assert!(!output.status.success());
    assert!(stderr(&output).contains("not a valid Bash identifier"));
}

#[cfg(unix)]
#[test]
fn non_unicode_argument_fails_cleanly() {
    use std::os::unix::ffi::OsStrExt;

    let args = [
        OsStr::new("-h"),
        OsStr::new("Usage: prog <f>"),
        OsStr::new(":"),
        OsStr::from_bytes(b"\xff\xfe"),
    ];
    let output = run(&args, "");
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).is_empty());
    assert!(stderr(&output).contains("not valid Unicode"));
    assert!(!stderr(&output).contains("panicked"));
}

#[test]
fn clustered_help_option() {
    let output = run(&["-Oh", "Usage: prog <cmd> [<args>...]", ":", "go", "-x"], "");
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "args=('-x')\ncmd='go'\n");
}

#[test]
fn version_text_starting_with_dash() {
    let output = run(&["-V", "-n 1.0", "-h", "Usage: prog", ":", "--version"], "");
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "echo '-n 1.0'\nexit 0\n");
}
