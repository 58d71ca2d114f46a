//! Shell escaping and quoting utilities.

/// Escape a value for use inside single quotes.
/// Replaces `'` with `'\''` (end quote, escaped quote, start quote).
pub fn escape_single_quote_content(value: &str) -> String {
    value.replace('\'', "'\\''")
}

/// Quote a single argument for shell execution.
/// - Empty strings become `''`
/// - Strings with shell metacharacters are wrapped in single quotes
/// - Embedded single quotes are escaped
pub fn quote_arg(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }

    // Characters that require quoting
    const SHELL_META: &[char] = &[
        ' ', '\t', '\n', '\'', '"', '\\', '$', '`', '!', '*', '?', '[', ']', '(', ')', '{', '}',
        '<', '>', '|', '&', ';', '#', '~',
    ];

    if !arg.contains(SHELL_META) {
        return arg.to_string();
    }

    format!("'{}'", escape_single_quote_content(arg))
}

/// Quote and join multiple arguments for shell execution.
pub fn quote_args(args: &[String]) -> String {
    args.iter()
        .map(|a| quote_arg(a))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Program a command string invokes: the first word after any leading
/// `KEY=value` assignments, with surrounding quotes removed.
///
/// Returns `None` for commands that start with a shell builtin construct
/// (subshell, grouping) where no single program can be named.
pub fn program_name(command: &str) -> Option<String> {
    let word = command
        .split_whitespace()
        .find(|word| !is_env_assignment(word))?;

    if word.starts_with('(') || word.starts_with('{') {
        return None;
    }

    let unquoted = word.trim_matches(|c| c == '\'' || c == '"');
    if unquoted.is_empty() {
        None
    } else {
        Some(unquoted.to_string())
    }
}

/// POSIX special and common regular builtins. These never appear on PATH.
const SHELL_BUILTINS: &[&str] = &[
    ":", ".", "break", "cd", "command", "continue", "eval", "exec", "exit", "export", "false",
    "printf", "echo", "read", "return", "set", "shift", "source", "test", "trap", "true",
    "type", "ulimit", "umask", "unset", "[",
];

/// Whether `word` is a builtin the shell runs without a PATH lookup.
pub fn is_builtin(word: &str) -> bool {
    SHELL_BUILTINS.contains(&word)
}

fn is_env_assignment(word: &str) -> bool {
    match word.split_once('=') {
        Some((key, _)) => {
            !key.is_empty()
                && key
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !key.starts_with(|c: char| c.is_ascii_digit())
        }
        None => false,
    }
}
