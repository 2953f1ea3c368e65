//! Shell-style command line tokenization.

use std::borrow::Cow;

/// Split a shell-style command line into its tokens.
///
/// # Errors
///
/// Returns `shell_words::ParseError` on unbalanced quotes.
pub fn split(line: &str) -> Result<Vec<String>, shell_words::ParseError> {
    shell_words::split(line)
}

/// Render a command and its arguments as a single shell-safe line.
#[must_use]
pub fn display(command: &str, args: &[String]) -> String {
    std::iter::once(command)
        .chain(args.iter().map(String::as_str))
        .map(|word| shell_escape::escape(Cow::Borrowed(word)))
        .collect::<Vec<_>>()
        .join(" ")
}
