//! Shell quoting for generated command lines.

/// Wrap `value` in single quotes for `sh`, escaping embedded quotes.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
