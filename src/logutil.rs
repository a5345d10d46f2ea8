//! Helpers that keep player-supplied text and identifiers log-safe.

use std::fmt::Write;

const MAX_PREVIEW: usize = 200;

/// Escape a string for single-line logging.
///
/// Newlines, carriage returns, tabs and backslashes become their escaped
/// forms, other control characters become `\xNN`, and anything past
/// 200 characters is replaced by a single `…`.
pub fn escape_log(s: &str) -> String {
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// First eight characters of an account key; enough to correlate log lines
/// without writing full identifiers to disk.
pub fn short_key(key: &str) -> String {
    let short: String = key.chars().take(8).collect();
    escape_log(&short)
}
