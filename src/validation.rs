//! Input validation for names, message bodies, ids and device tokens.

use std::collections::HashSet;

/// Display name validation errors with helpful messages
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DisplayNameError {
    #[error("Display name is too short (minimum {min} characters)")]
    TooShort { min: usize },

    #[error("Display name is too long (maximum {max} characters)")]
    TooLong { max: usize },

    #[error("Display name cannot start or end with whitespace")]
    InvalidWhitespace,

    #[error("Display name contains invalid characters: {chars}")]
    InvalidCharacters { chars: String },

    #[error("Display name contains path separators (/ or \\)")]
    PathTraversal,

    #[error("Display name is a reserved system name")]
    Reserved,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ContentError {
    #[error("Content is empty")]
    Empty,

    #[error("Content too long (max {max_length} bytes)")]
    TooLong { max_length: usize },
}

/// Display name validation rules configuration
#[derive(Debug, Clone)]
pub struct DisplayNameRules {
    pub min_length: usize,
    pub max_length: usize,
    pub allow_spaces: bool,
    pub allow_unicode: bool,
}

impl Default for DisplayNameRules {
    fn default() -> Self {
        DisplayNameRules {
            min_length: 2,
            max_length: 30,
            allow_spaces: true,
            allow_unicode: true,
        }
    }
}

/// Names that would be confusing in the player list or in notifications.
fn reserved_names() -> HashSet<&'static str> {
    [
        "admin", "administrator", "root", "system", "server", "moderator",
        "announcement", "everyone", "anonymous",
    ]
    .iter()
    .copied()
    .collect()
}

/// Validate a display name according to the given rules. Length is counted in characters.
pub fn validate_display_name_with(
    name: &str,
    rules: &DisplayNameRules,
) -> Result<String, DisplayNameError> {
    let trimmed = name.trim();
    let len = trimmed.chars().count();

    if len < rules.min_length {
        return Err(DisplayNameError::TooShort {
            min: rules.min_length,
        });
    }
    if len > rules.max_length {
        return Err(DisplayNameError::TooLong {
            max: rules.max_length,
        });
    }
    if trimmed != name {
        return Err(DisplayNameError::InvalidWhitespace);
    }
    if reserved_names().contains(trimmed.to_lowercase().as_str()) {
        return Err(DisplayNameError::Reserved);
    }
    if trimmed.contains('/') || trimmed.contains('\\') {
        return Err(DisplayNameError::PathTraversal);
    }

    let mut invalid: Vec<char> = Vec::new();
    for ch in trimmed.chars() {
        let valid = if ch.is_control() {
            false
        } else if ch.is_ascii_alphanumeric() || "_-.'".contains(ch) {
            true
        } else if ch == ' ' {
            rules.allow_spaces
        } else if !ch.is_ascii() {
            rules.allow_unicode
        } else {
            false
        };
        if !valid && !invalid.contains(&ch) {
            invalid.push(ch);
        }
    }
    if !invalid.is_empty() {
        let chars = invalid
            .into_iter()
            .map(|c| {
                if c.is_control() {
                    format!("\\u{{{:04x}}}", c as u32)
                } else {
                    c.to_string()
                }
            })
            .collect::<String>();
        return Err(DisplayNameError::InvalidCharacters { chars });
    }

    Ok(trimmed.to_string())
}

pub fn validate_display_name(name: &str) -> Result<String, DisplayNameError> {
    validate_display_name_with(name, &DisplayNameRules::default())
}

/// Strip control characters (keeping newlines and tabs) and enforce a byte limit.
pub fn sanitize_message_content(content: &str, max_bytes: usize) -> Result<String, ContentError> {
    if content.len() > max_bytes {
        return Err(ContentError::TooLong {
            max_length: max_bytes,
        });
    }
    let sanitized: String = content
        .chars()
        .filter(|&c| !c.is_control() || c == '\n' || c == '\t')
        .collect();
    if sanitized.trim().is_empty() {
        return Err(ContentError::Empty);
    }
    Ok(sanitized)
}

/// Accept a client-supplied message id if it is short and filename/URL safe.
pub fn accept_client_message_id(id: &str) -> Option<String> {
    let trimmed = id.trim();
    if trimmed.is_empty() || trimmed.len() > 64 {
        return None;
    }
    if trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_.:".contains(c))
    {
        Some(trimmed.to_string())
    } else {
        None
    }
}

/// Device tokens are opaque, but must be non-blank, printable and bounded.
pub fn validate_push_token(token: &str) -> Option<String> {
    let trimmed = token.trim();
    if trimmed.is_empty() || trimmed.len() > 256 || trimmed.chars().any(|c| c.is_control()) {
        return None;
    }
    Some(trimmed.to_string())
}

/// Shorten `text` for a notification preview.
///
/// Text of at most `limit` characters is returned unchanged; longer text is
/// cut to `limit - 3` characters followed by `...`. Counts characters, never
/// splits a code point.
pub fn truncate_preview(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let keep = limit.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}
