//! Bijective escaping for JSON-path segment literals.
//!
//! The RedisJSON engine (at least on some managed deployments) mishandles a
//! forward slash or tilde embedded in a string literal used as a key: a
//! slash is misread as a nested-path separator, and a tilde silently drops
//! the write. Keys are escaped before use and unescaped on read so that the
//! round trip is the identity function for every string.
//!
//! Characters are escaped by prefixing them with a backtick, followed by one
//! character from the mapping below; the backtick itself escapes to two
//! backticks.

use thiserror::Error;

const ESCAPE_CHAR: char = '`';

fn forward(c: char) -> Option<char> {
    match c {
        '/' => Some('s'),
        '~' => Some('t'),
        _ => None,
    }
}

fn reverse(c: char) -> Option<char> {
    match c {
        's' => Some('/'),
        't' => Some('~'),
        _ => None,
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EscapeError {
    #[error("invalid escape sequence '`{0}'")]
    InvalidSequence(char),
    #[error("unterminated escape sequence")]
    Unterminated,
}

/// Escape `path` so every `/`, `~`, and `` ` `` is safe to embed as a JSON
/// object-key string literal.
pub fn escape_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        if c == ESCAPE_CHAR {
            out.push(ESCAPE_CHAR);
            out.push(ESCAPE_CHAR);
        } else if let Some(mapped) = forward(c) {
            out.push(ESCAPE_CHAR);
            out.push(mapped);
        } else {
            out.push(c);
        }
    }
    out
}

/// Invert [`escape_path`]. Errors if the escape sequence is malformed.
pub fn unescape_path(path: &str) -> Result<String, EscapeError> {
    let mut out = String::with_capacity(path.len());
    let mut chars = path.chars();
    while let Some(c) = chars.next() {
        if c != ESCAPE_CHAR {
            out.push(c);
            continue;
        }
        match chars.next() {
            None => return Err(EscapeError::Unterminated),
            Some(ESCAPE_CHAR) => out.push(ESCAPE_CHAR),
            Some(other) => match reverse(other) {
                Some(mapped) => out.push(mapped),
                None => return Err(EscapeError::InvalidSequence(other)),
            },
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_special_characters() {
        for sample in ["plain", "a/b/c", "tilde~here", "back`tick", "a/b~c`d"] {
            let escaped = escape_path(sample);
            assert_eq!(unescape_path(&escaped).unwrap(), sample);
        }
    }

    #[test]
    fn rejects_unknown_escape() {
        assert_eq!(unescape_path("`x"), Err(EscapeError::InvalidSequence('x')));
    }

    #[test]
    fn rejects_trailing_backtick() {
        assert_eq!(unescape_path("abc`"), Err(EscapeError::Unterminated));
    }
}
