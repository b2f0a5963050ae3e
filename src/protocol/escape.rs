//! Escaping for keys and values on the wire
//!
//! | char        | wire  |
//! |-------------|-------|
//! | `\`         | `\\`  |
//! | space       | `\s`  |
//! | `/`         | `\/`  |
//! | `|`         | `\p`  |
//! | LF          | `\n`  |
//! | CR          | `\r`  |
//! | TAB         | `\t`  |
//! | BEL (0x07)  | `\a`  |
//!
//! Everything else passes through unmodified.

use crate::error::{QueryError, Result};

/// Escape a key or value for transmission
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + raw.len() / 4);
    for c in raw.chars() {
        match escape_char(c) {
            Some(code) => {
                out.push('\\');
                out.push(code);
            }
            None => out.push(c),
        }
    }
    out
}

/// Reverse [`escape`]
///
/// An unknown escape code or a trailing lone backslash is a decode error.
pub fn unescape(wire: &str) -> Result<String> {
    // Fast path: most values carry no escapes at all
    if !wire.contains('\\') {
        return Ok(wire.to_string());
    }

    let mut out = String::with_capacity(wire.len());
    let mut chars = wire.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(code) => match unescape_char(code) {
                Some(plain) => out.push(plain),
                None => {
                    return Err(QueryError::Decode(format!(
                        "unknown escape sequence '\\{}'",
                        code
                    )))
                }
            },
            None => {
                return Err(QueryError::Decode(
                    "unterminated escape sequence".to_string(),
                ))
            }
        }
    }
    Ok(out)
}

fn escape_char(c: char) -> Option<char> {
    match c {
        '\\' => Some('\\'),
        ' ' => Some('s'),
        '/' => Some('/'),
        '|' => Some('p'),
        '\n' => Some('n'),
        '\r' => Some('r'),
        '\t' => Some('t'),
        '\x07' => Some('a'),
        _ => None,
    }
}

fn unescape_char(code: char) -> Option<char> {
    match code {
        '\\' => Some('\\'),
        's' => Some(' '),
        '/' => Some('/'),
        'p' => Some('|'),
        'n' => Some('\n'),
        'r' => Some('\r'),
        't' => Some('\t'),
        'a' => Some('\x07'),
        _ => None,
    }
}
