//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ### Request Format
//! ```text
//! command[ key1=val1 key2=val2|key1=val1 ...][ option1 option2]\n
//! ```
//!
//! ### Server Lines
//! ```text
//! key=val key=val|key=val ...          data objects of a response
//! notify<event> key=val|key=val ...    unsolicited notification
//! error id=<int> msg=<escaped text>    terminates a response
//! ```

use super::escape::{escape, unescape};
use super::{ErrorDescriptor, Properties, Request};
use crate::error::{QueryError, Result};

/// Separates chains (objects) within one line
pub const CHAIN_SEPARATOR: char = '|';

/// Line terminator on the wire
pub const LINE_TERMINATOR: char = '\n';

/// Token that starts a response terminator line
pub const ERROR_TOKEN: &str = "error";

/// Prefix of every notification identifier
pub const NOTIFY_PREFIX: &str = "notify";

/// A single decoded server line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// Data objects belonging to the current response
    Data(Vec<Properties>),

    /// An unsolicited notification, tagged by its identifier
    Notification {
        name: String,
        objects: Vec<Properties>,
    },

    /// `error ...` terminator
    Error(ErrorDescriptor),
}

// =============================================================================
// Request Encoding/Decoding
// =============================================================================

/// Encode a request to its wire line (including the trailing newline)
pub fn encode_request(request: &Request) -> String {
    let mut line = String::with_capacity(64);
    line.push_str(request.command());

    let mut first_chain = true;
    for chain in request.chains() {
        if first_chain {
            line.push(' ');
            first_chain = false;
        } else {
            line.push(CHAIN_SEPARATOR);
        }
        let mut first_pair = true;
        for (key, value) in chain.iter() {
            if !first_pair {
                line.push(' ');
            }
            first_pair = false;
            line.push_str(&escape(key));
            line.push('=');
            line.push_str(&escape(value));
        }
    }

    for option in request.options() {
        line.push(' ');
        line.push_str(&escape(option));
    }

    line.push(LINE_TERMINATOR);
    line
}

/// Decode a request line
///
/// Tokens containing `=` are key/value pairs of the current chain, all other
/// tokens after the command are options.
pub fn decode_request(line: &str) -> Result<Request> {
    let line = trim_line(line);
    let mut segments = line.split(CHAIN_SEPARATOR);

    let head = segments.next().unwrap_or_default();
    let mut tokens = head.split_whitespace();
    let command = tokens
        .next()
        .ok_or_else(|| QueryError::Decode("empty request line".to_string()))?;

    let mut builder = Request::builder().command(command);
    let mut options = Vec::new();

    builder = push_request_tokens(builder, tokens, &mut options)?;
    for segment in segments {
        builder = push_request_tokens(builder.next_chain(), segment.split_whitespace(), &mut options)?;
    }
    for option in options {
        builder = builder.add_option(option);
    }
    Ok(builder.build())
}

fn push_request_tokens<'a>(
    mut builder: super::RequestBuilder,
    tokens: impl Iterator<Item = &'a str>,
    options: &mut Vec<String>,
) -> Result<super::RequestBuilder> {
    for token in tokens {
        if token.contains('=') {
            let (key, value) = parse_pair(token)?;
            builder = builder.add_key(key, value);
        } else {
            options.push(unescape(token)?);
        }
    }
    Ok(builder)
}

// =============================================================================
// Server Line Decoding
// =============================================================================

/// Decode one server line
///
/// Returns `Ok(None)` for blank lines. A failure only concerns this line.
pub fn decode_line(line: &str) -> Result<Option<Line>> {
    let line = trim_line(line);
    if line.trim().is_empty() {
        return Ok(None);
    }

    let (head, rest) = match line.split_once(' ') {
        Some((head, rest)) => (head, rest),
        None => (line, ""),
    };

    if head == ERROR_TOKEN {
        return decode_error(rest).map(|e| Some(Line::Error(e)));
    }

    if head.starts_with(NOTIFY_PREFIX) && !head.contains('=') {
        return Ok(Some(Line::Notification {
            name: head.to_string(),
            objects: decode_objects(rest)?,
        }));
    }

    Ok(Some(Line::Data(decode_objects(line)?)))
}

/// Split a line body into chain-separated objects of key=value tokens
pub fn decode_objects(body: &str) -> Result<Vec<Properties>> {
    let mut objects = Vec::new();
    for segment in body.split(CHAIN_SEPARATOR) {
        let mut object = Properties::new();
        for token in segment.split_whitespace() {
            let (key, value) = parse_pair(token)?;
            object.insert(key, value);
        }
        if !object.is_empty() {
            objects.push(object);
        }
    }
    Ok(objects)
}

fn decode_error(body: &str) -> Result<ErrorDescriptor> {
    let mut id = None;
    let mut message = String::new();
    let mut extra = Properties::new();

    for token in body.split_whitespace() {
        let (key, value) = parse_pair(token)?;
        match key.as_str() {
            "id" => {
                id = Some(value.parse::<u32>().map_err(|_| {
                    QueryError::Decode(format!("invalid error id {:?}", value))
                })?)
            }
            "msg" => message = value,
            _ => extra.insert(key, value),
        }
    }

    let id = id.ok_or_else(|| QueryError::Decode("error line without id".to_string()))?;
    Ok(ErrorDescriptor { id, message, extra })
}

/// Parse `key=value`; a bare `key` carries an empty value
fn parse_pair(token: &str) -> Result<(String, String)> {
    let (key, value) = token.split_once('=').unwrap_or((token, ""));
    if key.is_empty() {
        return Err(QueryError::Decode(format!(
            "malformed token {:?}: empty key",
            token
        )));
    }
    Ok((unescape(key)?, unescape(value)?))
}

fn trim_line(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}
