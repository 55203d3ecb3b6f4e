//! Front matter parsing for post source files.
//!
//! A post file begins with a delimited metadata block:
//!
//! ```text
//! ---
//! title: "Shaving the yak"
//! createdAt: "2023-04-02"
//! tags: ["rust", "tooling"]
//! slug: "shaving-the-yak"
//! ---
//! body markdown...
//! ```
//!
//! Every metadata line is `key: <JSON value>`, so quoted strings and arrays
//! decode naturally. Parsing is all-or-nothing: a missing delimiter, a line
//! that is not `key: value` shaped, an undecodable value, or an absent
//! required attribute rejects the whole file. Partial posts are never
//! produced.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;
use time::{Date, format_description::FormatItem, macros::format_description};

use crate::domain::types::PostStatus;

const DELIMITER: &str = "---";

const CREATED_AT_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

#[derive(Debug, Error)]
pub enum FrontMatterError {
    #[error("missing front matter delimiters")]
    MissingDelimiter,
    #[error("line {line}: expected `key: json-value`")]
    MalformedLine { line: usize },
    #[error("line {line}: value for `{key}` is not valid JSON")]
    InvalidValue {
        line: usize,
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("line {line}: attribute `{key}` has the wrong shape")]
    InvalidAttribute { key: &'static str, line: usize },
    #[error("missing required attribute `{key}`")]
    MissingAttribute { key: &'static str },
}

/// Typed attributes decoded from a front matter block.
#[derive(Debug, Clone, PartialEq)]
pub struct PostAttributes {
    pub title: String,
    pub created_at: Date,
    pub tags: Vec<String>,
    pub slug: String,
    pub status: PostStatus,
    pub description: Option<String>,
}

/// The outcome of [`parse`]: typed attributes plus the untouched body.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPost {
    pub attributes: PostAttributes,
    pub body: String,
}

/// Split a raw post file into its front matter attributes and body.
///
/// The body is everything after the closing delimiter line, byte for byte.
/// Unknown metadata keys are ignored; `tags` defaults to empty and `status`
/// to `published`.
pub fn parse(input: &str) -> Result<ParsedPost, FrontMatterError> {
    let rest = input
        .strip_prefix("---\n")
        .or_else(|| input.strip_prefix("---\r\n"))
        .ok_or(FrontMatterError::MissingDelimiter)?;

    let mut fields: BTreeMap<String, (usize, Value)> = BTreeMap::new();
    let mut offset = 0usize;
    // The opening delimiter was line 1.
    let mut line_no = 1usize;
    let mut body: Option<&str> = None;

    for line in rest.split_inclusive('\n') {
        line_no += 1;
        let text = line.trim_end_matches(['\r', '\n']);
        if text == DELIMITER {
            body = Some(&rest[offset + line.len()..]);
            break;
        }
        offset += line.len();

        let Some((key, value)) = text.split_once(':') else {
            return Err(FrontMatterError::MalformedLine { line: line_no });
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(FrontMatterError::MalformedLine { line: line_no });
        }
        let value: Value =
            serde_json::from_str(value).map_err(|source| FrontMatterError::InvalidValue {
                line: line_no,
                key: key.to_string(),
                source,
            })?;
        fields.insert(key.to_string(), (line_no, value));
    }

    let body = body.ok_or(FrontMatterError::MissingDelimiter)?;
    let attributes = PostAttributes::from_fields(fields)?;

    Ok(ParsedPost {
        attributes,
        body: body.to_string(),
    })
}

impl PostAttributes {
    fn from_fields(mut fields: BTreeMap<String, (usize, Value)>) -> Result<Self, FrontMatterError> {
        let title = require_string(&mut fields, "title")?;
        let slug = require_string(&mut fields, "slug")?;

        let (created_line, created_raw) = take_string(&mut fields, "createdAt")?
            .ok_or(FrontMatterError::MissingAttribute { key: "createdAt" })?;
        let created_at = Date::parse(&created_raw, CREATED_AT_FORMAT).map_err(|_| {
            FrontMatterError::InvalidAttribute {
                key: "createdAt",
                line: created_line,
            }
        })?;

        let tags = match fields.remove("tags") {
            None => Vec::new(),
            Some((line, value)) => serde_json::from_value(value)
                .map_err(|_| FrontMatterError::InvalidAttribute { key: "tags", line })?,
        };

        let status = match fields.remove("status") {
            None => PostStatus::Published,
            Some((line, value)) => serde_json::from_value(value)
                .map_err(|_| FrontMatterError::InvalidAttribute { key: "status", line })?,
        };

        let description = match fields.remove("description") {
            None | Some((_, Value::Null)) => None,
            Some((line, value)) => Some(serde_json::from_value(value).map_err(|_| {
                FrontMatterError::InvalidAttribute {
                    key: "description",
                    line,
                }
            })?),
        };

        Ok(Self {
            title: title.1,
            created_at,
            tags,
            slug: slug.1,
            status,
            description,
        })
    }
}

fn take_string(
    fields: &mut BTreeMap<String, (usize, Value)>,
    key: &'static str,
) -> Result<Option<(usize, String)>, FrontMatterError> {
    match fields.remove(key) {
        None => Ok(None),
        Some((line, Value::String(value))) => Ok(Some((line, value))),
        Some((line, _)) => Err(FrontMatterError::InvalidAttribute { key, line }),
    }
}

fn require_string(
    fields: &mut BTreeMap<String, (usize, Value)>,
    key: &'static str,
) -> Result<(usize, String), FrontMatterError> {
    take_string(fields, key)?.ok_or(FrontMatterError::MissingAttribute { key })
}
