//! Message metadata
//!
//! A [`MessageDescriptor`] is built from a message's From, To, Subject
//! and Date headers once both its attributes and its raw headers are
//! available.

use crate::error::{Error, Result};
use chrono::DateTime;
use mailparse::{MailAddr, MailHeaderMap, addrparse, parse_headers};
use serde::Serialize;

/// One sender or recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participant {
    pub name: String,
    pub address: String,
}

/// Listing entry for one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageDescriptor {
    pub uid: u32,
    pub subject: String,
    /// Milliseconds since the Unix epoch.
    pub date: i64,
    /// Senders followed by recipients.
    pub people: Vec<Participant>,
}

impl MessageDescriptor {
    /// Parse the header block of message `uid`.
    ///
    /// A missing subject yields an empty one and missing address headers
    /// yield no participants, but the Date header is mandatory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MessageParse`] if the header block, an address
    /// list or the date cannot be parsed.
    pub fn parse(uid: u32, raw: &[u8]) -> Result<Self> {
        let fail = |reason: String| Error::MessageParse { uid, reason };

        let (headers, _) = parse_headers(raw).map_err(|e| fail(e.to_string()))?;

        let mut people = Vec::new();
        for field in ["From", "To"] {
            if let Some(value) = headers.get_first_value(field) {
                people.extend(parse_address_list(&value).map_err(fail)?);
            }
        }

        let subject = headers.get_first_value("Subject").unwrap_or_default();

        let date = headers
            .get_first_value("Date")
            .ok_or_else(|| fail("missing Date header".to_string()))?;
        let date = parse_date(&date).map_err(fail)?;

        Ok(Self {
            uid,
            subject,
            date,
            people,
        })
    }
}

/// Parse an address list header into participants, flattening groups.
///
/// # Errors
///
/// Returns a description of the problem if the list is malformed.
pub fn parse_address_list(value: &str) -> std::result::Result<Vec<Participant>, String> {
    if value.trim().is_empty() {
        return Ok(Vec::new());
    }
    let list = addrparse(value).map_err(|e| format!("bad address list {value:?}: {e}"))?;

    let mut people = Vec::new();
    for addr in list.into_inner() {
        match addr {
            MailAddr::Single(single) => people.push(Participant {
                name: single.display_name.unwrap_or_default(),
                address: single.addr,
            }),
            MailAddr::Group(group) => {
                people.extend(group.addrs.into_iter().map(|single| Participant {
                    name: single.display_name.unwrap_or_default(),
                    address: single.addr,
                }));
            }
        }
    }
    Ok(people)
}

/// Parse a protocol date into epoch milliseconds.
///
/// A trailing comment such as `(UTC)` is ignored.
///
/// # Errors
///
/// Returns a description of the problem if `value` is not an RFC 2822
/// date.
pub fn parse_date(value: &str) -> std::result::Result<i64, String> {
    let mut trimmed = value.trim();
    if trimmed.ends_with(')') {
        if let Some(open) = trimmed.rfind('(') {
            trimmed = trimmed[..open].trim_end();
        }
    }
    DateTime::parse_from_rfc2822(trimmed)
        .map(|date| date.timestamp_millis())
        .map_err(|e| format!("bad date {value:?}: {e}"))
}
