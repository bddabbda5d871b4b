//! Full message decoding for downloads

use crate::error::{Error, Result};
use crate::session::ContentStream;
use futures::TryStreamExt;
use mailparse::{DispositionType, MailHeaderMap, ParsedMail, parse_mail};
use serde::Serialize;

/// A downloaded and decoded message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedMessage {
    pub subject: String,
    pub html: Option<String>,
    pub text: Option<String>,
    pub attachments: Vec<Attachment>,
}

/// Description of an attached part. Attachment bodies are not kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub filename: Option<String>,
    pub content_type: String,
    pub size: usize,
}

impl ParsedMessage {
    /// Drain `content` and decode the message it carries.
    ///
    /// # Errors
    ///
    /// Returns the stream's error if draining fails, or
    /// [`Error::MessageParse`] if the MIME structure cannot be decoded.
    pub async fn from_stream(uid: u32, content: ContentStream) -> Result<Self> {
        let raw: Vec<u8> = content
            .try_fold(Vec::new(), |mut raw, chunk| async move {
                raw.extend_from_slice(&chunk);
                Ok(raw)
            })
            .await?;
        Self::parse(uid, &raw)
    }

    /// Decode a raw RFC 2822 message.
    ///
    /// The first `text/plain` and `text/html` parts that are not
    /// attachments become the message's text and html.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MessageParse`] if the MIME structure or a part
    /// body cannot be decoded.
    pub fn parse(uid: u32, raw: &[u8]) -> Result<Self> {
        let fail = |e: mailparse::MailParseError| Error::MessageParse {
            uid,
            reason: e.to_string(),
        };

        let mail = parse_mail(raw).map_err(fail)?;
        let mut message = Self {
            subject: mail.headers.get_first_value("Subject").unwrap_or_default(),
            ..Self::default()
        };
        message.collect_part(&mail).map_err(fail)?;
        Ok(message)
    }

    fn collect_part(
        &mut self,
        part: &ParsedMail<'_>,
    ) -> std::result::Result<(), mailparse::MailParseError> {
        let disposition = part.get_content_disposition();
        if disposition.disposition == DispositionType::Attachment {
            self.attachments.push(Attachment {
                filename: disposition
                    .params
                    .get("filename")
                    .or_else(|| part.ctype.params.get("name"))
                    .cloned(),
                content_type: part.ctype.mimetype.clone(),
                size: part.get_body_raw()?.len(),
            });
            return Ok(());
        }

        if !part.subparts.is_empty() {
            for sub in &part.subparts {
                self.collect_part(sub)?;
            }
            return Ok(());
        }

        match part.ctype.mimetype.as_str() {
            "text/plain" if self.text.is_none() => self.text = Some(part.get_body()?),
            "text/html" if self.html.is_none() => self.html = Some(part.get_body()?),
            _ => {}
        }
        Ok(())
    }
}
