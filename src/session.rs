//! The mail session collaborator
//!
//! Everything the fetcher needs from a stateful mail session is behind
//! the [`Session`] trait: lifecycle, mailbox selection, batch fetches
//! and the subscribed mailbox listing. [`ImapTransport`](crate::ImapTransport)
//! is the `async-imap` implementation.

use crate::error::{Error, Result};
use crate::hierarchy::BoxEntry;
use futures::future::{self, BoxFuture};
use futures::stream::{self, BoxStream};
use futures::{FutureExt, StreamExt};
use std::future::Future;

/// Raw message bytes, delivered in chunks.
pub type ContentStream = BoxStream<'static, Result<Vec<u8>>>;

/// Resolves once with the attributes of one fetched message.
pub type AttributesFuture = BoxFuture<'static, Result<MessageAttributes>>;

/// Per-message notifications of one batch fetch. The stream ending is
/// the end-of-source signal; an `Err` item is a protocol failure.
pub type MessageStream<'a> = BoxStream<'a, Result<FetchedMessage>>;

/// Metadata delivered by the attributes signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAttributes {
    pub uid: u32,
    pub flags: Vec<String>,
}

/// One message notification from a batch fetch.
///
/// The two signals are independent: the attributes may resolve before,
/// during or after the content stream is drained.
pub struct FetchedMessage {
    /// Sequence number of the message in the selected mailbox.
    pub seqno: u32,
    pub attributes: AttributesFuture,
    pub content: ContentStream,
}

impl FetchedMessage {
    #[must_use]
    pub const fn new(seqno: u32, attributes: AttributesFuture, content: ContentStream) -> Self {
        Self {
            seqno,
            attributes,
            content,
        }
    }

    /// A notification whose signals are both available immediately.
    #[must_use]
    pub fn ready(seqno: u32, attributes: MessageAttributes, content: Vec<u8>) -> Self {
        Self::new(
            seqno,
            future::ready(Ok(attributes)).boxed(),
            stream::once(future::ready(Ok(content))).boxed(),
        )
    }
}

impl std::fmt::Debug for FetchedMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchedMessage")
            .field("seqno", &self.seqno)
            .finish_non_exhaustive()
    }
}

/// Which part of each message a fetch delivers as content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSelector {
    /// The complete raw message.
    Full,
    /// Only the named header fields.
    HeaderFields(Vec<String>),
}

impl ContentSelector {
    /// The IMAP body section name (`""` for the whole message).
    #[must_use]
    pub fn section(&self) -> String {
        match self {
            Self::Full => String::new(),
            Self::HeaderFields(fields) => format!("HEADER.FIELDS ({})", fields.join(" ")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    pub content: ContentSelector,
    /// Also request the body structure.
    pub structure: bool,
}

impl FetchOptions {
    /// Whole-message fetch, as used by single item retrieval.
    #[must_use]
    pub const fn full() -> Self {
        Self {
            content: ContentSelector::Full,
            structure: false,
        }
    }

    /// The header fields a message listing needs, plus structure.
    #[must_use]
    pub fn listing() -> Self {
        Self {
            content: ContentSelector::HeaderFields(
                ["FROM", "TO", "SUBJECT", "DATE"]
                    .into_iter()
                    .map(String::from)
                    .collect(),
            ),
            structure: true,
        }
    }

    /// The FETCH data item list for these options.
    ///
    /// ```
    /// use imap_fetcher::FetchOptions;
    ///
    /// assert_eq!(FetchOptions::full().to_query(), "(UID BODY.PEEK[])");
    /// assert_eq!(
    ///     FetchOptions::listing().to_query(),
    ///     "(UID BODY.PEEK[HEADER.FIELDS (FROM TO SUBJECT DATE)] BODYSTRUCTURE)"
    /// );
    /// ```
    #[must_use]
    pub fn to_query(&self) -> String {
        let mut query = format!("(UID BODY.PEEK[{}]", self.content.section());
        if self.structure {
            query.push_str(" BODYSTRUCTURE");
        }
        query.push(')');
        query
    }
}

/// What the server reported when a mailbox was opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxInfo {
    pub name: String,
    pub read_only: bool,
    pub exists: u32,
    pub uid_validity: Option<u32>,
}

/// A stateful mail session.
///
/// Implementations signal readiness by resolving `connect`, and the end
/// of the session by resolving `end`. Errors raised by the session
/// outside of any request are queued and handed over by
/// [`take_faults`](Session::take_faults).
pub trait Session: Send {
    fn connect(&mut self) -> impl Future<Output = Result<()>> + Send;

    fn end(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Select `path`, read-only when asked to.
    fn open_box(&mut self, path: &str, read_only: bool)
    -> impl Future<Output = Result<BoxInfo>> + Send;

    /// Fetch the messages matched by `selector` in the open mailbox.
    fn fetch(
        &mut self,
        selector: &str,
        options: FetchOptions,
    ) -> impl Future<Output = Result<MessageStream<'_>>> + Send;

    /// The subscribed mailboxes, nested by hierarchy.
    fn list_subscribed(&mut self) -> impl Future<Output = Result<Vec<BoxEntry>>> + Send;

    fn take_faults(&mut self) -> Vec<Error> {
        Vec::new()
    }
}
