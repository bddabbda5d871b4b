//! Streaming IMAP fetcher
//!
//! A read-only IMAP client that lists the subscribed mailbox tree,
//! streams message listings as each message's headers arrive, and
//! fetches or decodes single messages.
//!
//! [`Fetcher`] is the entry point. It drives any [`Session`]; the
//! default one, [`ImapTransport`], talks to a real server through
//! `async-imap` over implicit TLS or STARTTLS.
//!
//! ```no_run
//! use futures::StreamExt;
//! use imap_fetcher::Fetcher;
//!
//! # async fn run() -> imap_fetcher::Result<()> {
//! let mut fetcher = Fetcher::from_options(&serde_json::json!({
//!     "user": "me@example.com",
//!     "password": "secret",
//!     "host": "imap.example.com",
//! }))?;
//! fetcher.connect().await?;
//!
//! let mut messages = fetcher.list("INBOX", "1:*")?;
//! while let Some(message) = messages.next().await {
//!     match message {
//!         Ok(message) => println!("{} {}", message.uid, message.subject),
//!         Err(e) => eprintln!("{e}"),
//!     }
//! }
//! drop(messages);
//!
//! fetcher.disconnect().await
//! # }
//! ```

mod aggregate;
mod client;
mod config;
mod connection;
mod controller;
mod download;
mod error;
mod hierarchy;
mod message;
mod retrieve;
mod session;
mod stream;

pub use aggregate::aggregate;
pub use client::Fetcher;
pub use config::{FetcherConfig, TlsOptions};
pub use connection::ImapTransport;
pub use controller::{ConnectionController, ConnectionState};
pub use download::{Attachment, ParsedMessage};
pub use error::{Error, Result};
pub use hierarchy::{BoxEntry, MailboxNode, build_tree, nest_flat_names};
pub use message::{MessageDescriptor, Participant, parse_address_list, parse_date};
pub use retrieve::{ContentInfo, FetchedContent, retrieve};
pub use session::{
    AttributesFuture, BoxInfo, ContentSelector, ContentStream, FetchOptions, FetchedMessage,
    MessageAttributes, MessageStream, Session,
};
pub use stream::{ResultSink, ResultStream, channel};
pub use tokio_util::sync::CancellationToken;
