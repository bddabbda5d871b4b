//! IMAP fetcher client

use crate::aggregate::aggregate;
use crate::config::FetcherConfig;
use crate::connection::ImapTransport;
use crate::controller::{ConnectionController, ConnectionState};
use crate::download::ParsedMessage;
use crate::error::{Error, Result};
use crate::hierarchy::{MailboxNode, build_tree};
use crate::message::MessageDescriptor;
use crate::retrieve::{FetchedContent, retrieve};
use crate::session::{FetchOptions, Session};
use crate::stream::{self, ResultStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Read-only mail fetcher over one session.
///
/// All operations but [`connect`](Self::connect) require a connected
/// fetcher and fail with [`Error::InvalidState`] otherwise.
pub struct Fetcher<S = ImapTransport> {
    controller: ConnectionController<S>,
}

impl Fetcher<ImapTransport> {
    #[must_use]
    pub const fn new(config: FetcherConfig) -> Self {
        Self::with_session(ImapTransport::new(config))
    }

    /// Build a fetcher from a JSON option object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Argument`] if the options are not a valid
    /// configuration object.
    pub fn from_options(options: &serde_json::Value) -> Result<Self> {
        FetcherConfig::from_value(options).map(Self::new)
    }
}

impl<S: Session> Fetcher<S> {
    /// A fetcher over any [`Session`] implementation.
    #[must_use]
    pub const fn with_session(session: S) -> Self {
        Self {
            controller: ConnectionController::new(session),
        }
    }

    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.controller.state()
    }

    /// Receive session errors that happen between operations.
    pub fn subscribe_faults(&mut self) -> mpsc::UnboundedReceiver<Error> {
        self.controller.subscribe_faults()
    }

    /// Connect and log in.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless disconnected, or
    /// [`Error::Connection`] if the session cannot be established.
    pub async fn connect(&mut self) -> Result<()> {
        self.controller.connect().await
    }

    /// Log out and close the session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless connected, or
    /// [`Error::Connection`] if logging out fails.
    pub async fn disconnect(&mut self) -> Result<()> {
        self.controller.disconnect().await
    }

    /// The subscribed mailboxes as a tree of path-qualified nodes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless connected, or the session's
    /// error if the listing fails.
    pub async fn list_boxes(&mut self) -> Result<Vec<MailboxNode>> {
        let entries = self
            .controller
            .session("list mailboxes")?
            .list_subscribed()
            .await?;
        let tree = build_tree(&entries, "");
        debug!(roots = tree.len(), "Listed mailboxes");
        Ok(tree)
    }

    /// Stream a descriptor for every message in `mailbox` matched by the
    /// UID set `selector` (for example `1:*`).
    ///
    /// See [`list_until`](Self::list_until).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless connected.
    pub fn list<'a>(
        &'a mut self,
        mailbox: &'a str,
        selector: &'a str,
    ) -> Result<ResultStream<'a, MessageDescriptor>> {
        self.list_until(mailbox, selector, CancellationToken::new())
    }

    /// Like [`list`](Self::list), stopping early once `cancel` fires.
    ///
    /// The mailbox is opened and the batch fetched while the returned
    /// stream is polled. Descriptors arrive as messages complete, in no
    /// particular order. A message whose headers cannot be parsed yields
    /// an [`Error::MessageParse`] item and the listing goes on; a failure
    /// to open the mailbox or of the fetch itself is the last item.
    /// Cancelling ends the stream without an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless connected.
    pub fn list_until<'a>(
        &'a mut self,
        mailbox: &'a str,
        selector: &'a str,
        cancel: CancellationToken,
    ) -> Result<ResultStream<'a, MessageDescriptor>> {
        const OPERATION: &str = "list messages";

        self.controller.session(OPERATION)?;
        let controller = &mut self.controller;
        let (sink, results) = stream::channel();

        let driver = async move {
            if let Err(e) = controller.open_box(OPERATION, mailbox, true).await {
                sink.error(e);
                return;
            }
            let session = match controller.session(OPERATION) {
                Ok(session) => session,
                Err(e) => {
                    sink.error(e);
                    return;
                }
            };
            info!(mailbox, selector, "Listing messages");
            match session.fetch(selector, FetchOptions::listing()).await {
                Ok(source) => aggregate(source, sink, cancel).await,
                Err(e) => sink.error(e),
            }
        };

        Ok(results.driven_by(driver))
    }

    /// Stream the raw content of message `uid` in `mailbox`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless connected,
    /// [`Error::BoxOpen`] if the mailbox cannot be opened, or
    /// [`Error::FetchProtocol`] if the fetch fails or the message does
    /// not exist.
    pub async fn fetch(&mut self, mailbox: &str, uid: u32) -> Result<FetchedContent> {
        retrieve(&mut self.controller, mailbox, uid).await
    }

    /// Fetch message `uid` in `mailbox` and decode it.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`fetch`](Self::fetch), or
    /// [`Error::MessageParse`] if the message cannot be decoded.
    pub async fn download(&mut self, mailbox: &str, uid: u32) -> Result<ParsedMessage> {
        let fetched = self.fetch(mailbox, uid).await?;
        ParsedMessage::from_stream(uid, fetched.content).await
    }
}

impl<S> std::fmt::Debug for Fetcher<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher").finish_non_exhaustive()
    }
}
