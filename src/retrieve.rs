//! Single message retrieval

use crate::controller::ConnectionController;
use crate::error::{Error, Result};
use crate::session::{ContentStream, FetchOptions, Session};
use futures::StreamExt;
use tracing::{debug, warn};

/// Where a retrieved message came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentInfo {
    pub mailbox: String,
    pub uid: u32,
    pub seqno: u32,
    /// The fetched body section, empty for the whole message.
    pub section: String,
}

/// Raw content of one message, still streaming.
pub struct FetchedContent {
    pub content: ContentStream,
    pub info: ContentInfo,
}

impl std::fmt::Debug for FetchedContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchedContent")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// Open `mailbox` read-only and fetch the whole of message `uid`.
///
/// The content stream is handed over as soon as the server announces the
/// message. Should the server announce more than one message, the first
/// wins and the rest are drained and logged.
///
/// # Errors
///
/// Returns [`Error::InvalidState`] unless connected, [`Error::BoxOpen`]
/// if the mailbox cannot be opened, and [`Error::FetchProtocol`] if the
/// fetch fails or no message has that UID.
pub async fn retrieve<S: Session>(
    controller: &mut ConnectionController<S>,
    mailbox: &str,
    uid: u32,
) -> Result<FetchedContent> {
    const OPERATION: &str = "fetch message";

    controller.open_box(OPERATION, mailbox, true).await?;
    let options = FetchOptions::full();
    let section = options.content.section();

    let session = controller.session(OPERATION)?;
    let mut messages = session.fetch(&uid.to_string(), options).await?;

    let Some(first) = messages.next().await.transpose()? else {
        return Err(Error::FetchProtocol(format!("message {uid} not found in {mailbox}")));
    };

    while let Some(extra) = messages.next().await {
        match extra {
            Ok(extra) => warn!(uid, seqno = extra.seqno, "Ignoring extra fetch result"),
            Err(e) => warn!(uid, %e, "Error after fetch result"),
        }
    }

    debug!(mailbox, uid, seqno = first.seqno, "Message content available");
    Ok(FetchedContent {
        content: first.content,
        info: ContentInfo {
            mailbox: mailbox.to_string(),
            uid,
            seqno: first.seqno,
            section,
        },
    })
}
