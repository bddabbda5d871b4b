//! Batch message aggregation
//!
//! A batch fetch announces its messages one at a time. Each announced
//! message then delivers two signals in no particular order: its
//! attributes (carrying the UID) and its raw header bytes as a stream
//! that has to be drained. [`aggregate`] joins the two halves of every
//! message, turns each complete pair into a [`MessageDescriptor`] (or a
//! per-message parse error) and closes the output once the source has
//! ended and every announced message has been accounted for.
//!
//! All bookkeeping lives in one driver loop owned by a single call, so
//! the completion check never races with the events that change it.

use crate::error::{Error, Result};
use crate::message::MessageDescriptor;
use crate::session::{ContentStream, FetchedMessage};
use crate::stream::ResultSink;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, Stream, StreamExt, TryStreamExt};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Identifies one message within a batch. The UID cannot be used for
/// this because it is unknown until the attributes arrive.
type Token = u64;

/// One half of a message's join.
#[derive(Debug)]
enum Signal {
    Attributes(u32),
    Content(Vec<u8>),
}

/// Both halves of one message.
#[derive(Debug, PartialEq, Eq)]
struct Joined {
    uid: u32,
    content: Vec<u8>,
}

#[derive(Debug, Default, PartialEq, Eq)]
enum JoinState {
    #[default]
    Empty,
    HasAttributes(u32),
    HasContent(Vec<u8>),
    Done,
}

/// Join state of a single message. Completes on whichever signal
/// arrives second; repeated signals are ignored.
#[derive(Debug, Default)]
struct PendingJoin {
    state: JoinState,
}

impl PendingJoin {
    fn deliver(&mut self, signal: Signal) -> Option<Joined> {
        let state = std::mem::replace(&mut self.state, JoinState::Done);
        let (next, joined) = match (state, signal) {
            (JoinState::Empty, Signal::Attributes(uid)) => (JoinState::HasAttributes(uid), None),
            (JoinState::Empty, Signal::Content(content)) => (JoinState::HasContent(content), None),
            (JoinState::HasAttributes(uid), Signal::Content(content))
            | (JoinState::HasContent(content), Signal::Attributes(uid)) => {
                (JoinState::Done, Some(Joined { uid, content }))
            }
            (state, signal) => {
                warn!(?signal, "Ignoring repeated message signal");
                (state, None)
            }
        };
        self.state = next;
        joined
    }
}

/// Countdown over the messages of one batch.
#[derive(Debug, Default)]
struct Batch {
    joins: HashMap<Token, PendingJoin>,
    next_token: Token,
    pending: usize,
    source_exhausted: bool,
    total: usize,
}

impl Batch {
    fn open(&mut self) -> Token {
        let token = self.next_token;
        self.next_token += 1;
        self.joins.insert(token, PendingJoin::default());
        self.pending += 1;
        self.total += 1;
        token
    }

    /// Feed a signal to its join. A completed join is removed and counted
    /// down before it is returned, whatever becomes of its content.
    fn deliver(&mut self, token: Token, signal: Signal) -> Option<Joined> {
        let join = self.joins.get_mut(&token)?;
        let joined = join.deliver(signal)?;
        self.joins.remove(&token);
        self.pending -= 1;
        Some(joined)
    }

    const fn exhaust(&mut self) {
        self.source_exhausted = true;
    }

    const fn is_complete(&self) -> bool {
        self.source_exhausted && self.pending == 0
    }
}

type SignalFuture = BoxFuture<'static, (Token, Result<Signal>)>;

async fn drain(content: ContentStream) -> Result<Vec<u8>> {
    content
        .try_fold(Vec::new(), |mut buffer, chunk| async move {
            buffer.extend_from_slice(&chunk);
            Ok(buffer)
        })
        .await
}

fn watch(token: Token, message: FetchedMessage) -> [SignalFuture; 2] {
    let FetchedMessage {
        attributes,
        content,
        ..
    } = message;
    [
        attributes
            .map(move |attrs| (token, attrs.map(|a| Signal::Attributes(a.uid))))
            .boxed(),
        drain(content)
            .map(move |content| (token, content.map(Signal::Content)))
            .boxed(),
    ]
}

/// Drive one batch fetch to completion, pushing one outcome per message
/// into `sink`.
///
/// The sink is closed exactly once, after the source has ended and every
/// announced message has produced a descriptor or a
/// [`Error::MessageParse`]. A failure of the source, or of any message's
/// signals, is pushed as the terminal error and abandons the messages
/// still in flight. Raising `cancel` stops the batch: pending joins are
/// released, the rest of the source is read and discarded, and the sink
/// is closed without an error. Dropping the consumer abandons the batch
/// where it stands.
///
/// Completed signals are always handled before the next message is
/// taken from the source, so descriptors leave as soon as they are
/// joined.
pub async fn aggregate<S>(
    mut source: S,
    sink: ResultSink<MessageDescriptor>,
    cancel: CancellationToken,
) where
    S: Stream<Item = Result<FetchedMessage>> + Unpin,
{
    let mut batch = Batch::default();
    let mut signals: FuturesUnordered<SignalFuture> = FuturesUnordered::new();

    loop {
        if batch.is_complete() {
            info!(messages = batch.total, "Batch complete");
            sink.close();
            return;
        }

        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!(pending = batch.pending, "Batch cancelled");
                drop(signals);
                if !batch.source_exhausted {
                    // The session stays usable only once the fetch is read to its end.
                    let discarded = source.count().await;
                    debug!(discarded, "Discarded rest of cancelled batch");
                }
                sink.close();
                return;
            }

            Some((token, signal)) = signals.next() => {
                let signal = match signal {
                    Ok(signal) => signal,
                    Err(e) => {
                        warn!(%e, token, "Message signal failed");
                        sink.error(e);
                        return;
                    }
                };
                let Some(joined) = batch.deliver(token, signal) else {
                    continue;
                };
                let delivered = match MessageDescriptor::parse(joined.uid, &joined.content) {
                    Ok(message) => sink.push(message),
                    Err(e) => {
                        warn!(%e, "Skipping unparsable message");
                        sink.push_error(e)
                    }
                };
                if !delivered {
                    debug!(pending = batch.pending, "Consumer gone, abandoning batch");
                    return;
                }
            }

            next = source.next(), if !batch.source_exhausted => match next {
                Some(Ok(message)) => {
                    let token = batch.open();
                    debug!(token, seqno = message.seqno, "Message announced");
                    signals.extend(watch(token, message));
                }
                Some(Err(e)) => {
                    warn!(%e, pending = batch.pending, "Batch fetch failed");
                    sink.error(e);
                    return;
                }
                None => {
                    debug!(pending = batch.pending, "Batch source exhausted");
                    batch.exhaust();
                }
            },
        }
    }
}
