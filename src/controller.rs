//! Connection lifecycle
//!
//! [`ConnectionController`] owns the session and the only
//! [`ConnectionState`]. Every operation goes through its gate, so nothing
//! reaches the session unless it is connected.

use crate::error::{Error, Result};
use crate::session::{BoxInfo, Session};
use std::fmt;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
        })
    }
}

/// An in-flight state change. Dropping it before [`finish`](Self::finish)
/// leaves the `abandoned` state behind.
struct Transition<'a> {
    state: &'a mut ConnectionState,
    abandoned: ConnectionState,
    finished: bool,
}

impl<'a> Transition<'a> {
    fn begin(
        state: &'a mut ConnectionState,
        through: ConnectionState,
        abandoned: ConnectionState,
    ) -> Self {
        *state = through;
        Self {
            state,
            abandoned,
            finished: false,
        }
    }

    fn finish(mut self, next: ConnectionState) {
        *self.state = next;
        self.finished = true;
    }
}

impl Drop for Transition<'_> {
    fn drop(&mut self) {
        if !self.finished {
            debug!(state = %self.abandoned, "Connection change abandoned");
            *self.state = self.abandoned;
        }
    }
}

/// Owns a [`Session`] and its lifecycle state.
pub struct ConnectionController<S> {
    session: S,
    state: ConnectionState,
    faults: Option<mpsc::UnboundedSender<Error>>,
}

impl<S: Session> ConnectionController<S> {
    #[must_use]
    pub const fn new(session: S) -> Self {
        Self {
            session,
            state: ConnectionState::Disconnected,
            faults: None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Receive session faults raised outside of connect and disconnect.
    ///
    /// Faults are always logged; a new subscription replaces the previous
    /// one.
    pub fn subscribe_faults(&mut self) -> mpsc::UnboundedReceiver<Error> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.faults = Some(tx);
        rx
    }

    /// Connect the session and wait until it is ready.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless disconnected, and
    /// [`Error::Connection`] if the session fails before it is ready, in
    /// which case the controller is disconnected again.
    pub async fn connect(&mut self) -> Result<()> {
        self.collect_faults();
        if self.state != ConnectionState::Disconnected {
            return Err(self.invalid("connect"));
        }

        let transition = Transition::begin(
            &mut self.state,
            ConnectionState::Connecting,
            ConnectionState::Disconnected,
        );
        match self.session.connect().await {
            Ok(()) => {
                transition.finish(ConnectionState::Connected);
                info!("Session ready");
                Ok(())
            }
            Err(e) => {
                transition.finish(ConnectionState::Disconnected);
                Err(connection_error(e))
            }
        }
    }

    /// End the session and wait until it has ended.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless connected, and
    /// [`Error::Connection`] if ending fails. The session is unusable
    /// either way, so the controller ends up disconnected. The same holds
    /// when the returned future is dropped before the session has ended.
    pub async fn disconnect(&mut self) -> Result<()> {
        self.collect_faults();
        if self.state != ConnectionState::Connected {
            return Err(self.invalid("disconnect"));
        }

        let transition = Transition::begin(
            &mut self.state,
            ConnectionState::Disconnecting,
            ConnectionState::Disconnected,
        );
        let ended = self.session.end().await;
        transition.finish(ConnectionState::Disconnected);
        match ended {
            Ok(()) => {
                info!("Session ended");
                Ok(())
            }
            Err(e) => Err(connection_error(e)),
        }
    }

    /// The session, if it may be used for `operation`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless connected.
    pub fn session(&mut self, operation: &'static str) -> Result<&mut S> {
        self.collect_faults();
        if self.state != ConnectionState::Connected {
            return Err(self.invalid(operation));
        }
        Ok(&mut self.session)
    }

    /// Open `path` for `operation`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless connected, and
    /// [`Error::BoxOpen`] if the mailbox cannot be opened.
    pub async fn open_box(
        &mut self,
        operation: &'static str,
        path: &str,
        read_only: bool,
    ) -> Result<BoxInfo> {
        let session = self.session(operation)?;
        let info = session
            .open_box(path, read_only)
            .await
            .map_err(|e| match e {
                Error::BoxOpen { .. } => e,
                other => Error::BoxOpen {
                    path: path.to_string(),
                    reason: other.to_string(),
                },
            })?;
        debug!(mailbox = %info.name, exists = info.exists, read_only, "Mailbox open");
        Ok(info)
    }

    fn collect_faults(&mut self) {
        for fault in self.session.take_faults() {
            error!(%fault, state = %self.state, "Session fault");
            if let Some(tx) = &self.faults {
                if tx.send(fault).is_err() {
                    self.faults = None;
                }
            }
        }
    }

    fn invalid(&self, operation: &'static str) -> Error {
        Error::InvalidState {
            operation,
            state: self.state,
        }
    }
}

fn connection_error(e: Error) -> Error {
    match e {
        Error::Connection(_) => e,
        other => Error::Connection(other.to_string()),
    }
}
