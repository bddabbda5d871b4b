//! Fake IMAP server for integration testing
//!
//! This module provides an in-process IMAP server that speaks enough
//! of the protocol to test `Fetcher` end-to-end:
//!
//! TCP -> [TLS] -> greeting -> [STARTTLS -> TLS] -> LOGIN -> commands -> LOGOUT
//!
//! ## Module layout
//!
//! - `server` -- TCP listener, TLS setup, and connection dispatch
//! - `handlers/` -- one file per IMAP command (LSUB, EXAMINE, etc.)
//! - `mailbox` -- test data model (folders, emails, credentials, builder)
//! - `io` -- shared write helpers

mod io;

pub use mailbox::MailboxBuilder;
pub use server::FakeImapServer;
