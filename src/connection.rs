//! IMAP transport
//!
//! [`ImapTransport`] is the [`Session`] implementation over `async-imap`.
//! It speaks implicit TLS or STARTTLS depending on the configuration and
//! maps `async-imap` fetch results onto [`FetchedMessage`] notifications.

use crate::config::{FetcherConfig, TlsOptions};
use crate::error::{Error, Result};
use crate::hierarchy::{BoxEntry, nest_flat_names};
use crate::session::{
    BoxInfo, FetchOptions, FetchedMessage, MessageAttributes, MessageStream, Session,
};
use async_imap::imap_proto::{Response, Status};
use async_imap::types::{Fetch, Flag, UnsolicitedResponse};
use futures::{StreamExt, TryStreamExt, stream};
use rustls::pki_types::ServerName;
use std::sync::Arc;
use std::task::Poll;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};
use tracing::{debug, info, trace, warn};

/// A TLS-wrapped IMAP session.
pub type ImapSession = async_imap::Session<Compat<tokio_rustls::client::TlsStream<TcpStream>>>;

/// [`Session`] over a real IMAP server.
pub struct ImapTransport {
    config: FetcherConfig,
    session: Option<ImapSession>,
    /// A fetch stream was handed out and has not been read to its end.
    fetch_open: bool,
}

impl ImapTransport {
    #[must_use]
    pub const fn new(config: FetcherConfig) -> Self {
        Self {
            config,
            session: None,
            fetch_open: false,
        }
    }

    fn session_mut(&mut self) -> Result<&mut ImapSession> {
        self.session.as_mut().ok_or_else(not_connected)
    }

    /// Read past the rest of an abandoned fetch.
    ///
    /// Its remaining responses and its tagged completion are still on the
    /// wire. A NOOP reads up to its own completion, passing the leftovers
    /// to the unsolicited channel.
    async fn settle(&mut self) -> Result<()> {
        if !self.fetch_open {
            return Ok(());
        }
        debug!("Reading past an abandoned fetch");
        self.session_mut()?
            .noop()
            .await
            .map_err(|e| Error::Connection(format!("Cannot resynchronize session: {e}")))?;
        self.fetch_open = false;
        Ok(())
    }
}

fn not_connected() -> Error {
    Error::Connection("not connected".into())
}

impl std::fmt::Debug for ImapTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapTransport")
            .field("host", &self.config.host)
            .field("port", &self.config.port())
            .field("open", &self.session.is_some())
            .finish_non_exhaustive()
    }
}

impl Session for ImapTransport {
    async fn connect(&mut self) -> Result<()> {
        self.session = Some(open(&self.config).await?);
        self.fetch_open = false;
        Ok(())
    }

    async fn end(&mut self) -> Result<()> {
        if let Err(e) = self.settle().await {
            warn!(%e, "Logging out of an unsettled session");
        }
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };
        session
            .logout()
            .await
            .map_err(|e| Error::Connection(format!("Logout failed: {e}")))
    }

    async fn open_box(&mut self, path: &str, read_only: bool) -> Result<BoxInfo> {
        self.settle().await?;
        let session = self.session_mut()?;
        let opened = if read_only {
            session.examine(path).await
        } else {
            session.select(path).await
        };
        let mailbox = opened.map_err(|e| Error::BoxOpen {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        Ok(BoxInfo {
            name: path.to_string(),
            read_only,
            exists: mailbox.exists,
            uid_validity: mailbox.uid_validity,
        })
    }

    async fn fetch(&mut self, selector: &str, options: FetchOptions) -> Result<MessageStream<'_>> {
        self.settle().await?;
        let query = options.to_query();
        debug!(selector, %query, "UID FETCH");

        let Self {
            session,
            fetch_open,
            ..
        } = self;
        let fetches = session
            .as_mut()
            .ok_or_else(not_connected)?
            .uid_fetch(selector.to_string(), query)
            .await
            .map_err(|e| Error::FetchProtocol(e.to_string()))?;
        *fetch_open = true;

        let notifications = fetches.map(|item| {
            item.map_err(|e| Error::FetchProtocol(e.to_string()))
                .and_then(|fetch| notification(&fetch))
        });
        let finished = stream::poll_fn(move |_| {
            *fetch_open = false;
            Poll::Ready(None)
        });
        Ok(notifications.chain(finished).boxed())
    }

    async fn list_subscribed(&mut self) -> Result<Vec<BoxEntry>> {
        self.settle().await?;
        let session = self.session_mut()?;
        let names: Vec<_> = session
            .lsub(Some(""), Some("*"))
            .await
            .map_err(|e| Error::FetchProtocol(format!("LSUB failed: {e}")))?
            .try_collect()
            .await
            .map_err(|e| Error::FetchProtocol(format!("LSUB failed: {e}")))?;

        debug!(count = names.len(), "Subscribed mailboxes");
        Ok(nest_flat_names(names.iter().map(|name| {
            (
                name.name().to_string(),
                name.delimiter().map(str::to_string),
            )
        })))
    }

    /// Untagged BYE and BAD responses received since the last call.
    fn take_faults(&mut self) -> Vec<Error> {
        let Some(session) = self.session.as_ref() else {
            return Vec::new();
        };
        let mut faults = Vec::new();
        while let Ok(response) = session.unsolicited_responses.try_recv() {
            let UnsolicitedResponse::Other(ref data) = response else {
                trace!(?response, "Unsolicited response");
                continue;
            };
            match data.parsed() {
                Response::Data {
                    status: Status::Bye,
                    information,
                    ..
                } => faults.push(server_fault("BYE", information.as_deref())),
                Response::Data {
                    status: Status::Bad,
                    information,
                    ..
                } => faults.push(server_fault("BAD", information.as_deref())),
                _ => trace!(?response, "Unsolicited response"),
            }
        }
        faults
    }
}

fn server_fault(status: &str, information: Option<&str>) -> Error {
    Error::Connection(format!(
        "server sent {status}: {}",
        information.unwrap_or_default()
    ))
}

/// Turn one FETCH response into a notification with both signals ready.
fn notification(fetch: &Fetch) -> Result<FetchedMessage> {
    let uid = fetch.uid.ok_or_else(|| {
        Error::FetchProtocol(format!("message {} fetched without UID", fetch.message))
    })?;
    let content = fetch.header().or_else(|| fetch.body()).unwrap_or_else(|| {
        warn!(uid, "Fetch response without body section");
        &[][..]
    });
    let attributes = MessageAttributes {
        uid,
        flags: fetch.flags().map(|flag| flag_name(&flag)).collect(),
    };
    Ok(FetchedMessage::ready(
        fetch.message,
        attributes,
        content.to_vec(),
    ))
}

/// Wire form of a flag: system flags carry a leading backslash.
fn flag_name(flag: &Flag<'_>) -> String {
    match flag {
        Flag::Custom(name) => name.to_string(),
        system => format!("\\{system:?}"),
    }
}

/// Open a fresh TLS-wrapped, logged-in IMAP session.
///
/// With `tls` set, the handshake starts right after the TCP connect.
/// Otherwise the plain connection is upgraded with STARTTLS first.
async fn open(config: &FetcherConfig) -> Result<ImapSession> {
    let addr = format!("{}:{}", config.host, config.port());
    debug!(%addr, implicit_tls = config.tls, "Connecting to IMAP server");

    let mut tcp_stream = TcpStream::connect(&addr).await?;
    if !config.tls {
        tcp_stream = starttls(tcp_stream).await?;
    }

    let connector = tls_connector(&config.tls_options)?;
    let server_name = ServerName::try_from(config.host.clone())
        .map_err(|e| Error::Tls(format!("Invalid server name: {e}")))?;
    let tls_stream = connector
        .connect(server_name, tcp_stream)
        .await
        .map_err(|e| Error::Tls(e.to_string()))?;

    let session = async_imap::Client::new(tls_stream.compat())
        .login(&config.user, &config.password)
        .await
        .map_err(|(e, _)| Error::Connection(format!("Login failed: {e}")))?;

    info!(%addr, user = %config.user, "Connected to IMAP server");
    Ok(session)
}

async fn starttls(tcp_stream: TcpStream) -> Result<TcpStream> {
    let mut client = async_imap::Client::new(tcp_stream.compat());
    client
        .run_command_and_check_ok("STARTTLS", None)
        .await
        .map_err(|e| Error::Tls(format!("STARTTLS failed: {e}")))?;
    Ok(client.into_inner().into_inner())
}

/// Build a TLS connector. Certificates are checked against the web PKI
/// roots unless `reject_unauthorized` is off, in which case anything is
/// accepted.
fn tls_connector(options: &TlsOptions) -> Result<TlsConnector> {
    let builder = rustls::ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| Error::Tls(e.to_string()))?;

    let config = if options.reject_unauthorized {
        let mut roots = rustls::RootCertStore::empty();
        roots.roots = webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();
        builder.with_root_certificates(roots).with_no_client_auth()
    } else {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(DangerousVerifier))
            .with_no_client_auth()
    };
    Ok(TlsConnector::from(Arc::new(config)))
}

/// Certificate verifier that accepts all certificates.
#[derive(Debug)]
struct DangerousVerifier;

impl rustls::client::danger::ServerCertVerifier for DangerousVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
