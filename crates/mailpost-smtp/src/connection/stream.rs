//! Transport streams and TLS.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};

use crate::error::{Error, Result};

/// TLS settings for one server: the name to verify and the client config.
#[derive(Debug, Clone)]
pub struct TlsParameters {
    server_name: ServerName<'static>,
    config: Arc<ClientConfig>,
}

impl TlsParameters {
    /// Verifies `domain` against the bundled web PKI roots.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDnsName`] if `domain` is not a valid server name.
    pub fn new(domain: &str) -> Result<Self> {
        Self::with_config(domain, default_tls_config())
    }

    /// Uses a caller-provided client config (custom roots, client certs).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDnsName`] if `domain` is not a valid server name.
    pub fn with_config(domain: &str, config: Arc<ClientConfig>) -> Result<Self> {
        let server_name = ServerName::try_from(domain.to_string())
            .map_err(|_| Error::InvalidDnsName(domain.to_string()))?;
        Ok(Self { server_name, config })
    }

    /// Server name used for certificate verification.
    #[must_use]
    pub const fn server_name(&self) -> &ServerName<'static> {
        &self.server_name
    }

    async fn handshake(&self, tcp: TcpStream) -> Result<TlsStream<TcpStream>> {
        TlsConnector::from(Arc::clone(&self.config))
            .connect(self.server_name.clone(), tcp)
            .await
            .map_err(Error::from_handshake)
    }
}

/// Builds a client config trusting the web PKI roots.
fn default_tls_config() -> Arc<ClientConfig> {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Arc::new(config)
}

/// In-place TLS upgrade of a transport, used by `STARTTLS`.
pub trait StartTls: Sized {
    /// Performs the TLS handshake over this transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the handshake fails or the transport cannot be upgraded.
    fn start_tls(self, tls: &TlsParameters) -> impl Future<Output = Result<Self>>;
}

/// SMTP transport (TCP or TLS).
#[derive(Debug)]
pub enum SmtpStream {
    /// Plain TCP connection.
    Tcp(TcpStream),
    /// TLS-encrypted connection.
    Tls(Box<TlsStream<TcpStream>>),
}

impl SmtpStream {
    /// Opens a plain TCP connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or takes longer than `timeout`.
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let tcp = tcp_connect(host, port, timeout).await?;
        tracing::info!(host, port, "connected");
        Ok(Self::Tcp(tcp))
    }

    /// Opens a TLS connection (implicit TLS, usually port 465).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or handshake fails, or together take
    /// longer than `timeout`.
    pub async fn connect_tls(
        host: &str,
        port: u16,
        tls: &TlsParameters,
        timeout: Duration,
    ) -> Result<Self> {
        let stream = tokio::time::timeout(timeout, async {
            let tcp = TcpStream::connect((host, port)).await?;
            tls.handshake(tcp).await
        })
        .await
        .map_err(|_| Error::Timeout(timeout))??;

        tracing::info!(host, port, "connected with TLS");
        Ok(Self::Tls(Box::new(stream)))
    }

    /// Returns true if the connection is encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

async fn tcp_connect(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    tokio::time::timeout(timeout, TcpStream::connect((host, port)))
        .await
        .map_err(|_| Error::Timeout(timeout))?
        .map_err(Error::from)
}

impl StartTls for SmtpStream {
    async fn start_tls(self, tls: &TlsParameters) -> Result<Self> {
        match self {
            Self::Tcp(tcp) => {
                let stream = tls.handshake(tcp).await?;
                tracing::info!("TLS upgraded");
                Ok(Self::Tls(Box::new(stream)))
            }
            Self::Tls(_) => Err(Error::Tls(rustls::Error::General(
                "connection already uses TLS".into(),
            ))),
        }
    }
}

impl AsyncRead for SmtpStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for SmtpStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_tls_parameters() {
        let tls = TlsParameters::new("smtp.example.com").unwrap();
        assert_eq!(tls.server_name().to_str(), "smtp.example.com");
    }

    #[test]
    fn test_invalid_dns_name() {
        assert!(matches!(
            TlsParameters::new("not a host name"),
            Err(Error::InvalidDnsName(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_plain_local_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let stream = SmtpStream::connect("127.0.0.1", port, Duration::from_secs(5)).await.unwrap();
        assert!(!stream.is_tls());
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = SmtpStream::connect("127.0.0.1", port, Duration::from_secs(5)).await.unwrap_err();
        assert!(err.is_transport());
    }
}
