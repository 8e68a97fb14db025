//! Connection strategies: TCP, STARTTLS and implicit TLS.
//!
//! A connector returns a client that has read the greeting and completed the
//! `EHLO` handshake (including the TLS upgrade, where applicable).

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::connection::{ClientOptions, SmtpClient, SmtpStream, TlsParameters};
use crate::error::Result;

/// Default bound on establishing a connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Opens a connected, handshaken SMTP session.
pub trait Connector {
    /// Transport of the sessions this connector opens.
    type Stream: AsyncRead + AsyncWrite + Unpin;

    /// Connects and greets the server as `client_domain`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection, greeting, TLS upgrade or `EHLO`
    /// fails. Once the greeting has been read, a failed handshake still ends
    /// with `QUIT`.
    fn connect(
        &self,
        client_domain: &str,
    ) -> impl Future<Output = Result<SmtpClient<Self::Stream>>>;
}

/// Plain TCP, no encryption.
#[derive(Debug, Clone)]
pub struct PlainConnector {
    host: String,
    port: u16,
    connect_timeout: Duration,
    options: ClientOptions,
}

impl PlainConnector {
    /// Creates a connector for `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            options: ClientOptions::default(),
        }
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the protocol options of opened sessions.
    #[must_use]
    pub const fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }
}

impl Connector for PlainConnector {
    type Stream = SmtpStream;

    async fn connect(&self, client_domain: &str) -> Result<SmtpClient<SmtpStream>> {
        let stream = SmtpStream::connect(&self.host, self.port, self.connect_timeout).await?;
        let client = SmtpClient::new(stream, self.options).await?;

        handshake(client, async |c| c.send_ehlo(client_domain).await).await
    }
}

/// Plain TCP upgraded with `STARTTLS` (usually port 587).
#[derive(Debug, Clone)]
pub struct StartTlsConnector {
    host: String,
    port: u16,
    tls: TlsParameters,
    connect_timeout: Duration,
    options: ClientOptions,
}

impl StartTlsConnector {
    /// Creates a connector for `host:port`, verifying the certificate with `tls`.
    pub fn new(host: impl Into<String>, port: u16, tls: TlsParameters) -> Self {
        Self {
            host: host.into(),
            port,
            tls,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            options: ClientOptions::default(),
        }
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the protocol options of opened sessions.
    #[must_use]
    pub const fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }
}

impl Connector for StartTlsConnector {
    type Stream = SmtpStream;

    async fn connect(&self, client_domain: &str) -> Result<SmtpClient<SmtpStream>> {
        let stream = SmtpStream::connect(&self.host, self.port, self.connect_timeout).await?;
        let client = SmtpClient::new(stream, self.options).await?;

        handshake(client, async |c| {
            c.send_ehlo(client_domain).await?;
            c.send_starttls(&self.tls).await?;
            c.send_ehlo(client_domain).await
        })
        .await
    }
}

/// TLS from the first byte (usually port 465).
#[derive(Debug, Clone)]
pub struct ImplicitTlsConnector {
    host: String,
    port: u16,
    tls: TlsParameters,
    connect_timeout: Duration,
    options: ClientOptions,
}

impl ImplicitTlsConnector {
    /// Creates a connector for `host:port`, verifying the certificate with `tls`.
    pub fn new(host: impl Into<String>, port: u16, tls: TlsParameters) -> Self {
        Self {
            host: host.into(),
            port,
            tls,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            options: ClientOptions::default(),
        }
    }

    /// Sets the bound on connecting and the TLS handshake together.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the protocol options of opened sessions.
    #[must_use]
    pub const fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }
}

impl Connector for ImplicitTlsConnector {
    type Stream = SmtpStream;

    async fn connect(&self, client_domain: &str) -> Result<SmtpClient<SmtpStream>> {
        let stream =
            SmtpStream::connect_tls(&self.host, self.port, &self.tls, self.connect_timeout).await?;
        let client = SmtpClient::new(stream, self.options).await?;

        handshake(client, async |c| c.send_ehlo(client_domain).await).await
    }
}

/// Runs the post-greeting handshake; on failure, says `QUIT` before
/// returning the handshake error.
pub async fn handshake<S, F>(mut client: SmtpClient<S>, steps: F) -> Result<SmtpClient<S>>
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: AsyncFnOnce(&mut SmtpClient<S>) -> Result<()>,
{
    match steps(&mut client).await {
        Ok(()) => Ok(client),
        Err(e) => {
            if let Err(quit_err) = client.quit().await {
                tracing::warn!(error = %quit_err, "QUIT failed after handshake error");
            }
            Err(e)
        }
    }
}
