//! SMTP service for sending emails.

use mailpost_mime::Message;
use mailpost_smtp::auth::{
    Authenticator, LoginAuthenticator, NoAuthenticator, OAuth2Authenticator,
    OAuthBearerAuthenticator, PlainAuthenticator,
};
use mailpost_smtp::connector::{
    Connector, ImplicitTlsConnector, PlainConnector, StartTlsConnector,
};
use mailpost_smtp::{ClientOptions, SmtpClient, SmtpStream, TlsParameters};
use tokio::io::{AsyncRead, AsyncWrite};

use super::MailService;
use crate::config::{ConfigError, Credentials, Security, SmtpConfig};
use crate::envelope::Envelope;
use crate::error::Result;

/// Delivers each message over a fresh SMTP connection.
///
/// One send is: connect and handshake, authenticate, transmit, `QUIT`. The
/// connection always ends with `QUIT`, also when a step fails.
#[derive(Debug, Clone)]
pub struct SmtpMailService<C, A> {
    connector: C,
    authenticator: A,
    client_domain: String,
}

impl<C: Connector, A: Authenticator> SmtpMailService<C, A> {
    /// Creates a service; `client_domain` is announced in `EHLO`.
    pub fn new(connector: C, authenticator: A, client_domain: impl Into<String>) -> Self {
        Self {
            connector,
            authenticator,
            client_domain: client_domain.into(),
        }
    }

    /// Domain announced in `EHLO`.
    #[must_use]
    pub fn client_domain(&self) -> &str {
        &self.client_domain
    }

    /// The connection strategy.
    #[must_use]
    pub const fn connector(&self) -> &C {
        &self.connector
    }

    /// The authentication strategy.
    #[must_use]
    pub const fn authenticator(&self) -> &A {
        &self.authenticator
    }
}

impl SmtpMailService<ConfiguredConnector, ConfiguredAuthenticator> {
    /// Builds a service from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the configuration is
    /// incomplete or the host is not a valid TLS server name.
    pub fn from_config(config: &SmtpConfig) -> Result<Self> {
        config.validate()?;

        let connector = ConfiguredConnector::from_config(config)?;
        let authenticator = ConfiguredAuthenticator::from_config(config);

        tracing::debug!(
            host = %config.host,
            port = config.port(),
            security = config.security.display_name(),
            "SMTP service configured"
        );
        Ok(Self::new(connector, authenticator, config.client_domain.clone()))
    }
}

impl<C: Connector, A: Authenticator> MailService for SmtpMailService<C, A> {
    async fn send(&self, message: &Message) -> Result<()> {
        let envelope = Envelope::from_message(message)?;
        let mut client = self.connector.connect(&self.client_domain).await?;

        client
            .session(async |c| {
                self.authenticator.authenticate(c).await?;
                c.send_mail(envelope.sender(), envelope.recipients(), message).await
            })
            .await?;
        Ok(())
    }
}

/// Connection strategy chosen by [`Security`].
#[derive(Debug, Clone)]
pub enum ConfiguredConnector {
    /// Plain TCP.
    Plain(PlainConnector),
    /// TCP upgraded with `STARTTLS`.
    StartTls(StartTlsConnector),
    /// Implicit TLS.
    Tls(ImplicitTlsConnector),
}

impl ConfiguredConnector {
    /// Builds the connector for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidServerName`] if TLS is used and the host
    /// is not a valid server name.
    pub fn from_config(config: &SmtpConfig) -> std::result::Result<Self, ConfigError> {
        let options = ClientOptions::new()
            .io_timeout(config.io_timeout())
            .strict_replies(config.strict_replies);
        let host = config.host.clone();
        let port = config.port();

        let tls = || {
            TlsParameters::new(&config.host)
                .map_err(|_| ConfigError::InvalidServerName(config.host.clone()))
        };

        Ok(match config.security {
            Security::None => Self::Plain(
                PlainConnector::new(host, port)
                    .connect_timeout(config.connect_timeout())
                    .options(options),
            ),
            Security::StartTls => Self::StartTls(
                StartTlsConnector::new(host, port, tls()?)
                    .connect_timeout(config.connect_timeout())
                    .options(options),
            ),
            Security::Tls => Self::Tls(
                ImplicitTlsConnector::new(host, port, tls()?)
                    .connect_timeout(config.connect_timeout())
                    .options(options),
            ),
        })
    }
}

impl Connector for ConfiguredConnector {
    type Stream = SmtpStream;

    async fn connect(&self, client_domain: &str) -> mailpost_smtp::Result<SmtpClient<SmtpStream>> {
        match self {
            Self::Plain(connector) => connector.connect(client_domain).await,
            Self::StartTls(connector) => connector.connect(client_domain).await,
            Self::Tls(connector) => connector.connect(client_domain).await,
        }
    }
}

/// Authentication strategy chosen by [`Credentials`].
#[derive(Debug, Clone)]
pub enum ConfiguredAuthenticator {
    /// No authentication.
    None(NoAuthenticator),
    /// `AUTH LOGIN`.
    Login(LoginAuthenticator),
    /// `AUTH PLAIN`.
    Plain(PlainAuthenticator),
    /// `AUTH XOAUTH2`.
    XOAuth2(OAuth2Authenticator),
    /// `AUTH OAUTHBEARER`.
    OAuthBearer(OAuthBearerAuthenticator),
}

impl ConfiguredAuthenticator {
    /// Builds the authenticator for `config`.
    #[must_use]
    pub fn from_config(config: &SmtpConfig) -> Self {
        match &config.credentials {
            Credentials::None => Self::None(NoAuthenticator),
            Credentials::Login { username, password } => {
                Self::Login(LoginAuthenticator::new(username, password))
            }
            Credentials::Plain { username, password } => {
                Self::Plain(PlainAuthenticator::new(username, password))
            }
            Credentials::XOAuth2 { user, token } => {
                Self::XOAuth2(OAuth2Authenticator::new(user, token))
            }
            Credentials::OAuthBearer { user, token } => Self::OAuthBearer(
                OAuthBearerAuthenticator::new(user, config.host.clone(), config.port(), token),
            ),
        }
    }
}

impl Authenticator for ConfiguredAuthenticator {
    async fn authenticate<S>(&self, client: &mut SmtpClient<S>) -> mailpost_smtp::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match self {
            Self::None(auth) => auth.authenticate(client).await,
            Self::Login(auth) => auth.authenticate(client).await,
            Self::Plain(auth) => auth.authenticate(client).await,
            Self::XOAuth2(auth) => auth.authenticate(client).await,
            Self::OAuthBearer(auth) => auth.authenticate(client).await,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::Error;
    use mailpost_mime::Address;
    use mailpost_smtp::ReplyCode;
    use mailpost_smtp::connector::handshake;
    use std::sync::Mutex;
    use tokio_test::io::{Builder, Mock};

    /// Hands out one scripted session.
    struct ScriptedConnector(Mutex<Option<Mock>>);

    impl ScriptedConnector {
        fn new(mock: Mock) -> Self {
            Self(Mutex::new(Some(mock)))
        }
    }

    impl Connector for ScriptedConnector {
        type Stream = Mock;

        async fn connect(&self, client_domain: &str) -> mailpost_smtp::Result<SmtpClient<Mock>> {
            let mock = self.0.lock().unwrap().take().unwrap();
            let client = SmtpClient::new(mock, ClientOptions::default()).await?;
            handshake(client, async |c| c.send_ehlo(client_domain).await).await
        }
    }

    fn message() -> Message {
        let mut message = Message::new(
            Address::new("to@example.com").unwrap(),
            Address::new("from@example.com").unwrap(),
            "Hi",
        )
        .unwrap();
        message.add_bcc(Address::new("audit@example.com").unwrap());
        message
    }

    #[tokio::test]
    async fn test_send_flow() {
        let mut message = message();
        message.set_date_rfc2822("Thu, 01 Jan 2026 10:00:00 +0000").unwrap();
        message.set_text(Some("Hello".to_string()));
        let rendered = mailpost_mime::render_message(&message).await.unwrap();

        let mock = Builder::new()
            .read(b"220 mx\r\n")
            .write(b"EHLO client.local\r\n")
            .read(b"250 mx\r\n")
            .write(b"AUTH PLAIN AHVzZXIAcGFzcw==\r\n")
            .read(b"235 ok\r\n")
            .write(b"MAIL FROM:<from@example.com>\r\n")
            .read(b"250 ok\r\n")
            .write(b"RCPT TO:<to@example.com>\r\n")
            .read(b"250 ok\r\n")
            .write(b"RCPT TO:<audit@example.com>\r\n")
            .read(b"250 ok\r\n")
            .write(b"DATA\r\n")
            .read(b"354 go\r\n")
            .write(&rendered)
            .write(b"\r\n.\r\n")
            .read(b"250 queued\r\n")
            .write(b"QUIT\r\n")
            .read(b"221 bye\r\n")
            .build();
        let service = SmtpMailService::new(
            ScriptedConnector::new(mock),
            PlainAuthenticator::new("user", "pass"),
            "client.local",
        );

        service.send(&message).await.unwrap();
        // Bcc goes to the envelope only
        assert!(!String::from_utf8(rendered).unwrap().contains("audit@example.com"));
    }

    #[tokio::test]
    async fn test_rejected_auth_still_quits() {
        let mock = Builder::new()
            .read(b"220 mx\r\n")
            .write(b"EHLO client.local\r\n")
            .read(b"250 mx\r\n")
            .write(b"AUTH PLAIN AHVzZXIAcGFzcw==\r\n")
            .read(b"535 nope\r\n")
            .write(b"QUIT\r\n")
            .read(b"221 bye\r\n")
            .build();
        let service = SmtpMailService::new(
            ScriptedConnector::new(mock),
            PlainAuthenticator::new("user", "pass"),
            "client.local",
        );

        let err = service.send(&message()).await.unwrap_err();
        match err {
            Error::Smtp(smtp) => assert_eq!(smtp.reply_code(), Some(ReplyCode::AUTH_FAILED)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_from_config_selects_strategies() {
        let config = SmtpConfig::builder("smtp.example.com")
            .security(Security::Tls)
            .credentials(Credentials::OAuthBearer {
                user: "me@example.com".into(),
                token: "tok".into(),
            })
            .client_domain("client.example.com")
            .build()
            .unwrap();

        let service = SmtpMailService::from_config(&config).unwrap();
        assert!(matches!(service.connector(), ConfiguredConnector::Tls(_)));
        assert!(matches!(service.authenticator(), ConfiguredAuthenticator::OAuthBearer(_)));
        assert_eq!(service.client_domain(), "client.example.com");

        let plain = SmtpConfig::builder("localhost").security(Security::None).build().unwrap();
        let service = SmtpMailService::from_config(&plain).unwrap();
        assert!(matches!(service.connector(), ConfiguredConnector::Plain(_)));
        assert!(matches!(service.authenticator(), ConfiguredAuthenticator::None(_)));
    }

    #[test]
    fn test_from_config_rejects_invalid() {
        let mut config = SmtpConfig::builder("smtp.example.com").build().unwrap();
        config.host = String::new();
        assert!(matches!(
            SmtpMailService::from_config(&config),
            Err(Error::Config(ConfigError::EmptyHost))
        ));

        config.host = "not a host".into();
        assert!(matches!(
            SmtpMailService::from_config(&config),
            Err(Error::Config(ConfigError::InvalidServerName(_)))
        ));
    }
}
