//! SASL authentication strategies.
//!
//! Each authenticator drives the `AUTH` exchange on a connected client and
//! marks the client authenticated once the server answers `235`.

use std::borrow::Cow;
use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::command::Command;
use crate::connection::SmtpClient;
use crate::error::Result;
use crate::types::{AuthMechanism, ReplyCode};

/// Authenticates an SMTP session.
pub trait Authenticator {
    /// Runs the authentication exchange.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`](crate::Error::Protocol) if the server
    /// rejects the credentials, or a transport error.
    fn authenticate<S>(&self, client: &mut SmtpClient<S>) -> impl Future<Output = Result<()>>
    where
        S: AsyncRead + AsyncWrite + Unpin;
}

/// Sends no commands; for servers that accept mail without authentication.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuthenticator;

impl Authenticator for NoAuthenticator {
    async fn authenticate<S>(&self, _client: &mut SmtpClient<S>) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        Ok(())
    }
}

/// `AUTH LOGIN`: username and password in two base64 challenge responses.
#[derive(Clone)]
pub struct LoginAuthenticator {
    username: String,
    password: String,
}

impl LoginAuthenticator {
    /// Creates a LOGIN authenticator.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl Authenticator for LoginAuthenticator {
    async fn authenticate<S>(&self, client: &mut SmtpClient<S>) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let start = Command::Auth {
            mechanism: AuthMechanism::Login,
            initial_response: None,
        };
        client.send_command(&start, Some(ReplyCode::AUTH_CONTINUE)).await?;

        let username = Command::AuthResponse(STANDARD.encode(&self.username));
        client.send_command(&username, Some(ReplyCode::AUTH_CONTINUE)).await?;

        let password = Command::AuthResponse(STANDARD.encode(&self.password));
        client.send_command(&password, Some(ReplyCode::AUTH_SUCCESS)).await?;

        client.mark_authenticated();
        tracing::info!(mechanism = "LOGIN", "authenticated");
        Ok(())
    }
}

impl fmt::Debug for LoginAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginAuthenticator")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// `AUTH PLAIN` with the credentials as initial response (RFC 4616).
#[derive(Clone)]
pub struct PlainAuthenticator {
    username: String,
    password: String,
}

impl PlainAuthenticator {
    /// Creates a PLAIN authenticator.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl Authenticator for PlainAuthenticator {
    async fn authenticate<S>(&self, client: &mut SmtpClient<S>) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let response = plain_response(&self.username, &self.password);
        initial_response_exchange(client, AuthMechanism::Plain, response).await
    }
}

impl fmt::Debug for PlainAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlainAuthenticator")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// `AUTH OAUTHBEARER` with a bearer token (RFC 7628).
#[derive(Clone)]
pub struct OAuthBearerAuthenticator {
    user: String,
    host: String,
    port: u16,
    token: String,
}

impl OAuthBearerAuthenticator {
    /// Creates an OAUTHBEARER authenticator for the given server.
    pub fn new(
        user: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        token: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            host: host.into(),
            port,
            token: token.into(),
        }
    }
}

impl Authenticator for OAuthBearerAuthenticator {
    async fn authenticate<S>(&self, client: &mut SmtpClient<S>) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let response = oauthbearer_response(&self.user, &self.host, self.port, &self.token);
        initial_response_exchange(client, AuthMechanism::OAuthBearer, response).await
    }
}

impl fmt::Debug for OAuthBearerAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthBearerAuthenticator")
            .field("user", &self.user)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// `AUTH XOAUTH2` with a bearer token (Google/Microsoft).
#[derive(Clone)]
pub struct OAuth2Authenticator {
    user: String,
    token: String,
}

impl OAuth2Authenticator {
    /// Creates an XOAUTH2 authenticator.
    pub fn new(user: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            token: token.into(),
        }
    }
}

impl Authenticator for OAuth2Authenticator {
    async fn authenticate<S>(&self, client: &mut SmtpClient<S>) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let response = xoauth2_response(&self.user, &self.token);
        initial_response_exchange(client, AuthMechanism::XOAuth2, response).await
    }
}

impl fmt::Debug for OAuth2Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2Authenticator")
            .field("user", &self.user)
            .field("token", &"<redacted>")
            .finish()
    }
}

async fn initial_response_exchange<S>(
    client: &mut SmtpClient<S>,
    mechanism: AuthMechanism,
    response: String,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let command = Command::Auth {
        mechanism,
        initial_response: Some(response),
    };
    client.send_command(&command, Some(ReplyCode::AUTH_SUCCESS)).await?;

    client.mark_authenticated();
    tracing::info!(%mechanism, "authenticated");
    Ok(())
}

/// `\0<username>\0<password>`, base64 encoded.
#[must_use]
pub fn plain_response(username: &str, password: &str) -> String {
    // Empty authorization identity: act as the authenticated user
    STANDARD.encode(format!("\0{username}\0{password}"))
}

/// `n,a=<user>,\x01host=<host>\x01port=<port>\x01auth=Bearer <token>\x01\x01`,
/// base64 encoded. `,` and `=` in the user are escaped as `=2C` and `=3D`.
#[must_use]
pub fn oauthbearer_response(user: &str, host: &str, port: u16, token: &str) -> String {
    let user = gs2_escape(user);
    STANDARD.encode(format!(
        "n,a={user},\x01host={host}\x01port={port}\x01auth=Bearer {token}\x01\x01"
    ))
}

/// Escapes a GS2 `saslname` (RFC 5801 section 4).
fn gs2_escape(name: &str) -> Cow<'_, str> {
    if name.contains([',', '=']) {
        Cow::Owned(name.replace('=', "=3D").replace(',', "=2C"))
    } else {
        Cow::Borrowed(name)
    }
}

/// `user=<user>\x01auth=Bearer <token>\x01\x01`, base64 encoded.
#[must_use]
pub fn xoauth2_response(user: &str, token: &str) -> String {
    STANDARD.encode(format!("user={user}\x01auth=Bearer {token}\x01\x01"))
}
