//! SMTP protocol engine.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use super::{ClientOptions, ServerInfo, SessionState, StartTls, TlsParameters, TransactionPhase};
use crate::body::BodyWriter;
use crate::command::Command;
use crate::dot_stuffing::DotStuffingWriter;
use crate::error::{Error, Result};
use crate::parser::read_reply;
use crate::types::{Extension, Reply, ReplyCode};

/// SMTP client driving one connection.
///
/// Every operation sends one command and waits for its reply before
/// returning; `&mut self` keeps operations strictly sequential.
///
/// The transport is released exactly once: by [`quit`](Self::quit), on a
/// transport error, or when the client is dropped. Prefer
/// [`session`](Self::session), which always ends with `QUIT`.
#[derive(Debug)]
pub struct SmtpClient<S: AsyncRead + AsyncWrite + Unpin> {
    transport: Option<BufReader<S>>,
    state: SessionState,
    server_info: ServerInfo,
    options: ClientOptions,
    authenticated: bool,
}

impl<S: AsyncRead + AsyncWrite + Unpin> SmtpClient<S> {
    /// Creates a client over a connected stream and reads the greeting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] (with an empty command) if the greeting is
    /// not `220`, or a transport error if it cannot be read.
    pub async fn new(stream: S, options: ClientOptions) -> Result<Self> {
        let mut client = Self {
            transport: Some(BufReader::new(stream)),
            state: SessionState::AwaitingGreeting,
            server_info: ServerInfo::default(),
            options,
            authenticated: false,
        };

        match client.read_greeting().await {
            Ok(()) => Ok(client),
            Err(e) => {
                // The server is going away (421) or never spoke: no QUIT
                client.release();
                Err(e)
            }
        }
    }

    async fn read_greeting(&mut self) -> Result<()> {
        let reply = self.receive().await?;
        check_reply(&reply, ReplyCode::SERVICE_READY, "")?;

        self.server_info.hostname = reply
            .message
            .first()
            .and_then(|msg| msg.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();
        self.state = SessionState::Ready;
        Ok(())
    }

    /// Returns the server information.
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Returns the protocol state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns true once an authenticator has succeeded.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Returns the protocol options.
    #[must_use]
    pub const fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Sends a command and reads its reply.
    ///
    /// With `expected` set, any other reply code is an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] on an unexpected code, or a transport error.
    pub async fn send_command(
        &mut self,
        command: &Command,
        expected: Option<ReplyCode>,
    ) -> Result<ReplyCode> {
        let reply = self.exchange(command).await?;
        if let Some(expected) = expected {
            check_reply(&reply, expected, &command.to_string())?;
        }
        Ok(reply.code)
    }

    /// Sends `EHLO` and records the advertised extensions.
    ///
    /// # Errors
    ///
    /// Returns an error if the reply is not `250`.
    pub async fn send_ehlo(&mut self, domain: &str) -> Result<()> {
        let command = Command::Ehlo {
            hostname: domain.to_string(),
        };
        let reply = self.expect(&command, ReplyCode::OK).await?;

        // The first line repeats the server's name
        self.server_info.extensions = reply
            .message
            .iter()
            .skip(1)
            .map(|line| Extension::parse(line))
            .collect();
        Ok(())
    }

    /// Sends `STARTTLS` and upgrades the transport in place.
    ///
    /// Advertised extensions are cleared; send `EHLO` again afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the reply is not `220`. A failed handshake closes
    /// the connection.
    pub async fn send_starttls(&mut self, tls: &TlsParameters) -> Result<()>
    where
        S: StartTls,
    {
        self.expect(&Command::StartTls, ReplyCode::SERVICE_READY).await?;

        let reader = self.transport.take().ok_or(Error::Closed)?;
        if !reader.buffer().is_empty() {
            // Plaintext sent after the 220 must never be read as TLS-protected
            self.state = SessionState::Closed;
            return Err(Error::MalformedReply("unexpected data after STARTTLS reply".into()));
        }

        match reader.into_inner().start_tls(tls).await {
            Ok(stream) => {
                self.transport = Some(BufReader::new(stream));
                self.server_info.extensions.clear();
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Closed;
                Err(e)
            }
        }
    }

    /// Records a successful authentication.
    pub const fn mark_authenticated(&mut self) {
        self.authenticated = true;
        self.state = SessionState::Authenticated;
    }

    /// Sends one message: envelope, then the body written by `body`.
    ///
    /// Recipients are sent in order and the first rejection aborts the
    /// transaction before `DATA`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] for unusable envelope addresses,
    /// [`Error::Protocol`] if the server rejects a step, or a transport or
    /// rendering error.
    pub async fn send_mail<B>(
        &mut self,
        sender: &str,
        recipients: &[impl AsRef<str>],
        body: &B,
    ) -> Result<()>
    where
        B: BodyWriter + ?Sized,
    {
        validate_envelope(sender, recipients)?;

        self.expect(
            &Command::MailFrom {
                from: sender.to_string(),
            },
            ReplyCode::OK,
        )
        .await?;
        self.state = SessionState::Transacting(TransactionPhase::MailFrom);

        for recipient in recipients {
            let command = Command::RcptTo {
                to: recipient.as_ref().to_string(),
            };
            self.expect(&command, ReplyCode::OK).await?;
            self.state = SessionState::Transacting(TransactionPhase::RcptTo);
        }

        self.expect(&Command::Data, ReplyCode::START_DATA).await?;
        self.state = SessionState::Transacting(TransactionPhase::Data);

        if let Err(e) = self.write_body(body).await {
            // The server is mid-DATA; nothing further can be sent safely
            self.release();
            return Err(e);
        }

        self.expect(&Command::EndOfData, ReplyCode::OK).await?;
        self.state = if self.authenticated {
            SessionState::Authenticated
        } else {
            SessionState::Ready
        };

        tracing::info!(sender, recipients = recipients.len(), "message accepted");
        Ok(())
    }

    async fn write_body<B: BodyWriter + ?Sized>(&mut self, body: &B) -> Result<()> {
        let transport = self.transport.as_mut().ok_or(Error::Closed)?;
        let mut sink = DotStuffingWriter::at_line_start(transport.get_mut());
        body.write_body(&mut sink).await?;
        sink.flush().await?;
        Ok(())
    }

    /// Sends `QUIT` and closes the transport.
    ///
    /// Calling it again, or after the connection failed, does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if `QUIT` is not answered with `221`. The transport
    /// is closed either way.
    pub async fn quit(&mut self) -> Result<()> {
        if self.transport.is_none() {
            return Ok(());
        }

        let result = self.expect(&Command::Quit, ReplyCode::CLOSING).await;

        if let Some(mut transport) = self.transport.take()
            && let Err(e) = transport.get_mut().shutdown().await
        {
            tracing::debug!(error = %e, "shutdown after QUIT failed");
        }
        self.state = SessionState::Closed;

        result.map(|_| ())
    }

    /// Runs `f` with this client, then always sends `QUIT`.
    ///
    /// An error from `f` takes precedence over one from `QUIT`, which is
    /// logged instead.
    ///
    /// # Errors
    ///
    /// Returns the error from `f`, or else the error from `QUIT`.
    pub async fn session<T, F>(&mut self, f: F) -> Result<T>
    where
        F: AsyncFnOnce(&mut Self) -> Result<T>,
    {
        let outcome = f(&mut *self).await;
        let teardown = self.quit().await;

        match (outcome, teardown) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(quit_err)) => {
                tracing::warn!(error = %quit_err, "QUIT failed after an earlier error");
                Err(e)
            }
        }
    }

    async fn expect(&mut self, command: &Command, expected: ReplyCode) -> Result<Reply> {
        let reply = self.exchange(command).await?;
        check_reply(&reply, expected, &command.to_string())?;
        Ok(reply)
    }

    async fn exchange(&mut self, command: &Command) -> Result<Reply> {
        tracing::debug!("C: {command}");
        let limit = self.options.io_timeout;
        let strict = self.options.strict_replies;

        let result = match self.transport.as_mut() {
            Some(transport) => round_trip(transport, command, limit, strict).await,
            None => Err(Error::Closed),
        };

        self.on_transport_error(result)
    }

    async fn receive(&mut self) -> Result<Reply> {
        let limit = self.options.io_timeout;
        let strict = self.options.strict_replies;

        let result = match self.transport.as_mut() {
            Some(transport) => with_timeout(limit, read_reply(transport, strict)).await,
            None => Err(Error::Closed),
        };

        self.on_transport_error(result)
    }

    /// A broken transport cannot be trusted for further commands.
    fn on_transport_error<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result
            && e.is_transport()
        {
            self.release();
        }
        result
    }

    fn release(&mut self) {
        self.transport = None;
        self.state = SessionState::Closed;
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Drop for SmtpClient<S> {
    fn drop(&mut self) {
        if self.transport.is_some() {
            tracing::warn!(
                server = %self.server_info.hostname,
                "SMTP client dropped without QUIT; closing connection"
            );
        }
    }
}

fn check_reply(reply: &Reply, expected: ReplyCode, command: &str) -> Result<()> {
    if reply.code == expected {
        return Ok(());
    }
    Err(Error::Protocol {
        expected,
        received: reply.code,
        command: command.to_string(),
        response: reply.last_line.clone(),
    })
}

fn validate_envelope(sender: &str, recipients: &[impl AsRef<str>]) -> Result<()> {
    let unusable = |address: &str| address.contains(['\r', '\n', '<', '>']);

    if unusable(sender) {
        return Err(Error::InvalidAddress(sender.to_string()));
    }
    if recipients.is_empty() {
        return Err(Error::InvalidAddress("no recipients".to_string()));
    }
    if let Some(bad) = recipients.iter().map(AsRef::as_ref).find(|r| r.is_empty() || unusable(r)) {
        return Err(Error::InvalidAddress(bad.to_string()));
    }
    Ok(())
}

async fn round_trip<S: AsyncRead + AsyncWrite + Unpin>(
    transport: &mut BufReader<S>,
    command: &Command,
    limit: Option<Duration>,
    strict: bool,
) -> Result<Reply> {
    let stream = transport.get_mut();
    with_timeout(limit, async {
        stream.write_all(&command.serialize()).await?;
        stream.flush().await?;
        Ok(())
    })
    .await?;

    with_timeout(limit, read_reply(transport, strict)).await
}

async fn with_timeout<T>(
    limit: Option<Duration>,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match limit {
        Some(duration) => tokio::time::timeout(duration, fut)
            .await
            .map_err(|_| Error::Timeout(duration))?,
        None => fut.await,
    }
}
