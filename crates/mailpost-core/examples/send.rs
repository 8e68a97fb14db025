//! Example: send one message through an SMTP server.
//!
//! ## Running
//!
//! ```bash
//! export MAILPOST_HOST="smtp.example.com"
//! export MAILPOST_USER="me@example.com"
//! export MAILPOST_PASSWORD="app-password"
//! export MAILPOST_TO="friend@example.com"
//! RUST_LOG=mailpost_smtp=debug cargo run --package mailpost-core --example send
//! ```
//!
//! `MAILPOST_SECURITY` may be `none`, `starttls` (default) or `tls`.

use std::env;

use anyhow::Context;
use mailpost_core::{MailService, MailServiceLogger, Security, SmtpConfig, SmtpMailService};
use mailpost_mime::{Address, Message};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailpost_core=info,mailpost_smtp=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let host = env::var("MAILPOST_HOST").context("MAILPOST_HOST is not set")?;
    let user = env::var("MAILPOST_USER").context("MAILPOST_USER is not set")?;
    let password = env::var("MAILPOST_PASSWORD").context("MAILPOST_PASSWORD is not set")?;
    let to = env::var("MAILPOST_TO").unwrap_or_else(|_| user.clone());

    let security = match env::var("MAILPOST_SECURITY").as_deref() {
        Ok("none") => Security::None,
        Ok("tls") => Security::Tls,
        _ => Security::StartTls,
    };

    let config = SmtpConfig::builder(host)
        .security(security)
        .login(user.clone(), password)
        .build()?;
    let service =
        MailServiceLogger::new(SmtpMailService::from_config(&config)?).with_level(Level::INFO);

    let mut message =
        Message::new(Address::new(&to)?, Address::new(&user)?, "Hello from mailpost")?;
    message.set_text(Some("This message was sent by the mailpost example.\n".to_string()));
    message.set_html(Some(
        "<p>This message was sent by the <b>mailpost</b> example.</p>".to_string(),
    ));

    service.send(&message).await?;
    Ok(())
}
