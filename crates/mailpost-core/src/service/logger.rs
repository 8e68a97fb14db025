//! Audit logging around another mail service.

use mailpost_mime::{Address, Message};
use tracing::Level;

use super::MailService;
use crate::error::Result;

/// Default audit line.
///
/// Tokens: `{status}`, `{service}`, `{to}`, `{from}`, `{cc}`, `{bcc}`, `{subject}`.
pub const DEFAULT_TEMPLATE: &str =
    "{status} via {service} to: {to} from: {from} with subject: {subject}";

/// Writes one audit line per message sent through the wrapped service.
///
/// The line is emitted whether or not the send succeeded; the wrapped
/// service's error is returned unchanged.
#[derive(Debug, Clone)]
pub struct MailServiceLogger<M> {
    inner: M,
    template: String,
    level: Level,
    service_name: String,
}

impl<M: MailService> MailServiceLogger<M> {
    /// Wraps `inner`, logging at DEBUG with [`DEFAULT_TEMPLATE`].
    pub fn new(inner: M) -> Self {
        Self {
            inner,
            template: DEFAULT_TEMPLATE.to_string(),
            level: Level::DEBUG,
            service_name: short_type_name::<M>().to_string(),
        }
    }

    /// Sets the audit line template.
    #[must_use]
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    /// Sets the level audit lines are emitted at.
    #[must_use]
    pub const fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Overrides the name used for `{service}`.
    #[must_use]
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// The wrapped service.
    #[must_use]
    pub const fn inner(&self) -> &M {
        &self.inner
    }

    /// Renders the audit line for `message` with the given status.
    #[must_use]
    pub fn render(&self, message: &Message, status: &str) -> String {
        let mut out = String::with_capacity(self.template.len() + 64);
        let mut rest = self.template.as_str();

        // One pass, so token-like text inside values is never expanded
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let candidate = &rest[open..];

            let expansion = candidate.find('}').and_then(|close| {
                let value = self.token(&candidate[1..close], message, status)?;
                Some((close, value))
            });

            match expansion {
                Some((close, value)) => {
                    out.push_str(&value);
                    rest = &candidate[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = &candidate[1..];
                }
            }
        }
        out.push_str(rest);
        out
    }

    fn token(&self, name: &str, message: &Message, status: &str) -> Option<String> {
        Some(match name {
            "status" => status.to_string(),
            "service" => self.service_name.clone(),
            "to" => format_addresses(message.to()),
            "from" => format_addresses(message.from()),
            "cc" => format_addresses(message.cc()),
            "bcc" => format_addresses(message.bcc()),
            "subject" => message.subject().to_string(),
            _ => return None,
        })
    }

    fn emit(&self, line: &str) {
        let level = self.level;
        if level == Level::ERROR {
            tracing::error!("{line}");
        } else if level == Level::WARN {
            tracing::warn!("{line}");
        } else if level == Level::INFO {
            tracing::info!("{line}");
        } else if level == Level::DEBUG {
            tracing::debug!("{line}");
        } else {
            tracing::trace!("{line}");
        }
    }
}

impl<M: MailService> MailService for MailServiceLogger<M> {
    async fn send(&self, message: &Message) -> Result<()> {
        let result = self.inner.send(message).await;

        let status = match &result {
            Ok(()) => "message sent".to_string(),
            Err(e) => format!("ERROR: message not sent [{e}]"),
        };
        self.emit(&self.render(message, &status));

        result
    }
}

fn format_addresses(addresses: &[Address]) -> String {
    addresses
        .iter()
        .map(|address| match address.name() {
            Some(name) => format!("{name} <{}>", address.email()),
            None => format!("<{}>", address.email()),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// `a::b::Service<X>` becomes `Service`.
fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
