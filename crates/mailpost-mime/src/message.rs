//! E-mail message model.

use chrono::{DateTime, FixedOffset, Local};

use crate::address::Address;
use crate::attachment::{Attachment, ContentIdGenerator, InlineAttachment};
use crate::error::{Error, Result};
use crate::header::Headers;

/// An e-mail message, ready to be rendered by [`MimeWriter`](crate::MimeWriter).
///
/// `to` and `from` always hold at least one address. Bcc addresses are kept
/// for the envelope only and never appear in the rendered headers.
#[derive(Debug, Clone)]
pub struct Message {
    to: Vec<Address>,
    from: Vec<Address>,
    sender: Option<Address>,
    cc: Vec<Address>,
    bcc: Vec<Address>,
    reply_to: Vec<Address>,
    subject: String,
    date: DateTime<FixedOffset>,
    text: Option<String>,
    html: Option<String>,
    attachments: Vec<Attachment>,
    inline_attachments: Vec<InlineAttachment>,
    headers: Headers,
}

impl Message {
    /// Creates a message dated now, with a single recipient and author.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HeaderInjection`] if the subject contains CR or LF.
    pub fn new(to: Address, from: Address, subject: impl Into<String>) -> Result<Self> {
        let mut message = Self {
            to: vec![to],
            from: vec![from],
            sender: None,
            cc: Vec::new(),
            bcc: Vec::new(),
            reply_to: Vec::new(),
            subject: String::new(),
            date: Local::now().fixed_offset(),
            text: None,
            html: None,
            attachments: Vec::new(),
            inline_attachments: Vec::new(),
            headers: Headers::new(),
        };
        message.set_subject(subject)?;
        Ok(message)
    }

    /// Primary recipients.
    #[must_use]
    pub fn to(&self) -> &[Address] {
        &self.to
    }

    /// Replaces the primary recipients.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingAddress`] if `to` is empty.
    pub fn set_to(&mut self, to: impl IntoIterator<Item = Address>) -> Result<()> {
        self.to = non_empty(to, "To")?;
        Ok(())
    }

    /// Appends a primary recipient.
    pub fn add_to(&mut self, address: Address) {
        self.to.push(address);
    }

    /// Authors.
    #[must_use]
    pub fn from(&self) -> &[Address] {
        &self.from
    }

    /// Replaces the authors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingAddress`] if `from` is empty.
    pub fn set_from(&mut self, from: impl IntoIterator<Item = Address>) -> Result<()> {
        self.from = non_empty(from, "From")?;
        Ok(())
    }

    /// Appends an author.
    pub fn add_from(&mut self, address: Address) {
        self.from.push(address);
    }

    /// Explicit sender, if set.
    #[must_use]
    pub const fn sender(&self) -> Option<&Address> {
        self.sender.as_ref()
    }

    /// Sets or clears the explicit sender.
    pub fn set_sender(&mut self, sender: Option<Address>) {
        self.sender = sender;
    }

    /// Carbon-copy recipients.
    #[must_use]
    pub fn cc(&self) -> &[Address] {
        &self.cc
    }

    /// Replaces the carbon-copy recipients.
    pub fn set_cc(&mut self, cc: impl IntoIterator<Item = Address>) {
        self.cc = cc.into_iter().collect();
    }

    /// Appends a carbon-copy recipient.
    pub fn add_cc(&mut self, address: Address) {
        self.cc.push(address);
    }

    /// Blind carbon-copy recipients.
    #[must_use]
    pub fn bcc(&self) -> &[Address] {
        &self.bcc
    }

    /// Replaces the blind carbon-copy recipients.
    pub fn set_bcc(&mut self, bcc: impl IntoIterator<Item = Address>) {
        self.bcc = bcc.into_iter().collect();
    }

    /// Appends a blind carbon-copy recipient.
    pub fn add_bcc(&mut self, address: Address) {
        self.bcc.push(address);
    }

    /// Reply-To addresses.
    #[must_use]
    pub fn reply_to(&self) -> &[Address] {
        &self.reply_to
    }

    /// Replaces the Reply-To addresses.
    pub fn set_reply_to(&mut self, reply_to: impl IntoIterator<Item = Address>) {
        self.reply_to = reply_to.into_iter().collect();
    }

    /// Appends a Reply-To address.
    pub fn add_reply_to(&mut self, address: Address) {
        self.reply_to.push(address);
    }

    /// Subject line (unescaped).
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Sets the subject.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HeaderInjection`] if the subject contains CR or LF.
    pub fn set_subject(&mut self, subject: impl Into<String>) -> Result<()> {
        let subject = subject.into();
        if subject.contains(['\r', '\n']) {
            return Err(Error::HeaderInjection("subject".into()));
        }
        self.subject = subject;
        Ok(())
    }

    /// Origination date.
    #[must_use]
    pub const fn date(&self) -> &DateTime<FixedOffset> {
        &self.date
    }

    /// Sets the origination date.
    pub fn set_date(&mut self, date: DateTime<FixedOffset>) {
        self.date = date;
    }

    /// Parses and sets an RFC 2822 date, e.g. `Thu, 15 Sep 2016 17:20:54 +0200`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDate`] if the string cannot be parsed.
    pub fn set_date_rfc2822(&mut self, date: &str) -> Result<()> {
        self.date = DateTime::parse_from_rfc2822(date)
            .map_err(|e| Error::InvalidDate(format!("{date:?}: {e}")))?;
        Ok(())
    }

    /// Plain-text body.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Sets or clears the plain-text body.
    pub fn set_text(&mut self, text: Option<String>) {
        self.text = text;
    }

    /// Sets the plain-text body from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUtf8`] if the bytes are not UTF-8.
    pub fn set_text_bytes(&mut self, text: Vec<u8>) -> Result<()> {
        self.text = Some(String::from_utf8(text)?);
        Ok(())
    }

    /// HTML body.
    #[must_use]
    pub fn html(&self) -> Option<&str> {
        self.html.as_deref()
    }

    /// Sets or clears the HTML body.
    pub fn set_html(&mut self, html: Option<String>) {
        self.html = html;
    }

    /// Sets the HTML body from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUtf8`] if the bytes are not UTF-8.
    pub fn set_html_bytes(&mut self, html: Vec<u8>) -> Result<()> {
        self.html = Some(String::from_utf8(html)?);
        Ok(())
    }

    /// Regular attachments, in order.
    #[must_use]
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Appends an attachment.
    pub fn add_attachment(&mut self, attachment: Attachment) {
        self.attachments.push(attachment);
    }

    /// Inline attachments, in order.
    #[must_use]
    pub fn inline_attachments(&self) -> &[InlineAttachment] {
        &self.inline_attachments
    }

    /// Adds an inline attachment and returns its `cid:` URI for the HTML body.
    pub fn add_inline_attachment(
        &mut self,
        attachment: Attachment,
        ids: &ContentIdGenerator,
    ) -> String {
        let inline = InlineAttachment::new(attachment, ids);
        let uri = inline.uri();
        self.inline_attachments.push(inline);
        uri
    }

    /// Custom headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Sets a custom header, replacing existing values of that name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name or value is invalid.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.headers.set(name, value)
    }

    /// Appends a custom header value.
    ///
    /// # Errors
    ///
    /// Returns an error if the name or value is invalid.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.headers.add(name, value)
    }
}

fn non_empty(
    addresses: impl IntoIterator<Item = Address>,
    field: &'static str,
) -> Result<Vec<Address>> {
    let addresses: Vec<Address> = addresses.into_iter().collect();
    if addresses.is_empty() {
        return Err(Error::MissingAddress(field));
    }
    Ok(addresses)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn addr(email: &str) -> Address {
        Address::new(email).unwrap()
    }

    fn message() -> Message {
        Message::new(addr("to@example.com"), addr("from@example.com"), "Hello").unwrap()
    }

    #[test]
    fn test_new_message() {
        let msg = message();
        assert_eq!(msg.to(), &[addr("to@example.com")]);
        assert_eq!(msg.from(), &[addr("from@example.com")]);
        assert_eq!(msg.subject(), "Hello");
        assert!(msg.sender().is_none());
        assert!(msg.text().is_none());
        assert!(msg.html().is_none());
    }

    #[test]
    fn test_set_replaces_add_appends() {
        let mut msg = message();
        msg.add_to(addr("second@example.com"));
        assert_eq!(msg.to().len(), 2);

        msg.set_to([addr("only@example.com")]).unwrap();
        assert_eq!(msg.to(), &[addr("only@example.com")]);

        msg.add_cc(addr("cc1@example.com"));
        msg.set_cc(vec![addr("cc2@example.com"), addr("cc3@example.com")]);
        assert_eq!(msg.cc().len(), 2);
        assert_eq!(msg.cc()[0].email(), "cc2@example.com");
    }

    #[test]
    fn test_to_and_from_cannot_be_empty() {
        let mut msg = message();
        assert!(matches!(msg.set_to(Vec::new()), Err(Error::MissingAddress("To"))));
        assert!(matches!(msg.set_from(Vec::new()), Err(Error::MissingAddress("From"))));
        assert_eq!(msg.to().len(), 1);
    }

    #[test]
    fn test_subject_injection() {
        assert!(Message::new(addr("a@example.com"), addr("b@example.com"), "x\ny").is_err());

        let mut msg = message();
        assert!(matches!(
            msg.set_subject("Hi\r\nBcc: victim@example.com"),
            Err(Error::HeaderInjection(_))
        ));
        assert_eq!(msg.subject(), "Hello");
    }

    #[test]
    fn test_body_bytes_must_be_utf8() {
        let mut msg = message();
        msg.set_text_bytes("æøå".as_bytes().to_vec()).unwrap();
        assert_eq!(msg.text(), Some("æøå"));

        assert!(matches!(msg.set_html_bytes(vec![0xFF, 0xFE]), Err(Error::InvalidUtf8(_))));
        assert!(msg.html().is_none());
    }

    #[test]
    fn test_set_date_rfc2822() {
        let mut msg = message();
        msg.set_date_rfc2822("Thu, 15 Sep 2016 17:20:54 +0200").unwrap();
        assert_eq!(msg.date().to_rfc2822(), "Thu, 15 Sep 2016 17:20:54 +0200");

        assert!(matches!(msg.set_date_rfc2822("yesterday"), Err(Error::InvalidDate(_))));
    }

    #[test]
    fn test_inline_attachment_uri() {
        let mut msg = message();
        let ids = ContentIdGenerator::with_seed(1);
        let uri = msg.add_inline_attachment(Attachment::new(vec![1, 2], "kitten.jpg"), &ids);

        assert!(uri.starts_with("cid:"));
        assert_eq!(uri, msg.inline_attachments()[0].uri());
    }

    #[test]
    fn test_custom_headers() {
        let mut msg = message();
        msg.add_header("X-Tag", "a").unwrap();
        msg.add_header("X-Tag", "b").unwrap();
        msg.set_header("X-Priority", "1").unwrap();
        assert_eq!(msg.headers().get_all("x-tag").count(), 2);

        msg.set_header("X-Tag", "c").unwrap();
        assert_eq!(msg.headers().get_all("x-tag").collect::<Vec<_>>(), vec!["c"]);
        assert!(msg.add_header("X-Bad", "line\nbreak").is_err());
    }
}
