use anyhow::Result;
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, warn};

use crate::core::channel::Channel;
use crate::core::dispatch::DispatchContext;
use crate::core::display::DisplayCapabilities;
use crate::core::errors::EngineError;
use crate::core::render::{FileEncoding, InlineFile, RenderedReport};
use crate::core::report::{ReportFormat, ReportParameters, validate_parameters};

pub const EMAIL_CHANNEL_TYPE: &str = "email";

const GREETING: &str = "Hello,";

#[derive(Debug, Clone)]
pub struct MailSettings {
    pub from_address: String,
    pub from_name: String,
}

#[derive(Debug, Clone)]
pub enum MailBody {
    Html(String),
    Text(String),
}

/// One outgoing message. The delivery loop targets a single recipient at
/// a time: `to` is set before each send and cleared afterwards so no
/// envelope ever carries more than one address.
#[derive(Debug, Clone)]
pub struct OutgoingMail {
    pub subject: String,
    pub from_address: String,
    pub from_name: String,
    pub body: MailBody,
    pub attachments: Vec<InlineFile>,
    pub to: Option<String>,
}

/// The mail transport, external to this core.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<()>;
}

/// Email delivery of rendered reports. Owns message assembly and the
/// per-recipient send loop with failure isolation.
pub struct EmailChannel {
    transport: Arc<dyn MailTransport>,
    settings: MailSettings,
    graphing_capable: bool,
    suppress_delivery_errors: bool,
}

impl EmailChannel {
    pub fn new(
        transport: Arc<dyn MailTransport>,
        settings: MailSettings,
        graphing_capable: bool,
        suppress_delivery_errors: bool,
    ) -> Self {
        Self {
            transport,
            settings,
            graphing_capable,
            suppress_delivery_errors,
        }
    }

    /// Assemble the message for one dispatch. HTML reports carry their
    /// content in the body (multipart-related so inline images resolve by
    /// content id); every other format is treated like PDF and shipped as
    /// an inline base64 attachment with a plain-text body.
    pub fn build_mail(&self, ctx: &DispatchContext, rendered: &RenderedReport) -> OutgoingMail {
        let subject = format!("Report {} - {}", ctx.title, ctx.pretty_date);
        let adjective = ctx.report.period.adjective();

        let segment_note = ctx
            .segment_name
            .as_ref()
            .map(|name| format!(" The segment '{name}' is applied to this report."))
            .unwrap_or_default();

        let mut attachments = Vec::new();
        let body = match ctx.report.format {
            ReportFormat::Html => {
                let contents = String::from_utf8_lossy(&rendered.content);
                MailBody::Html(format!(
                    "{GREETING}<br/>Please find below your {adjective} report: {}.{segment_note}<br/><br/>{contents}",
                    ctx.title
                ))
            }
            _ => {
                attachments.push(InlineFile {
                    content: rendered.content.clone(),
                    mime_type: "application/pdf".to_string(),
                    encoding: FileEncoding::Base64,
                    filename: format!("{}.pdf", ctx.title),
                    content_id: None,
                });
                MailBody::Text(format!(
                    "{GREETING}\nPlease find attached your {adjective} report: {}.{segment_note}",
                    ctx.title
                ))
            }
        };

        // inline files (eg chart images referenced by cid) ride along
        // regardless of format
        attachments.extend(rendered.inline_files.iter().cloned());

        OutgoingMail {
            subject,
            from_address: self.settings.from_address.clone(),
            from_name: self.settings.from_name.clone(),
            body,
            attachments,
            to: None,
        }
    }
}

#[async_trait]
impl Channel for EmailChannel {
    fn channel_type(&self) -> &'static str {
        EMAIL_CHANNEL_TYPE
    }

    fn formats(&self) -> Vec<ReportFormat> {
        vec![ReportFormat::Html, ReportFormat::Pdf]
    }

    fn validate_parameters(&self, raw: &Value) -> Result<ReportParameters, EngineError> {
        validate_parameters(raw)
    }

    fn display_capabilities(&self) -> DisplayCapabilities {
        DisplayCapabilities {
            graphing_capable: self.graphing_capable,
        }
    }

    async fn deliver(
        &self,
        ctx: &DispatchContext,
        rendered: &RenderedReport,
        recipients: &[String],
    ) -> Result<(), EngineError> {
        let mut mail = self.build_mail(ctx, rendered);

        for recipient in recipients {
            if recipient.trim().is_empty() {
                continue;
            }

            mail.to = Some(recipient.clone());
            let sent = self.transport.send(&mail).await;
            mail.to = None;

            if let Err(e) = sent {
                if self.suppress_delivery_errors {
                    warn!(
                        "Suppressed delivery failure of '{}' to {}: {}",
                        ctx.filename, recipient, e
                    );
                    continue;
                }
                return Err(EngineError::DeliveryFailure {
                    filename: ctx.filename.clone(),
                    recipient: recipient.clone(),
                    message: e.to_string(),
                });
            }

            info!("Sent '{}' to {}", ctx.filename, recipient);
        }

        Ok(())
    }
}

/// File-based transport for the standalone binary: each send becomes one
/// message file in the outbox directory, attachments encoded per their
/// declared transfer encoding.
pub struct OutboxTransport {
    outbox_dir: PathBuf,
    sequence: AtomicUsize,
}

impl OutboxTransport {
    pub fn new(outbox_dir: PathBuf) -> Self {
        Self {
            outbox_dir,
            sequence: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl MailTransport for OutboxTransport {
    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        let recipient = mail
            .to
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("outgoing mail has no recipient"))?;

        let mut message = String::new();
        message.push_str(&format!(
            "From: {} <{}>\n",
            mail.from_name, mail.from_address
        ));
        message.push_str(&format!("To: {recipient}\n"));
        message.push_str(&format!("Subject: {}\n", mail.subject));
        match &mail.body {
            MailBody::Html(html) => {
                message.push_str("Content-Type: multipart/related\n\n");
                message.push_str(html);
            }
            MailBody::Text(text) => {
                message.push_str("Content-Type: text/plain\n\n");
                message.push_str(text);
            }
        }
        message.push('\n');

        for attachment in &mail.attachments {
            message.push_str(&format!(
                "\n--attachment filename=\"{}\" type=\"{}\"",
                attachment.filename, attachment.mime_type
            ));
            if let Some(ref cid) = attachment.content_id {
                message.push_str(&format!(" cid=\"{cid}\""));
            }
            message.push('\n');
            match attachment.encoding {
                FileEncoding::Base64 => message.push_str(&BASE64.encode(&attachment.content)),
                FileEncoding::Binary => {
                    message.push_str(&String::from_utf8_lossy(&attachment.content))
                }
            }
            message.push('\n');
        }

        tokio::fs::create_dir_all(&self.outbox_dir).await?;
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let safe_recipient: String = recipient
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '.' || c == '@' { c } else { '_' })
            .collect();
        let path = self.outbox_dir.join(format!("{seq:04}-{safe_recipient}.eml"));
        tokio::fs::write(&path, message).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::report::{Period, ReportDefinition};
    use tokio::sync::Mutex;

    fn report(format: ReportFormat, period: Period) -> ReportDefinition {
        ReportDefinition {
            id: 1,
            site_id: 1,
            owner_login: "admin".to_string(),
            description: "traffic".to_string(),
            segment_id: None,
            period,
            hour: 0,
            channel_type: "email".to_string(),
            format,
            sub_report_ids: vec![],
            parameters: serde_json::json!({}),
            created_at: None,
            last_sent_at: None,
            deleted: false,
        }
    }

    fn ctx(format: ReportFormat, segment_name: Option<&str>) -> DispatchContext {
        DispatchContext {
            report: report(format, Period::Week),
            parameters: ReportParameters::default(),
            title: "Example - traffic".to_string(),
            pretty_date: "From 2026-07-27 to 2026-08-02".to_string(),
            segment_name: segment_name.map(|s| s.to_string()),
            filename: "Example - traffic.html".to_string(),
        }
    }

    fn rendered(inline_files: Vec<InlineFile>) -> RenderedReport {
        RenderedReport {
            content: b"<h1>report body</h1>".to_vec(),
            content_type: "text/html; charset=utf-8".to_string(),
            inline_files,
        }
    }

    fn channel(transport: Arc<dyn MailTransport>, suppress: bool) -> EmailChannel {
        EmailChannel::new(
            transport,
            MailSettings {
                from_address: "noreply@example.org".to_string(),
                from_name: "Analytics Reports".to_string(),
            },
            true,
            suppress,
        )
    }

    struct RecordingTransport {
        attempts: Mutex<Vec<Option<String>>>,
        fail_on: Option<String>,
    }

    impl RecordingTransport {
        fn new(fail_on: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                attempts: Mutex::new(Vec::new()),
                fail_on: fail_on.map(|s| s.to_string()),
            })
        }
    }

    #[async_trait]
    impl MailTransport for RecordingTransport {
        async fn send(&self, mail: &OutgoingMail) -> Result<()> {
            self.attempts.lock().await.push(mail.to.clone());
            if self.fail_on.as_deref() == mail.to.as_deref() {
                anyhow::bail!("smtp rejected the message");
            }
            Ok(())
        }
    }

    #[test]
    fn html_mail_carries_the_content_in_the_body() {
        let transport = RecordingTransport::new(None);
        let mail = channel(transport, false).build_mail(&ctx(ReportFormat::Html, None), &rendered(vec![]));

        assert_eq!(mail.subject, "Report Example - traffic - From 2026-07-27 to 2026-08-02");
        match &mail.body {
            MailBody::Html(html) => {
                assert!(html.starts_with("Hello,<br/>"));
                assert!(html.contains("your weekly report: Example - traffic."));
                assert!(html.contains("<h1>report body</h1>"));
            }
            other => panic!("expected html body, got {other:?}"),
        }
        assert!(mail.attachments.is_empty());
        assert!(mail.to.is_none());
    }

    #[test]
    fn pdf_mail_attaches_the_content_base64_encoded() {
        let transport = RecordingTransport::new(None);
        let mail = channel(transport, false).build_mail(&ctx(ReportFormat::Pdf, None), &rendered(vec![]));

        match &mail.body {
            MailBody::Text(text) => {
                assert!(text.starts_with("Hello,\n"));
                assert!(text.contains("your weekly report: Example - traffic."));
            }
            other => panic!("expected text body, got {other:?}"),
        }
        assert_eq!(mail.attachments.len(), 1);
        let attachment = &mail.attachments[0];
        assert_eq!(attachment.filename, "Example - traffic.pdf");
        assert_eq!(attachment.mime_type, "application/pdf");
        assert_eq!(attachment.encoding, FileEncoding::Base64);
        assert_eq!(attachment.content, b"<h1>report body</h1>".to_vec());
    }

    #[test]
    fn segment_note_is_included_when_a_segment_applies() {
        let transport = RecordingTransport::new(None);
        let mail = channel(transport, false)
            .build_mail(&ctx(ReportFormat::Html, Some("Returning visitors")), &rendered(vec![]));
        match &mail.body {
            MailBody::Html(html) => {
                assert!(html.contains("The segment 'Returning visitors' is applied to this report."));
            }
            other => panic!("expected html body, got {other:?}"),
        }
    }

    #[test]
    fn renderer_inline_files_ride_along_with_their_content_id() {
        let chart = InlineFile {
            content: vec![1, 2, 3],
            mime_type: "image/png".to_string(),
            encoding: FileEncoding::Base64,
            filename: "chart.png".to_string(),
            content_id: Some("chart-1".to_string()),
        };
        let transport = RecordingTransport::new(None);
        let mail = channel(transport, false)
            .build_mail(&ctx(ReportFormat::Pdf, None), &rendered(vec![chart]));

        assert_eq!(mail.attachments.len(), 2);
        assert_eq!(mail.attachments[1].content_id.as_deref(), Some("chart-1"));
    }

    #[tokio::test]
    async fn each_recipient_gets_an_independent_single_recipient_send() {
        let transport = RecordingTransport::new(None);
        let email = channel(transport.clone(), false);
        let recipients = vec![
            "a@example.org".to_string(),
            String::new(),
            "b@example.org".to_string(),
        ];

        email
            .deliver(&ctx(ReportFormat::Html, None), &rendered(vec![]), &recipients)
            .await
            .unwrap();

        let attempts = transport.attempts.lock().await;
        assert_eq!(
            *attempts,
            vec![
                Some("a@example.org".to_string()),
                Some("b@example.org".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn transport_failure_raises_after_earlier_sends_went_out() {
        let transport = RecordingTransport::new(Some("b@example.org"));
        let email = channel(transport.clone(), false);
        let recipients = vec![
            "a@example.org".to_string(),
            "b@example.org".to_string(),
            "c@example.org".to_string(),
        ];

        let err = email
            .deliver(&ctx(ReportFormat::Html, None), &rendered(vec![]), &recipients)
            .await
            .unwrap_err();

        match err {
            EngineError::DeliveryFailure { filename, recipient, .. } => {
                assert_eq!(filename, "Example - traffic.html");
                assert_eq!(recipient, "b@example.org");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // the first recipient's message already went out; the third was
        // never attempted
        let attempts = transport.attempts.lock().await;
        assert_eq!(
            *attempts,
            vec![
                Some("a@example.org".to_string()),
                Some("b@example.org".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn suppression_swallows_the_failure_and_continues() {
        let transport = RecordingTransport::new(Some("b@example.org"));
        let email = channel(transport.clone(), true);
        let recipients = vec![
            "a@example.org".to_string(),
            "b@example.org".to_string(),
            "c@example.org".to_string(),
        ];

        email
            .deliver(&ctx(ReportFormat::Html, None), &rendered(vec![]), &recipients)
            .await
            .unwrap();

        let attempts = transport.attempts.lock().await;
        assert_eq!(attempts.len(), 3);
    }

    #[tokio::test]
    async fn outbox_transport_writes_one_file_per_send() {
        let dir = tempfile::tempdir().unwrap();
        let transport = OutboxTransport::new(dir.path().to_path_buf());

        let email = channel(Arc::new(OutboxTransport::new(dir.path().to_path_buf())), false);
        let mut mail = email.build_mail(&ctx(ReportFormat::Pdf, None), &rendered(vec![]));
        mail.to = Some("a@example.org".to_string());
        transport.send(&mail).await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let content =
            std::fs::read_to_string(entries[0].as_ref().unwrap().path()).unwrap();
        assert!(content.contains("To: a@example.org"));
        assert!(content.contains("Subject: Report Example - traffic"));
        assert!(content.contains(&BASE64.encode(b"<h1>report body</h1>")));
    }

    #[tokio::test]
    async fn outbox_transport_requires_a_recipient() {
        let dir = tempfile::tempdir().unwrap();
        let transport = OutboxTransport::new(dir.path().to_path_buf());
        let email = channel(Arc::new(OutboxTransport::new(dir.path().to_path_buf())), false);
        let mail = email.build_mail(&ctx(ReportFormat::Html, None), &rendered(vec![]));
        assert!(transport.send(&mail).await.is_err());
    }
}
