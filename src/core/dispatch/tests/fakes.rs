use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::core::channel::ChannelRegistry;
use crate::core::dispatch::DispatchOrchestrator;
use crate::core::metadata::StaticCatalog;
use crate::core::recipients::StaticUserDirectory;
use crate::core::render::HtmlRenderer;
use crate::core::report::store::{ReportFilter, ReportStore};
use crate::core::report::{Period, ReportDefinition, ReportFormat};
use crate::core::sites::{SiteEntry, StaticSiteDirectory};
use crate::interfaces::email::{EmailChannel, MailBody, MailSettings, MailTransport, OutgoingMail};

pub struct FakeStore {
    reports: Vec<ReportDefinition>,
}

#[async_trait]
impl ReportStore for FakeStore {
    async fn list_reports(&self, filter: ReportFilter) -> Result<Vec<ReportDefinition>> {
        Ok(self
            .reports
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn get_report(&self, id: i64) -> Result<ReportDefinition> {
        self.reports
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no report with id {id}"))
    }

    async fn delete_report(&self, _id: i64) -> Result<()> {
        anyhow::bail!("not supported by the fake store")
    }
}

/// Records every send attempt: the sole recipient of the envelope and the
/// body it carried.
pub struct RecordingTransport {
    pub attempts: Mutex<Vec<(Option<String>, String)>>,
    fail_on: Option<String>,
}

impl RecordingTransport {
    pub fn new(fail_on: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            attempts: Mutex::new(Vec::new()),
            fail_on: fail_on.map(|s| s.to_string()),
        })
    }
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        let body = match &mail.body {
            MailBody::Html(html) => html.clone(),
            MailBody::Text(text) => text.clone(),
        };
        self.attempts.lock().await.push((mail.to.clone(), body));
        if self.fail_on.as_deref() == mail.to.as_deref() {
            anyhow::bail!("smtp rejected the message");
        }
        Ok(())
    }
}

pub fn sample_report(id: i64, owner: &str, parameters: serde_json::Value) -> ReportDefinition {
    ReportDefinition {
        id,
        site_id: 1,
        owner_login: owner.to_string(),
        description: "traffic overview".to_string(),
        segment_id: None,
        period: Period::Week,
        hour: 8,
        channel_type: "email".to_string(),
        format: ReportFormat::Html,
        sub_report_ids: vec![
            "Referrers.getWebsites".to_string(),
            "VisitsSummary.get".to_string(),
        ],
        parameters,
        created_at: None,
        last_sent_at: None,
        deleted: false,
    }
}

pub fn orchestrator(
    reports: Vec<ReportDefinition>,
    transport: Arc<RecordingTransport>,
) -> DispatchOrchestrator {
    let mut channels = ChannelRegistry::new();
    channels.register(Arc::new(EmailChannel::new(
        transport,
        MailSettings {
            from_address: "noreply@example.org".to_string(),
            from_name: "Analytics Reports".to_string(),
        },
        true,
        false,
    )));

    DispatchOrchestrator::new(
        Arc::new(FakeStore { reports }),
        Arc::new(StaticCatalog::load()),
        Arc::new(HtmlRenderer),
        Arc::new(StaticUserDirectory::new(
            "admin".to_string(),
            "admin@example.org".to_string(),
            "root".to_string(),
            "root@example.org".to_string(),
            HashMap::from([("alice".to_string(), "alice@example.org".to_string())]),
        )),
        Arc::new(StaticSiteDirectory::new(vec![SiteEntry {
            id: 1,
            name: "Example".to_string(),
            timezone: "UTC".to_string(),
        }])),
        channels,
        HashMap::from([(7, "Returning visitors".to_string())]),
    )
}
