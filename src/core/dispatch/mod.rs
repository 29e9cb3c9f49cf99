use anyhow::Result;
use chrono::{Datelike, Duration, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::channel::ChannelRegistry;
use crate::core::display::apply_display_policy;
use crate::core::metadata::{MetadataCatalog, filter_report_metadata, select_ordered};
use crate::core::recipients::{UserDirectory, resolve_recipients};
use crate::core::render::Renderer;
use crate::core::report::{Period, ReportDefinition, ReportParameters};
use crate::core::report::store::ReportStore;
use crate::core::schedule::{PlannedDispatch, plan_dispatches};
use crate::core::sites::SiteDirectory;

#[cfg(test)]
mod tests;

/// Everything one dispatch carries through its stages: the read-only
/// report snapshot plus the derived presentation fields.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    pub report: ReportDefinition,
    pub parameters: ReportParameters,
    pub title: String,
    pub pretty_date: String,
    pub segment_name: Option<String>,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered { recipients: usize },
    /// The owner could not be resolved; the dispatch is skipped without
    /// an error.
    Skipped,
}

/// Ties the pipeline together for one report instance: metadata, display
/// policy, rendering, recipient resolution, channel delivery. All
/// collaborators are injected at construction.
pub struct DispatchOrchestrator {
    store: Arc<dyn ReportStore>,
    catalog: Arc<dyn MetadataCatalog>,
    renderer: Arc<dyn Renderer>,
    users: Arc<dyn UserDirectory>,
    sites: Arc<dyn SiteDirectory>,
    channels: ChannelRegistry,
    segment_names: HashMap<i64, String>,
}

impl DispatchOrchestrator {
    pub fn new(
        store: Arc<dyn ReportStore>,
        catalog: Arc<dyn MetadataCatalog>,
        renderer: Arc<dyn Renderer>,
        users: Arc<dyn UserDirectory>,
        sites: Arc<dyn SiteDirectory>,
        channels: ChannelRegistry,
        segment_names: HashMap<i64, String>,
    ) -> Self {
        Self {
            store,
            catalog,
            renderer,
            users,
            sites,
            channels,
            segment_names,
        }
    }

    /// Derive the schedule for every schedulable stored report.
    pub async fn planned_dispatches(&self) -> Result<Vec<PlannedDispatch>> {
        let reports = self.store.list_reports(Default::default()).await?;
        Ok(plan_dispatches(&reports, self.sites.as_ref()))
    }

    /// Side-effect-free recipient preview for one stored report.
    pub async fn preview_recipients(&self, report_id: i64) -> Result<Option<Vec<String>>> {
        let report = self.store.get_report(report_id).await?;
        let channel = self.channels.get(&report.channel_type)?;
        let parameters = channel.validate_parameters(&report.parameters)?;
        Ok(resolve_recipients(&parameters, &report.owner_login, self.users.as_ref()).await)
    }

    /// Run one report's dispatch end to end. Invoked by the task runner at
    /// each scheduled instant; each invocation is sequential and
    /// independent of concurrently dispatching reports.
    pub async fn dispatch(&self, report_id: i64) -> Result<DispatchOutcome> {
        let report = self.store.get_report(report_id).await?;
        let channel = self.channels.get(&report.channel_type)?;
        if !channel.formats().contains(&report.format) {
            anyhow::bail!(
                "channel '{}' does not support the '{}' format",
                report.channel_type,
                report.format.as_str()
            );
        }
        let parameters = channel.validate_parameters(&report.parameters)?;

        let metadata =
            filter_report_metadata(self.catalog.sub_reports_for_site(report.site_id).await?);
        let selected = select_ordered(&metadata, &report.sub_report_ids);
        let views = apply_display_policy(
            selected,
            &parameters,
            channel.display_capabilities(),
            &self.catalog.multi_site_metrics(),
        );

        let site_name = self.sites.site_name(report.site_id)?;
        let pretty_date = pretty_date_for(report.period, Utc::now().date_naive());
        let title = format!("{} - {}", site_name, report.description);
        let filename = format!("{} - {}.{}", title, pretty_date, report.format.extension());
        let segment_name = report
            .segment_id
            .and_then(|id| self.segment_names.get(&id).cloned());

        let ctx = DispatchContext {
            parameters: parameters.clone(),
            title,
            pretty_date,
            segment_name,
            filename,
            report: report.clone(),
        };

        let rendered = self
            .renderer
            .render(report.format, &ctx.title, &ctx.pretty_date, &views)
            .await?;
        debug!(
            "Rendered '{}': {} bytes, {}",
            ctx.filename,
            rendered.content.len(),
            rendered.content_type
        );

        let Some(recipients) =
            resolve_recipients(&parameters, &report.owner_login, self.users.as_ref()).await
        else {
            info!(
                "Report {} ('{}') has no resolvable owner, delivery skipped",
                report.id, report.description
            );
            return Ok(DispatchOutcome::Skipped);
        };

        channel.deliver(&ctx, &rendered, &recipients).await?;

        Ok(DispatchOutcome::Delivered {
            recipients: recipients.len(),
        })
    }
}

/// Human-readable date range covered by a dispatch running today.
pub fn pretty_date_for(period: Period, today: NaiveDate) -> String {
    match period {
        Period::Never => today.format("%Y-%m-%d").to_string(),
        Period::Day => (today - Duration::days(1)).format("%Y-%m-%d").to_string(),
        Period::Week => {
            let this_monday =
                today - Duration::days(today.weekday().num_days_from_monday() as i64);
            let monday = this_monday - Duration::days(7);
            let sunday = this_monday - Duration::days(1);
            format!(
                "From {} to {}",
                monday.format("%Y-%m-%d"),
                sunday.format("%Y-%m-%d")
            )
        }
        Period::Month => {
            let first_of_month = today.with_day(1).unwrap_or(today);
            let last_of_previous = first_of_month - Duration::days(1);
            last_of_previous.format("%B %Y").to_string()
        }
        Period::Year => (today.year() - 1).to_string(),
        Period::Range => {
            let end = today - Duration::days(1);
            let start = today - Duration::days(7);
            format!(
                "From {} to {}",
                start.format("%Y-%m-%d"),
                end.format("%Y-%m-%d")
            )
        }
    }
}
