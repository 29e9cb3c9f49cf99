use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::info;

use super::ReportDefinition;
use crate::core::errors::EngineError;

/// Query shape for [`ReportStore::list_reports`]. Unset fields do not
/// filter. Soft-deleted reports are excluded unless `include_deleted`.
#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub site_id: Option<i64>,
    pub owner_login: Option<String>,
    pub segment_id: Option<i64>,
    pub include_deleted: bool,
}

impl ReportFilter {
    pub fn matches(&self, report: &ReportDefinition) -> bool {
        if !self.include_deleted && report.deleted {
            return false;
        }
        if let Some(site_id) = self.site_id
            && report.site_id != site_id
        {
            return false;
        }
        if let Some(ref owner) = self.owner_login
            && &report.owner_login != owner
        {
            return false;
        }
        if let Some(segment_id) = self.segment_id
            && report.segment_id != Some(segment_id)
        {
            return false;
        }
        true
    }
}

/// Persistence seam for report definitions. The engine only ever reads
/// snapshots and soft-deletes; creation and updates live with the
/// management API that owns the records.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn list_reports(&self, filter: ReportFilter) -> Result<Vec<ReportDefinition>>;
    async fn get_report(&self, id: i64) -> Result<ReportDefinition>;
    async fn delete_report(&self, id: i64) -> Result<()>;
}

/// Refuse to deactivate a segment while a non-deleted report references it.
/// The error lists the blocking report descriptions.
pub async fn guard_segment_deactivation(store: &dyn ReportStore, segment_id: i64) -> Result<()> {
    let blocking = store
        .list_reports(ReportFilter {
            segment_id: Some(segment_id),
            ..Default::default()
        })
        .await?;

    if blocking.is_empty() {
        return Ok(());
    }

    let reports = blocking
        .iter()
        .map(|r| format!("'{}'", r.description))
        .collect::<Vec<_>>()
        .join(" and ");
    Err(EngineError::SegmentInUse { reports }.into())
}

/// Delete every report covering a removed site.
pub async fn purge_site_reports(store: &dyn ReportStore, site_id: i64) -> Result<usize> {
    let reports = store
        .list_reports(ReportFilter {
            site_id: Some(site_id),
            ..Default::default()
        })
        .await?;
    let count = reports.len();
    for report in reports {
        store.delete_report(report.id).await?;
    }
    Ok(count)
}

/// Delete every report owned by a removed user.
pub async fn purge_user_reports(store: &dyn ReportStore, login: &str) -> Result<usize> {
    let reports = store
        .list_reports(ReportFilter {
            owner_login: Some(login.to_string()),
            ..Default::default()
        })
        .await?;
    let count = reports.len();
    for report in reports {
        store.delete_report(report.id).await?;
    }
    Ok(count)
}

/// JSON-file-backed store for the standalone binary. Definitions are read
/// once at startup and persisted on every mutation.
pub struct FileReportStore {
    path: PathBuf,
    reports: Mutex<Vec<ReportDefinition>>,
}

impl FileReportStore {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let reports = if path.exists() {
            let content = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("reading report store {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("parsing report store {}", path.display()))?
        } else {
            info!("No report store found at {}, starting empty", path.display());
            Vec::new()
        };

        Ok(Self {
            path,
            reports: Mutex::new(reports),
        })
    }

    async fn persist(&self, reports: &[ReportDefinition]) -> Result<()> {
        let content = serde_json::to_string_pretty(reports)?;
        tokio::fs::write(&self.path, content)
            .await
            .with_context(|| format!("writing report store {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl ReportStore for FileReportStore {
    async fn list_reports(&self, filter: ReportFilter) -> Result<Vec<ReportDefinition>> {
        let reports = self.reports.lock().await;
        Ok(reports
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn get_report(&self, id: i64) -> Result<ReportDefinition> {
        let reports = self.reports.lock().await;
        reports
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no report with id {id}"))
    }

    async fn delete_report(&self, id: i64) -> Result<()> {
        let mut reports = self.reports.lock().await;
        let report = reports
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| anyhow::anyhow!("no report with id {id}"))?;
        report.deleted = true;
        let snapshot = reports.clone();
        drop(reports);
        self.persist(&snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::report::{Period, ReportFormat};

    fn report(id: i64, description: &str, segment_id: Option<i64>, deleted: bool) -> ReportDefinition {
        ReportDefinition {
            id,
            site_id: 1,
            owner_login: "admin".to_string(),
            description: description.to_string(),
            segment_id,
            period: Period::Day,
            hour: 0,
            channel_type: "email".to_string(),
            format: ReportFormat::Html,
            sub_report_ids: vec![],
            parameters: serde_json::json!({}),
            created_at: None,
            last_sent_at: None,
            deleted,
        }
    }

    async fn store_with(reports: Vec<ReportDefinition>) -> (tempfile::TempDir, FileReportStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports.json");
        std::fs::write(&path, serde_json::to_string(&reports).unwrap()).unwrap();
        let store = FileReportStore::load(&path).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn segment_guard_refuses_while_active_reports_reference_it() {
        let (_dir, store) = store_with(vec![
            report(1, "weekly traffic", Some(7), false),
            report(2, "old report", Some(7), true),
        ])
        .await;

        let err = guard_segment_deactivation(&store, 7).await.unwrap_err();
        match err.downcast_ref::<EngineError>() {
            Some(EngineError::SegmentInUse { reports }) => {
                assert_eq!(reports, "'weekly traffic'");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn segment_guard_allows_when_only_deleted_reports_reference_it() {
        let (_dir, store) = store_with(vec![report(2, "old report", Some(7), true)]).await;
        guard_segment_deactivation(&store, 7).await.unwrap();
    }

    #[tokio::test]
    async fn segment_guard_joins_multiple_descriptions() {
        let (_dir, store) = store_with(vec![
            report(1, "first", Some(3), false),
            report(2, "second", Some(3), false),
        ])
        .await;

        let err = guard_segment_deactivation(&store, 3).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "the segment is still used by the scheduled report(s) 'first' and 'second'"
        );
    }

    #[tokio::test]
    async fn delete_is_a_soft_delete_and_persists() {
        let (_dir, store) = store_with(vec![report(1, "traffic", None, false)]).await;
        store.delete_report(1).await.unwrap();

        let visible = store.list_reports(ReportFilter::default()).await.unwrap();
        assert!(visible.is_empty());

        let all = store
            .list_reports(ReportFilter {
                include_deleted: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].deleted);

        // a fresh load sees the soft-deleted record too
        let reloaded = FileReportStore::load(&store.path).await.unwrap();
        let all = reloaded
            .list_reports(ReportFilter {
                include_deleted: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(all[0].deleted);
    }

    #[tokio::test]
    async fn purge_helpers_delete_by_site_and_owner() {
        let mut other_site = report(3, "other site", None, false);
        other_site.site_id = 2;
        let mut other_owner = report(4, "other owner", None, false);
        other_owner.owner_login = "alice".to_string();

        let (_dir, store) = store_with(vec![
            report(1, "a", None, false),
            report(2, "b", None, false),
            other_site,
            other_owner,
        ])
        .await;

        assert_eq!(purge_site_reports(&store, 2).await.unwrap(), 1);
        assert_eq!(purge_user_reports(&store, "alice").await.unwrap(), 1);

        let remaining = store.list_reports(ReportFilter::default()).await.unwrap();
        assert_eq!(remaining.len(), 2);
    }
}
