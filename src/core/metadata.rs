use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const CATALOG_JSON: &str = include_str!("catalog.json");

/// Category of internal-only sub-reports, never included in a dispatch.
pub const CATEGORY_API: &str = "API";
/// Category of the cross-site summary sub-reports.
pub const CATEGORY_MULTI_SITES: &str = "Multi Sites Summary";
/// The per-site variant of the cross-site summary. Redundant inside a
/// report that already has a site context, so it is filtered out.
pub const NAME_SINGLE_SITE_DASHBOARD: &str = "Single Website Dashboard";
/// Module owning the cross-site summary; its evolution columns get
/// stripped before rendering.
pub const MODULE_MULTI_SITES: &str = "MultiSites";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub key: String,
    pub label: String,
}

/// One named metric/table section available to reports of a site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubReportMeta {
    pub unique_id: String,
    pub module: String,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub dimension: Option<String>,
    #[serde(default)]
    pub graph_url: Option<String>,
    #[serde(default)]
    pub columns: Vec<Column>,
}

impl SubReportMeta {
    /// A sub-report with a grouping dimension aggregates rows instead of
    /// carrying one flat set of key metrics.
    pub fn is_aggregate(&self) -> bool {
        self.dimension.is_some()
    }
}

/// Maps a base metric to the derived column carrying its trend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiSiteMetric {
    pub metric: String,
    pub evolution_column: String,
}

/// Catalog of which sub-reports and metrics exist for a site. Implemented
/// outside the engine; the shipped implementation is compiled in.
#[async_trait]
pub trait MetadataCatalog: Send + Sync {
    async fn sub_reports_for_site(&self, site_id: i64) -> Result<Vec<SubReportMeta>>;
    fn multi_site_metrics(&self) -> Vec<MultiSiteMetric>;
}

/// Drop sub-reports a dispatched report never includes: the internal API
/// category, and the single-site variant of the multi-site summary.
pub fn filter_report_metadata(metadata: Vec<SubReportMeta>) -> Vec<SubReportMeta> {
    metadata
        .into_iter()
        .filter(|meta| {
            meta.category != CATEGORY_API
                && !(meta.category == CATEGORY_MULTI_SITES
                    && meta.name == NAME_SINGLE_SITE_DASHBOARD)
        })
        .collect()
}

/// Select the report's sub-reports in the report's own order. Ids that the
/// (filtered) catalog no longer offers are dropped.
pub fn select_ordered(
    metadata: &[SubReportMeta],
    sub_report_ids: &[String],
) -> Vec<SubReportMeta> {
    sub_report_ids
        .iter()
        .filter_map(|id| metadata.iter().find(|m| &m.unique_id == id))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogFile {
    sub_reports: Vec<SubReportMeta>,
    multi_site_metrics: Vec<MultiSiteMetric>,
}

/// Compiled-in catalog; every site gets the same section set.
pub struct StaticCatalog {
    catalog: CatalogFile,
}

impl StaticCatalog {
    pub fn load() -> Self {
        let catalog = serde_json::from_str(CATALOG_JSON).expect("catalog.json is invalid");
        Self { catalog }
    }
}

#[async_trait]
impl MetadataCatalog for StaticCatalog {
    async fn sub_reports_for_site(&self, _site_id: i64) -> Result<Vec<SubReportMeta>> {
        Ok(self.catalog.sub_reports.clone())
    }

    fn multi_site_metrics(&self) -> Vec<MultiSiteMetric> {
        self.catalog.multi_site_metrics.clone()
    }
}
