use anyhow::{Result, anyhow};
use chrono_tz::Tz;
use std::collections::HashMap;

/// Site lookups the engine needs: the timezone driving hour conversion and
/// the display name used in report titles.
pub trait SiteDirectory: Send + Sync {
    fn timezone_for(&self, site_id: i64) -> Result<Tz>;
    fn site_name(&self, site_id: i64) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct SiteEntry {
    pub id: i64,
    pub name: String,
    pub timezone: String,
}

/// Configuration-backed directory for the standalone binary.
pub struct StaticSiteDirectory {
    sites: HashMap<i64, SiteEntry>,
}

impl StaticSiteDirectory {
    pub fn new(entries: Vec<SiteEntry>) -> Self {
        let sites = entries.into_iter().map(|e| (e.id, e)).collect();
        Self { sites }
    }

    fn entry(&self, site_id: i64) -> Result<&SiteEntry> {
        self.sites
            .get(&site_id)
            .ok_or_else(|| anyhow!("unknown site {site_id}"))
    }
}

impl SiteDirectory for StaticSiteDirectory {
    fn timezone_for(&self, site_id: i64) -> Result<Tz> {
        let entry = self.entry(site_id)?;
        entry
            .timezone
            .parse::<Tz>()
            .map_err(|_| anyhow!("site {site_id} has invalid timezone '{}'", entry.timezone))
    }

    fn site_name(&self, site_id: i64) -> Result<String> {
        Ok(self.entry(site_id)?.name.clone())
    }
}
