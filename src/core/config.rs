use anyhow::Result;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::core::recipients::StaticUserDirectory;
use crate::core::sites::{SiteEntry, StaticSiteDirectory};

#[derive(Debug, Clone, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub mail: MailConfig,

    #[serde(default)]
    pub graphics: GraphicsConfig,

    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub sites: Vec<SiteConfig>,

    #[serde(default)]
    pub users: Vec<UserConfig>,

    #[serde(default)]
    pub segments: Vec<SegmentConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    #[serde(default = "default_from_address")]
    pub from_address: String,

    #[serde(default = "default_from_name")]
    pub from_name: String,

    #[serde(default = "default_outbox_dir")]
    pub outbox_dir: String,

    /// Swallow per-recipient transport failures instead of raising them.
    /// Matches the diagnostic mode of the hosting installation.
    #[serde(default)]
    pub suppress_delivery_errors: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphicsConfig {
    /// Whether the host can rasterize charts at all.
    #[serde(default = "default_true")]
    pub graphing_capable: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_current_user")]
    pub current_user: String,

    #[serde(default)]
    pub current_email: String,

    #[serde(default = "default_super_user")]
    pub super_user: String,

    #[serde(default)]
    pub super_email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    pub id: i64,
    pub name: String,
    pub timezone: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserConfig {
    pub login: String,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SegmentConfig {
    pub id: i64,
    pub name: String,
}

fn default_from_address() -> String {
    "noreply@localhost".to_string()
}
fn default_from_name() -> String {
    "Analytics Reports".to_string()
}
fn default_outbox_dir() -> String {
    "./outbox".to_string()
}
fn default_store_path() -> String {
    "./reports.json".to_string()
}
fn default_current_user() -> String {
    "admin".to_string()
}
fn default_super_user() -> String {
    "superuser".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            from_address: default_from_address(),
            from_name: default_from_name(),
            outbox_dir: default_outbox_dir(),
            suppress_delivery_errors: false,
        }
    }
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            graphing_capable: true,
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            current_user: default_current_user(),
            current_email: String::new(),
            super_user: default_super_user(),
            super_email: String::new(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl EngineConfig {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("No config found at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(path).await?;
        let config: EngineConfig = toml::from_str(&content)?;
        info!(
            "Loaded config: {} site(s), {} user(s), outbox {}",
            config.sites.len(),
            config.users.len(),
            config.mail.outbox_dir
        );
        Ok(config)
    }

    pub fn site_directory(&self) -> StaticSiteDirectory {
        StaticSiteDirectory::new(
            self.sites
                .iter()
                .map(|s| SiteEntry {
                    id: s.id,
                    name: s.name.clone(),
                    timezone: s.timezone.clone(),
                })
                .collect(),
        )
    }

    pub fn user_directory(&self) -> StaticUserDirectory {
        StaticUserDirectory::new(
            self.identity.current_user.clone(),
            self.identity.current_email.clone(),
            self.identity.super_user.clone(),
            self.identity.super_email.clone(),
            self.users
                .iter()
                .map(|u| (u.login.clone(), u.email.clone()))
                .collect(),
        )
    }

    pub fn segment_names(&self) -> HashMap<i64, String> {
        self.segments
            .iter()
            .map(|s| (s.id, s.name.clone()))
            .collect()
    }
}
