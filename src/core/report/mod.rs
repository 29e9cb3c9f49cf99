pub mod parameters;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use parameters::{ReportParameters, validate_parameters};

/// Recurrence granularity of a scheduled report. `Never` disables
/// scheduling without deleting the definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Never,
    Day,
    Week,
    Month,
    Year,
    Range,
}

impl Period {
    pub fn as_str(self) -> &'static str {
        match self {
            Period::Never => "never",
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
            Period::Year => "year",
            Period::Range => "range",
        }
    }

    #[allow(dead_code)]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "never" => Some(Period::Never),
            "day" => Some(Period::Day),
            "week" => Some(Period::Week),
            "month" => Some(Period::Month),
            "year" => Some(Period::Year),
            "range" => Some(Period::Range),
            _ => None,
        }
    }

    /// Wording used in mail bodies, ie "your weekly report".
    pub fn adjective(self) -> &'static str {
        match self {
            Period::Never => "one-off",
            Period::Day => "daily",
            Period::Week => "weekly",
            Period::Month => "monthly",
            Period::Year => "yearly",
            Period::Range => "range",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    Html,
    Pdf,
}

impl ReportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportFormat::Html => "html",
            ReportFormat::Pdf => "pdf",
        }
    }

    pub fn extension(self) -> &'static str {
        self.as_str()
    }
}

/// Controls table-vs-graph rendering across all sub-reports of one report.
/// Codes are stable: they are what gets persisted in the parameter bag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayFormat {
    GraphsOnlyForKeyMetrics,
    GraphsOnly,
    TablesAndGraphs,
    TablesOnly,
}

impl DisplayFormat {
    pub const DEFAULT: DisplayFormat = DisplayFormat::GraphsOnlyForKeyMetrics;

    pub fn code(self) -> u8 {
        match self {
            DisplayFormat::GraphsOnlyForKeyMetrics => 1,
            DisplayFormat::GraphsOnly => 2,
            DisplayFormat::TablesAndGraphs => 3,
            DisplayFormat::TablesOnly => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(DisplayFormat::GraphsOnlyForKeyMetrics),
            2 => Some(DisplayFormat::GraphsOnly),
            3 => Some(DisplayFormat::TablesAndGraphs),
            4 => Some(DisplayFormat::TablesOnly),
            _ => None,
        }
    }

    pub fn all() -> [DisplayFormat; 4] {
        [
            DisplayFormat::GraphsOnlyForKeyMetrics,
            DisplayFormat::GraphsOnly,
            DisplayFormat::TablesAndGraphs,
            DisplayFormat::TablesOnly,
        ]
    }

    #[allow(dead_code)]
    pub fn label(self) -> &'static str {
        match self {
            DisplayFormat::GraphsOnlyForKeyMetrics => "Graphs only for key metrics",
            DisplayFormat::GraphsOnly => "Graphs only for all reports",
            DisplayFormat::TablesAndGraphs => "Tables and graphs for all reports",
            DisplayFormat::TablesOnly => "Tables only for all reports",
        }
    }
}

/// Persisted recurrence + content + delivery configuration for one site.
/// Dispatch consumes a read-only snapshot of this record; scheduling state
/// is derived on every planning pass, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportDefinition {
    pub id: i64,
    pub site_id: i64,
    pub owner_login: String,
    pub description: String,
    #[serde(default)]
    pub segment_id: Option<i64>,
    pub period: Period,
    pub hour: u8,
    pub channel_type: String,
    pub format: ReportFormat,
    pub sub_report_ids: Vec<String>,
    #[serde(default)]
    pub parameters: serde_json::Value,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_sent_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted: bool,
}

impl ReportDefinition {
    /// A report is schedulable when it is not soft-deleted and actually
    /// recurs.
    pub fn is_schedulable(&self) -> bool {
        !self.deleted && self.period != Period::Never
    }
}
