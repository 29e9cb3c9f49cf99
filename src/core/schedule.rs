use chrono::{DateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use tracing::warn;

use crate::core::report::{Period, ReportDefinition};
use crate::core::sites::SiteDirectory;

/// One report's place in the recurring schedule: the cron cadence plus the
/// dispatch hour already translated to UTC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedDispatch {
    pub report_id: i64,
    pub period: Period,
    pub hour_utc: u8,
    pub cron: String,
}

/// Reference instant for reading a site's UTC offset: midnight UTC on an
/// arbitrary fixed date. Using a constant keeps planning deterministic
/// across passes.
const REFERENCE_UTC_MIDNIGHT: (i32, u32, u32) = (2011, 1, 1);

/// Translate a site-local dispatch hour into the UTC hour at which
/// "site-local `hour`:00" occurs.
pub fn utc_dispatch_hour(hour: u8, tz: Tz) -> u8 {
    let (y, m, d) = REFERENCE_UTC_MIDNIGHT;
    let reference: DateTime<Utc> = Utc
        .with_ymd_and_hms(y, m, d, 0, 0, 0)
        .single()
        .expect("reference instant is a valid UTC timestamp");

    // hour-of-day the site's clock shows at UTC midnight, ie how many
    // hours site-local midnight runs ahead of UTC midnight (wrapping)
    let local_offset_hours = reference.with_timezone(&tz).hour();

    ((24 - local_offset_hours + hour as u32) % 24) as u8
}

/// Six-field cron line (sec min hour dom month dow) understood by the
/// task runner. `Never` has no cadence. Weekly reports go out Mondays,
/// monthly on the 1st, yearly on Jan 1st; `Range` reports recur daily.
pub fn cron_for(period: Period, hour_utc: u8) -> Option<String> {
    match period {
        Period::Never => None,
        Period::Day | Period::Range => Some(format!("0 0 {hour_utc} * * *")),
        Period::Week => Some(format!("0 0 {hour_utc} * * Mon")),
        Period::Month => Some(format!("0 0 {hour_utc} 1 * *")),
        Period::Year => Some(format!("0 0 {hour_utc} 1 1 *")),
    }
}

/// Derive the schedule for every schedulable report. A timezone lookup
/// failure skips that single report with a warning instead of aborting
/// the planning pass.
pub fn plan_dispatches(
    reports: &[ReportDefinition],
    sites: &dyn SiteDirectory,
) -> Vec<PlannedDispatch> {
    let mut planned = Vec::new();
    for report in reports {
        if !report.is_schedulable() {
            continue;
        }

        if report.hour > 23 {
            warn!(
                "Skipping schedule for report {} ('{}'): dispatch hour {} is out of range",
                report.id, report.description, report.hour
            );
            continue;
        }

        let tz = match sites.timezone_for(report.site_id) {
            Ok(tz) => tz,
            Err(e) => {
                warn!(
                    "Skipping schedule for report {} ('{}'): {}",
                    report.id, report.description, e
                );
                continue;
            }
        };

        let hour_utc = utc_dispatch_hour(report.hour, tz);
        let Some(cron) = cron_for(report.period, hour_utc) else {
            continue;
        };

        planned.push(PlannedDispatch {
            report_id: report.id,
            period: report.period,
            hour_utc,
            cron,
        });
    }
    planned
}
