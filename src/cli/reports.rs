use anyhow::{Result, bail};
use console::style;

use crate::core::config::EngineConfig;
use crate::core::dispatch::DispatchOutcome;
use crate::core::report::store::{
    FileReportStore, guard_segment_deactivation, purge_site_reports, purge_user_reports,
};
use crate::core::terminal::{print_info, print_success, print_warn};

pub async fn list(args: &[String]) -> Result<()> {
    let config = EngineConfig::load(super::config_path(args)).await?;
    let orchestrator = super::build_orchestrator(&config).await?;

    let planned = orchestrator.planned_dispatches().await?;
    if planned.is_empty() {
        print_info("No schedulable reports found.");
        return Ok(());
    }

    println!(
        " {:<6} {:<8} {:>10} {}",
        style("id").bold(),
        style("period").bold(),
        style("hour(UTC)").bold(),
        style("cron").bold()
    );
    for dispatch in planned {
        println!(
            " {:<6} {:<8} {:>10} {}",
            dispatch.report_id,
            dispatch.period.as_str(),
            format!("{:02}:00", dispatch.hour_utc),
            dispatch.cron
        );
    }
    Ok(())
}

pub async fn recipients(args: &[String]) -> Result<()> {
    let id = report_id_arg(args)?;
    let config = EngineConfig::load(super::config_path(args)).await?;
    let orchestrator = super::build_orchestrator(&config).await?;

    match orchestrator.preview_recipients(id).await? {
        None => print_warn("The report owner cannot be resolved; a dispatch would be skipped."),
        Some(emails) if emails.is_empty() => print_info("No recipients."),
        Some(emails) => {
            for email in emails {
                println!(" {}", email);
            }
        }
    }
    Ok(())
}

pub async fn send(args: &[String]) -> Result<()> {
    let id = report_id_arg(args)?;
    let config = EngineConfig::load(super::config_path(args)).await?;
    let orchestrator = super::build_orchestrator(&config).await?;

    match orchestrator.dispatch(id).await? {
        DispatchOutcome::Delivered { recipients } => {
            print_success(&format!("Report {id} delivered to {recipients} recipient(s)."));
        }
        DispatchOutcome::Skipped => {
            print_warn(&format!("Report {id} skipped: owner not resolvable."));
        }
    }
    Ok(())
}

/// Pre-check before an external segment deactivation: fails while any
/// active report still references the segment.
pub async fn deactivate_segment(args: &[String]) -> Result<()> {
    let id = numeric_arg(args, "segment id")?;
    let config = EngineConfig::load(super::config_path(args)).await?;
    let store = FileReportStore::load(&config.store.path).await?;

    guard_segment_deactivation(&store, id).await?;
    print_success(&format!("Segment {id} is not referenced by any active report."));
    Ok(())
}

pub async fn purge_site(args: &[String]) -> Result<()> {
    let id = numeric_arg(args, "site id")?;
    let config = EngineConfig::load(super::config_path(args)).await?;
    let store = FileReportStore::load(&config.store.path).await?;

    let count = purge_site_reports(&store, id).await?;
    print_success(&format!("Deleted {count} report(s) of site {id}."));
    Ok(())
}

pub async fn purge_user(args: &[String]) -> Result<()> {
    let Some(login) = args.get(2) else {
        bail!("expected a user login, eg: reportwire purge-user alice");
    };
    let config = EngineConfig::load(super::config_path(args)).await?;
    let store = FileReportStore::load(&config.store.path).await?;

    let count = purge_user_reports(&store, login).await?;
    print_success(&format!("Deleted {count} report(s) owned by '{login}'."));
    Ok(())
}

fn numeric_arg(args: &[String], what: &str) -> Result<i64> {
    match args.get(2).map(|s| s.parse::<i64>()) {
        Some(Ok(id)) => Ok(id),
        _ => bail!("expected a numeric {what}"),
    }
}

fn report_id_arg(args: &[String]) -> Result<i64> {
    numeric_arg(args, "report id")
}
