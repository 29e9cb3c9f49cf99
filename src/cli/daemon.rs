use anyhow::Result;
use std::sync::Arc;
use tokio_cron_scheduler::JobScheduler;
use tracing::{error, info};

use crate::core::config::EngineConfig;
use crate::core::dispatch::DispatchOutcome;
use crate::core::terminal::{print_info, print_success};

/// Run the dispatch daemon: derive the schedule for every stored report,
/// register one cron job per report, and serve until interrupted.
pub async fn run(args: &[String]) -> Result<()> {
    let config = EngineConfig::load(super::config_path(args)).await?;
    let orchestrator = Arc::new(super::build_orchestrator(&config).await?);

    let planned = orchestrator.planned_dispatches().await?;
    print_info(&format!(
        "Planned {} scheduled dispatch(es)",
        planned.len()
    ));

    let mut scheduler = JobScheduler::new().await?;

    for dispatch in planned {
        info!(
            "Scheduling report {} ({}, {:02}:00 UTC): {}",
            dispatch.report_id,
            dispatch.period.as_str(),
            dispatch.hour_utc,
            dispatch.cron
        );

        let orch = orchestrator.clone();
        let report_id = dispatch.report_id;

        match tokio_cron_scheduler::Job::new_async(dispatch.cron.as_str(), move |_uuid, mut _l| {
            let orch = orch.clone();
            Box::pin(async move {
                match orch.dispatch(report_id).await {
                    Ok(DispatchOutcome::Delivered { recipients }) => {
                        info!("Report {} delivered to {} recipient(s)", report_id, recipients);
                    }
                    Ok(DispatchOutcome::Skipped) => {
                        info!("Report {} skipped (owner not resolvable)", report_id);
                    }
                    Err(e) => {
                        error!("Dispatch of report {} failed: {}", report_id, e);
                    }
                }
            })
        }) {
            Ok(job) => {
                if let Err(e) = scheduler.add(job).await {
                    error!("Failed to register job for report {}: {}", report_id, e);
                }
            }
            Err(e) => {
                error!("Failed to create job for report {}: {}", report_id, e);
            }
        }
    }

    scheduler.start().await?;
    print_success("Scheduler running. Press Ctrl-C to stop.");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down scheduler");
    scheduler.shutdown().await?;
    Ok(())
}
