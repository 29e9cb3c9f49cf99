mod daemon;
mod reports;

use anyhow::Result;
use console::style;
use std::sync::Arc;

use crate::core::channel::ChannelRegistry;
use crate::core::config::EngineConfig;
use crate::core::dispatch::DispatchOrchestrator;
use crate::core::metadata::StaticCatalog;
use crate::core::render::HtmlRenderer;
use crate::core::report::store::FileReportStore;
use crate::core::terminal::{self, GuideSection};
use crate::interfaces::email::{EmailChannel, MailSettings, OutboxTransport};

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("help");

    match command {
        "daemon" => daemon::run(&args).await,
        "reports" => reports::list(&args).await,
        "recipients" => reports::recipients(&args).await,
        "send" => reports::send(&args).await,
        "deactivate-segment" => reports::deactivate_segment(&args).await,
        "purge-site" => reports::purge_site(&args).await,
        "purge-user" => reports::purge_user(&args).await,
        _ => {
            print_help();
            Ok(())
        }
    }
}

fn print_help() {
    terminal::print_banner();

    GuideSection::new("Dispatch")
        .command("daemon", "Run the scheduler and dispatch reports on time")
        .command("send <id>", "Dispatch one report immediately")
        .print();

    GuideSection::new("Inspection")
        .command("reports", "List the stored report definitions")
        .command("recipients <id>", "Preview the resolved recipient list")
        .print();

    GuideSection::new("Maintenance")
        .command("deactivate-segment <id>", "Check that no active report blocks a segment")
        .command("purge-site <id>", "Delete every report of a removed site")
        .command("purge-user <login>", "Delete every report of a removed user")
        .print();

    println!(
        " {} {} <command> [--config <path>]\n",
        style("Usage:").bold(),
        style("reportwire").green()
    );
}

/// Path of the config file, `--config <path>` or the working-directory
/// default.
pub(crate) fn config_path(args: &[String]) -> String {
    let mut i = 2;
    while i < args.len() {
        if args[i] == "--config" && i + 1 < args.len() {
            return args[i + 1].clone();
        }
        i += 1;
    }
    "./reportwire.toml".to_string()
}

/// Wire the orchestrator with the configuration-backed collaborators.
pub(crate) async fn build_orchestrator(config: &EngineConfig) -> Result<DispatchOrchestrator> {
    let store = Arc::new(FileReportStore::load(&config.store.path).await?);
    let transport = Arc::new(OutboxTransport::new(config.mail.outbox_dir.clone().into()));

    let mut channels = ChannelRegistry::new();
    channels.register(Arc::new(EmailChannel::new(
        transport,
        MailSettings {
            from_address: config.mail.from_address.clone(),
            from_name: config.mail.from_name.clone(),
        },
        config.graphics.graphing_capable,
        config.mail.suppress_delivery_errors,
    )));
    tracing::info!("Report channels available: {}", channels.types().join(", "));

    Ok(DispatchOrchestrator::new(
        store,
        Arc::new(StaticCatalog::load()),
        Arc::new(HtmlRenderer),
        Arc::new(config.user_directory()),
        Arc::new(config.site_directory()),
        channels,
        config.segment_names(),
    ))
}
