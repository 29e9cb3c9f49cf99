use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Install the global subscriber. Level is taken from `REPORTWIRE_LOG`
/// when set, defaulting to info.
pub fn init() {
    let level = std::env::var("REPORTWIRE_LOG")
        .ok()
        .and_then(|v| v.parse::<Level>().ok())
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}
