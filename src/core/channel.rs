use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::core::dispatch::DispatchContext;
use crate::core::display::DisplayCapabilities;
use crate::core::errors::EngineError;
use crate::core::render::RenderedReport;
use crate::core::report::{ReportFormat, ReportParameters};

/// A delivery channel: what counts as valid parameters, which output
/// formats it accepts, and how a rendered report leaves the system.
/// New channels register into the [`ChannelRegistry`] at startup.
#[async_trait]
pub trait Channel: Send + Sync {
    fn channel_type(&self) -> &'static str;

    fn formats(&self) -> Vec<ReportFormat>;

    fn validate_parameters(&self, raw: &Value) -> Result<ReportParameters, EngineError>;

    /// Rendering capabilities the display policy should assume for
    /// reports delivered through this channel.
    fn display_capabilities(&self) -> DisplayCapabilities;

    async fn deliver(
        &self,
        ctx: &DispatchContext,
        rendered: &RenderedReport,
        recipients: &[String],
    ) -> Result<(), EngineError>;
}

/// Maps channel type ids to implementations. Owned by the orchestrator;
/// there is no process-wide registry to mutate.
#[derive(Default)]
pub struct ChannelRegistry {
    channels: HashMap<String, Arc<dyn Channel>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, channel: Arc<dyn Channel>) {
        info!("Registered report channel: {}", channel.channel_type());
        self.channels
            .insert(channel.channel_type().to_string(), channel);
    }

    pub fn get(&self, channel_type: &str) -> Result<Arc<dyn Channel>, EngineError> {
        self.channels
            .get(channel_type)
            .cloned()
            .ok_or_else(|| EngineError::UnknownChannel(channel_type.to_string()))
    }

    pub fn types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.channels.keys().cloned().collect();
        types.sort();
        types
    }
}
