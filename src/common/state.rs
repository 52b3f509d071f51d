use std::sync::Arc;

use crate::cache::StatusChannelTrait;
use crate::services::submission::SubmissionServiceTrait;

use super::config::Config;

#[derive(Clone)]
pub struct AppState {
    /// Global application configuration.
    pub config: Config,
    /// Service handling submission creation and reads.
    pub submission_service: Arc<dyn SubmissionServiceTrait>,
    /// Live status fan-out, consumed by the websocket gateway.
    pub status_channel: Arc<dyn StatusChannelTrait>,
}

impl AppState {
    pub fn new(
        config: Config,
        submission_service: Arc<dyn SubmissionServiceTrait>,
        status_channel: Arc<dyn StatusChannelTrait>,
    ) -> Self {
        Self {
            config,
            submission_service,
            status_channel,
        }
    }
}
