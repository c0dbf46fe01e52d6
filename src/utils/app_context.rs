//! Everything a command needs, built once from [`Config`].

use eyre::Result;
use log::{info, warn};

use crate::arb::pipeline::{Pipeline, PipelineConfig};
use crate::config::Config;
use crate::notify::SlackNotifier;
use crate::sync::Catalog;

/// Process-wide context: configuration and the components built from it.
#[derive(Debug)]
pub struct AppContext {
    /// Environment configuration
    pub config: Config,
    /// Pipeline parameters after environment overrides
    pub pipeline_config: PipelineConfig,
    /// Notifier, when a Slack token is configured
    pub notifier: Option<SlackNotifier>,
}

impl AppContext {
    /// Reads the environment and the optional pipeline config file.
    ///
    /// # Errors
    /// * If an environment variable is malformed
    /// * If the pipeline config file cannot be read
    pub fn new() -> Result<Self> {
        Self::from_config(Config::from_env()?)
    }

    /// Builds the context for `config`.
    ///
    /// # Errors
    /// * If the pipeline config file cannot be read
    pub fn from_config(config: Config) -> Result<Self> {
        let mut pipeline_config = match &config.pipeline_config {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(max_age) = config.max_snapshot_age_secs {
            pipeline_config.max_snapshot_age_secs = max_age;
        }

        let notifier = match &config.slack_token {
            Some(token) => Some(SlackNotifier::new(token.clone())?),
            None => {
                info!("app: SLACK_OAUTH_TOKEN not set, notifications disabled");
                None
            }
        };

        Ok(Self {
            config,
            pipeline_config,
            notifier,
        })
    }

    /// A pipeline for the configured parameters.
    ///
    /// # Errors
    /// * If the ranker's price table is invalid
    pub fn pipeline(&self) -> Result<Pipeline> {
        Pipeline::new(self.pipeline_config.clone())
    }

    /// The configured catalog.
    ///
    /// # Errors
    /// * If the file is missing or malformed
    pub fn catalog(&self) -> Result<Catalog> {
        Catalog::from_file(&self.config.catalog)
    }

    /// Posts `message`, logging instead of failing when Slack is down.
    pub async fn notify(&self, message: &str) {
        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.send(message).await {
                warn!("app: slack notification failed: {e}");
            }
        }
    }
}

