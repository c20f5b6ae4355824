//! Service backend selection.

use anyhow::Context;
use clap::{Args, ValueEnum};
use modelgate_core::endpoint::EndpointService;
use modelgate_core::training::TrainingService;
use modelgate_notify::webhook::{WebhookConfig, WebhookSink};
use modelgate_notify::{LogSink, NotificationService};
use modelgate_pipeline::PipelineConfig;
use modelgate_reqwest::{ControlPlaneClient, ControlPlaneConfig};

use crate::TRACING_TARGET_CONFIG;

/// Implementation of the training and endpoint services.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// REST control plane over HTTP.
    #[default]
    Http,
    /// In-memory providers for dry runs.
    Mock,
}

/// Backend configuration.
#[derive(Debug, Clone, Args)]
pub struct BackendArgs {
    /// Service backend
    #[arg(long, env = "BACKEND", value_enum, default_value_t = Backend::Http)]
    pub backend: Backend,

    /// Control plane connection.
    #[command(flatten)]
    pub control_plane: ControlPlaneConfig,

    /// Accuracy reported by the mock training service
    #[arg(long, env = "MOCK_ACCURACY", default_value_t = 0.97)]
    pub mock_accuracy: f64,
}

impl BackendArgs {
    /// Adjusts the pipeline configuration for the selected backend.
    ///
    /// The mock backend answers immediately, so its status polls are spaced
    /// one second apart.
    pub fn adjust(&self, config: &mut PipelineConfig) {
        if self.backend == Backend::Mock {
            config.poll_initial_secs = 1;
            config.poll_max_secs = 1;
        }
    }

    /// Creates the training and endpoint services.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created, or if the mock
    /// backend is selected in a build without the `mock` feature.
    pub fn create_services(&self) -> anyhow::Result<(TrainingService, EndpointService)> {
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            backend = ?self.backend,
            api_url = %self.control_plane.api_url,
            "Creating services"
        );

        match self.backend {
            Backend::Http => {
                let client = ControlPlaneClient::new(self.control_plane.clone())
                    .context("failed to create control-plane client")?;
                Ok((client.training_service(), client.endpoint_service()))
            }
            Backend::Mock => self.create_mock_services(),
        }
    }

    #[cfg(feature = "mock")]
    fn create_mock_services(&self) -> anyhow::Result<(TrainingService, EndpointService)> {
        use std::time::Duration;

        use modelgate_core::mock::{MockEndpointProvider, MockTrainingProvider};
        use serde_json::{Value, json};

        fn classify(payload: &Value) -> Value {
            let petal_length = payload[0][2].as_f64().unwrap_or_default();
            let class = if petal_length < 2.5 {
                0
            } else if petal_length < 4.85 {
                1
            } else {
                2
            };
            json!([class])
        }

        let training = MockTrainingProvider::succeeding(self.mock_accuracy);
        let endpoints = MockEndpointProvider::builder()
            .with_responder(classify)
            .with_latency(Duration::from_millis(20))
            .build();

        Ok((training.into_service(), endpoints.into_service()))
    }

    #[cfg(not(feature = "mock"))]
    fn create_mock_services(&self) -> anyhow::Result<(TrainingService, EndpointService)> {
        anyhow::bail!("the mock backend requires a build with the `mock` feature")
    }
}

/// Creates the notification sinks: the log sink, plus the webhook when a URL
/// is configured.
///
/// # Errors
///
/// Returns an error if the webhook client cannot be created.
pub fn create_notifications(webhook: &WebhookConfig) -> anyhow::Result<NotificationService> {
    let service = NotificationService::new().with_sink(LogSink);

    let sink = WebhookSink::from_config(webhook).context("failed to create webhook sink")?;
    Ok(match sink {
        Some(sink) => service.with_sink(sink),
        None => service,
    })
}
