//! Run selection.

use std::path::PathBuf;

use clap::Args;
use modelgate_pipeline::{RunMode, RunPlan};

/// Which run to execute and where to record it.
#[derive(Debug, Clone, Default, Args)]
pub struct RunArgs {
    /// Pipeline mode to run
    #[arg(long, env = "PIPELINE_MODE", value_enum, default_value_t = RunMode::Complete)]
    pub mode: RunMode,

    /// Role or credential reference the training job assumes
    #[arg(long, env = "TRAINING_ROLE")]
    pub role_ref: Option<String>,

    /// Training job to deploy; the latest completed job when unset (deployment mode)
    #[arg(long, env = "TRAINING_JOB")]
    pub training_job: Option<String>,

    /// Endpoint to validate; the production endpoint when unset (testing mode)
    #[arg(long, env = "ENDPOINT_NAME")]
    pub endpoint_name: Option<String>,

    /// Current production endpoint; discovered by prefix when unset
    #[arg(long, env = "PRODUCTION_ENDPOINT")]
    pub production_endpoint: Option<String>,

    /// File the JSON run record is written to
    #[arg(long, env = "OUTPUT_FILE")]
    pub output_file: Option<PathBuf>,
}

impl RunArgs {
    /// Builds the run plan for the selected mode.
    ///
    /// Identifiers a mode does not use are ignored. A missing training job
    /// or endpoint name is looked up when the run starts.
    pub fn plan(&self) -> RunPlan {
        match self.mode {
            RunMode::Complete => RunPlan::Complete {
                role: self.role_ref.clone(),
                production_endpoint: self.production_endpoint.clone(),
            },
            RunMode::Training => RunPlan::Training {
                role: self.role_ref.clone(),
            },
            RunMode::Deployment => RunPlan::Deployment {
                job_id: self.training_job.clone(),
                production_endpoint: self.production_endpoint.clone(),
            },
            RunMode::Testing => RunPlan::Testing {
                endpoint_name: self.endpoint_name.clone(),
            },
        }
    }
}
