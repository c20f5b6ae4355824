//! Records produced by each pipeline stage.
//!
//! Each stage hands its record read-only to the next stage and to the
//! aggregate [`PipelineRun`].

mod decision;
mod deployment;
mod run;
mod training;
mod validation;

pub use decision::{PromotionDecision, PromotionReason};
pub use deployment::{DeploymentResult, DeploymentStatus, RollbackReport};
pub use modelgate_core::training::TrainingRequest;
pub(crate) use run::RunRecorder;
pub use run::{AuditEntry, PipelineRun, RunMode};
pub use training::{TrainingResult, TrainingStatus};
pub use validation::{
    LatencyStats, ValidationReport, ValidationSample, ValidationStatus, default_samples,
};
