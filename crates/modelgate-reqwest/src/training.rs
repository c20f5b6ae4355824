//! Training service over HTTP.

use modelgate_core::training::{JobStatus, JobSummary, TrainingProvider, TrainingRequest};
use reqwest::Method;
use serde::Deserialize;

use crate::client::ControlPlaneClient;

/// Body returned by `POST /training-jobs`.
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    job_id: String,
}

/// Body returned by `GET /training-jobs`.
#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    jobs: Vec<JobSummary>,
}

#[async_trait::async_trait]
impl TrainingProvider for ControlPlaneClient {
    async fn submit(&self, request: &TrainingRequest) -> modelgate_core::Result<String> {
        let url = self.url(&["training-jobs"])?;
        let response: SubmitResponse = self
            .send_json(self.request(Method::POST, url).json(request))
            .await?;
        Ok(response.job_id)
    }

    async fn get_status(&self, job_id: &str) -> modelgate_core::Result<JobStatus> {
        let url = self.url(&["training-jobs", job_id])?;
        Ok(self.send_json(self.request(Method::GET, url)).await?)
    }

    async fn list_jobs(&self) -> modelgate_core::Result<Vec<JobSummary>> {
        let url = self.url(&["training-jobs"])?;
        let response: ListResponse = self.send_json(self.request(Method::GET, url)).await?;
        Ok(response.jobs)
    }
}

#[cfg(test)]
mod tests {
    use modelgate_core::ErrorKind;
    use modelgate_core::training::JobState;

    use super::*;
    use crate::config::ControlPlaneConfig;
    use crate::testing::ControlPlane;

    fn client(server: &ControlPlane) -> ControlPlaneClient {
        ControlPlaneClient::new(ControlPlaneConfig::new(server.url())).unwrap()
    }

    #[tokio::test]
    async fn test_submit_posts_request() {
        let server = ControlPlane::start(vec![(201, r#"{"job_id":"job-42"}"#)]).await;
        let config = ControlPlaneConfig::new(server.url()).with_token("s3cr3t");
        let client = ControlPlaneClient::new(config).unwrap();
        let request = TrainingRequest::new("iris-classifier", "ml.m5.large", "data/train")
            .with_job_name("iris-classifier-20250101-000000")
            .with_hyperparameter("max_depth", 10);

        let job_id = client.training_service().submit(&request).await.unwrap();
        assert_eq!(job_id, "job-42");

        let received = server.received();
        assert_eq!(received[0].method, "POST");
        assert_eq!(received[0].path, "/training-jobs");
        assert_eq!(received[0].authorization.as_deref(), Some("Bearer s3cr3t"));
        assert!(received[0].body.contains(r#""job_name":"iris-classifier-20250101-000000""#));
        assert!(received[0].body.contains(r#""max_depth":10"#));
    }

    #[tokio::test]
    async fn test_get_status_decodes_job() {
        let body = r#"{"job_id":"job-42","state":"succeeded","metrics":{"accuracy":0.97},"artifact_location":"s3://models/job-42.tar.gz"}"#;
        let server = ControlPlane::start(vec![(200, body)]).await;

        let status = client(&server)
            .training_service()
            .get_status("job-42")
            .await
            .unwrap();

        assert_eq!(status.state, JobState::Succeeded);
        assert_eq!(status.metrics["accuracy"], 0.97);
        assert_eq!(
            status.artifact_location.as_deref(),
            Some("s3://models/job-42.tar.gz")
        );

        let received = server.received();
        assert_eq!(received[0].method, "GET");
        assert_eq!(received[0].path, "/training-jobs/job-42");
        assert!(received[0].authorization.is_none());
    }

    #[tokio::test]
    async fn test_list_jobs() {
        let body = r#"{"jobs":[
            {"job_id":"iris-classifier-1","state":"succeeded","created_at":"2025-01-01T00:00:00Z"},
            {"job_id":"iris-classifier-2","state":"in_progress","created_at":"2025-01-02T00:00:00Z"}
        ]}"#;
        let server = ControlPlane::start(vec![(200, body)]).await;

        let jobs = client(&server).training_service().list_jobs().await.unwrap();

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].state, JobState::Succeeded);
        assert_eq!(jobs[1].job_id, "iris-classifier-2");
        assert_eq!(server.received()[0].path, "/training-jobs");
    }

    #[tokio::test]
    async fn test_server_errors_are_retryable() {
        let server = ControlPlane::start(vec![(503, r#"{"error":"maintenance"}"#)]).await;

        let error = client(&server)
            .training_service()
            .get_status("job-42")
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::ServiceUnavailable);
        assert!(error.is_retryable());
    }

    #[tokio::test]
    async fn test_malformed_status_is_serialization_error() {
        let server = ControlPlane::start(vec![(200, r#"{"state":"exploded"}"#)]).await;

        let error = client(&server)
            .training_service()
            .get_status("job-42")
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Serialization);
        assert!(!error.is_retryable());
    }
}
