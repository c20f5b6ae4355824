//! Scripted in-memory endpoint provider.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use jiff::Timestamp;
use serde_json::{Value, json};

use crate::endpoint::{
    EndpointProvider, EndpointService, EndpointSpec, EndpointState, EndpointStatus,
    EndpointSummary,
};
use crate::{Error, Result};

/// Computes the prediction returned for one invocation payload.
pub type Responder = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

#[derive(Debug)]
struct MockEndpoint {
    states: VecDeque<EndpointState>,
    created_at: Timestamp,
}

impl MockEndpoint {
    fn current(&self) -> EndpointState {
        self.states.front().copied().unwrap_or(EndpointState::Failed)
    }

    fn advance(&mut self) -> EndpointState {
        if self.states.len() > 1 {
            self.states.pop_front();
        }
        self.current()
    }
}

struct MockEndpointInner {
    endpoints: Mutex<BTreeMap<String, MockEndpoint>>,
    creation_states: Vec<EndpointState>,
    responder: Responder,
    latency: Duration,
    fail_create: bool,
    fail_invoke: bool,
    fail_delete: bool,
    deleted: Mutex<Vec<String>>,
    create_calls: AtomicUsize,
    status_calls: AtomicUsize,
    invoke_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

/// Endpoint provider backed by an in-memory table of endpoints.
///
/// Newly created endpoints walk through the configured creation states, one
/// state per `get_status` call, and then stay in the last one. Clones share
/// the table and the call counters.
#[derive(Clone)]
pub struct MockEndpointProvider {
    inner: Arc<MockEndpointInner>,
}

impl fmt::Debug for MockEndpointProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockEndpointProvider")
            .field("creation_states", &self.inner.creation_states)
            .field("latency", &self.inner.latency)
            .finish_non_exhaustive()
    }
}

impl Default for MockEndpointProvider {
    fn default() -> Self {
        MockEndpointBuilder::default().build()
    }
}

impl MockEndpointProvider {
    /// Returns a builder for a customised provider.
    pub fn builder() -> MockEndpointBuilder {
        MockEndpointBuilder::default()
    }

    /// Number of `create_endpoint` calls received.
    pub fn create_calls(&self) -> usize {
        self.inner.create_calls.load(Ordering::SeqCst)
    }

    /// Number of `get_status` calls received.
    pub fn status_calls(&self) -> usize {
        self.inner.status_calls.load(Ordering::SeqCst)
    }

    /// Number of `invoke` calls received.
    pub fn invoke_calls(&self) -> usize {
        self.inner.invoke_calls.load(Ordering::SeqCst)
    }

    /// Number of `delete_endpoint` calls received.
    pub fn delete_calls(&self) -> usize {
        self.inner.delete_calls.load(Ordering::SeqCst)
    }

    /// Names of endpoints deleted so far.
    pub fn deleted(&self) -> Vec<String> {
        self.inner
            .deleted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the current state of an endpoint without advancing it.
    pub fn state_of(&self, endpoint: &str) -> Option<EndpointState> {
        self.endpoints().get(endpoint).map(MockEndpoint::current)
    }

    /// Converts this provider into an [`EndpointService`].
    pub fn into_service(self) -> EndpointService {
        EndpointService::new(self)
    }

    fn endpoints(&self) -> MutexGuard<'_, BTreeMap<String, MockEndpoint>> {
        self.inner
            .endpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl EndpointProvider for MockEndpointProvider {
    async fn create_endpoint(&self, spec: &EndpointSpec) -> Result<String> {
        self.inner.create_calls.fetch_add(1, Ordering::SeqCst);

        if self.inner.fail_create {
            return Err(Error::external_error().with_message("mock capacity exhausted"));
        }

        let mut endpoints = self.endpoints();
        if endpoints.contains_key(&spec.name) {
            return Err(Error::invalid_input()
                .with_message(format!("endpoint {} already exists", spec.name)));
        }

        endpoints.insert(
            spec.name.clone(),
            MockEndpoint {
                states: self.inner.creation_states.iter().copied().collect(),
                created_at: Timestamp::now(),
            },
        );

        Ok(spec.name.clone())
    }

    async fn get_status(&self, endpoint: &str) -> Result<EndpointStatus> {
        self.inner.status_calls.fetch_add(1, Ordering::SeqCst);

        let mut endpoints = self.endpoints();
        let entry = endpoints
            .get_mut(endpoint)
            .ok_or_else(|| Error::not_found().with_message(format!("endpoint {endpoint}")))?;

        let state = entry.advance();
        let status = EndpointStatus::new(endpoint, state);
        Ok(match state {
            EndpointState::Failed => status.with_failure_reason("mock provisioning failure"),
            _ => status,
        })
    }

    async fn list_endpoints(&self) -> Result<Vec<EndpointSummary>> {
        let endpoints = self.endpoints();
        Ok(endpoints
            .iter()
            .map(|(name, entry)| EndpointSummary::new(name, entry.current(), entry.created_at))
            .collect())
    }

    async fn invoke(&self, endpoint: &str, payload: &Value) -> Result<Value> {
        self.inner.invoke_calls.fetch_add(1, Ordering::SeqCst);

        if !self.inner.latency.is_zero() {
            tokio::time::sleep(self.inner.latency).await;
        }

        if self.inner.fail_invoke {
            return Err(Error::service_unavailable().with_message("mock endpoint overloaded"));
        }

        if !self.endpoints().contains_key(endpoint) {
            return Err(Error::not_found().with_message(format!("endpoint {endpoint}")));
        }

        Ok((self.inner.responder)(payload))
    }

    async fn delete_endpoint(&self, endpoint: &str) -> Result<()> {
        self.inner.delete_calls.fetch_add(1, Ordering::SeqCst);

        if self.inner.fail_delete {
            return Err(Error::service_unavailable().with_message("mock delete throttled"));
        }

        if self.endpoints().remove(endpoint).is_none() {
            return Err(Error::not_found().with_message(format!("endpoint {endpoint}")));
        }

        self.inner
            .deleted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(endpoint.to_owned());
        Ok(())
    }
}

/// Builder for [`MockEndpointProvider`].
pub struct MockEndpointBuilder {
    existing: Vec<(String, EndpointState)>,
    creation_states: Vec<EndpointState>,
    responder: Responder,
    latency: Duration,
    fail_create: bool,
    fail_invoke: bool,
    fail_delete: bool,
}

impl Default for MockEndpointBuilder {
    fn default() -> Self {
        Self {
            existing: Vec::new(),
            creation_states: vec![EndpointState::Creating, EndpointState::InService],
            responder: Arc::new(|_| json!([0])),
            latency: Duration::ZERO,
            fail_create: false,
            fail_invoke: false,
            fail_delete: false,
        }
    }
}

impl MockEndpointBuilder {
    /// Registers an endpoint that already exists in the given state.
    pub fn with_existing(mut self, name: impl Into<String>, state: EndpointState) -> Self {
        self.existing.push((name.into(), state));
        self
    }

    /// Sets the states a newly created endpoint walks through.
    pub fn with_creation_states(mut self, states: Vec<EndpointState>) -> Self {
        self.creation_states = states;
        self
    }

    /// Returns the same prediction for every invocation.
    pub fn with_prediction(mut self, prediction: Value) -> Self {
        self.responder = Arc::new(move |_| prediction.clone());
        self
    }

    /// Computes predictions from the invocation payload.
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.responder = Arc::new(responder);
        self
    }

    /// Delays every invocation by the given duration.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Makes every `create_endpoint` call fail.
    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    /// Makes every `invoke` call fail.
    pub fn failing_invoke(mut self) -> Self {
        self.fail_invoke = true;
        self
    }

    /// Makes every `delete_endpoint` call fail.
    pub fn failing_delete(mut self) -> Self {
        self.fail_delete = true;
        self
    }

    /// Builds the provider.
    pub fn build(self) -> MockEndpointProvider {
        // Pre-existing endpoints are ordered by creation time in listings.
        let base = Timestamp::now();
        let endpoints = self
            .existing
            .into_iter()
            .enumerate()
            .map(|(index, (name, state))| {
                let created_at = base
                    .checked_sub(jiff::SignedDuration::from_secs(3600 - index as i64))
                    .unwrap_or(base);
                let entry = MockEndpoint {
                    states: VecDeque::from([state]),
                    created_at,
                };
                (name, entry)
            })
            .collect();

        let inner = MockEndpointInner {
            endpoints: Mutex::new(endpoints),
            creation_states: self.creation_states,
            responder: self.responder,
            latency: self.latency,
            fail_create: self.fail_create,
            fail_invoke: self.fail_invoke,
            fail_delete: self.fail_delete,
            deleted: Mutex::new(Vec::new()),
            create_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            invoke_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
        };

        MockEndpointProvider {
            inner: Arc::new(inner),
        }
    }
}
