//! Scripted control plane for client tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::IntoResponse;
use tokio::net::TcpListener;
use url::Url;

/// A request received by the [`ControlPlane`].
#[derive(Debug, Clone)]
pub(crate) struct ReceivedRequest {
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
    pub body: String,
}

#[derive(Debug, Default)]
struct Script {
    responses: Mutex<VecDeque<(u16, &'static str)>>,
    received: Mutex<Vec<ReceivedRequest>>,
}

/// Control plane that answers every route with the next scripted
/// `(status, body)` pair and records what it received.
#[derive(Debug, Clone)]
pub(crate) struct ControlPlane {
    url: Url,
    script: Arc<Script>,
}

impl ControlPlane {
    /// Binds to a random local port and starts serving.
    pub(crate) async fn start(responses: Vec<(u16, &'static str)>) -> Self {
        let script = Arc::new(Script {
            responses: Mutex::new(responses.into()),
            received: Mutex::default(),
        });

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let router = Router::new().fallback(respond).with_state(Arc::clone(&script));
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });

        Self {
            url: Url::parse(&format!("http://{address}/")).unwrap(),
            script,
        }
    }

    /// Base URL of the control plane.
    pub(crate) fn url(&self) -> Url {
        self.url.clone()
    }

    /// Requests received so far, in arrival order.
    pub(crate) fn received(&self) -> Vec<ReceivedRequest> {
        self.script
            .received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

async fn respond(
    State(script): State<Arc<Script>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    script
        .received
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(ReceivedRequest {
            method,
            path: uri.path().to_owned(),
            authorization,
            body,
        });

    let (status, body) = script
        .responses
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .pop_front()
        .unwrap_or((500, r#"{"error":"unscripted request"}"#));

    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, [(header::CONTENT_TYPE, "application/json")], body)
}
