//! Development middleware: in-memory asset serving and hot-update delivery.
//!
//! The middleware is built by the orchestrator's development path and handed
//! to the host server through the event channel. It owns two stages: the
//! asset stage serves compiled bundles straight from the artifact store, and
//! the hot stage streams build notifications to connected browsers over
//! server-sent events.

use std::convert::Infallible;
use std::path::Path;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_stream::{wrappers::ReceiverStream, StreamExt};
use twofold_config::HMR_PATH;

use crate::store::ArtifactStore;

/// Per-connection buffer for pending hot updates.
const CLIENT_BUFFER: usize = 16;

/// Registry of connected hot-update subscribers.
///
/// Broadcasting walks the registry and drops senders whose receiver has gone
/// away, so an abandoned browser tab never accumulates buffered payloads.
#[derive(Clone, Default)]
pub struct HotStage {
    clients: Arc<RwLock<Vec<mpsc::Sender<String>>>>,
}

impl HotStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new subscriber stream and return its SSE response.
    pub fn subscribe(&self) -> Response {
        let (tx, rx) = mpsc::channel(CLIENT_BUFFER);
        self.clients.write().push(tx);

        let stream =
            ReceiverStream::new(rx).map(|data| Ok::<_, Infallible>(Event::default().data(data)));
        Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
    }

    /// Deliver a payload to every live subscriber, pruning dead ones.
    ///
    /// A subscriber with a full buffer is kept but skips this payload; the
    /// next update supersedes it anyway.
    pub fn broadcast(&self, payload: &str) {
        self.clients.write().retain(|tx| {
            match tx.try_send(payload.to_string()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => true,
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
    }

    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }
}

/// Serve a compiled artifact from the store.
async fn serve_asset(store: &dyn ArtifactStore, path: &str) -> Option<Response> {
    let key = Path::new(path);
    if !store.exists(key).await {
        return None;
    }
    let contents = match store.read(key).await {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("error reading artifact {path}: {e}");
            return Some(
                Response::builder()
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .header(header::CONTENT_TYPE, "text/plain")
                    .body(Body::from("failed to read artifact"))
                    .unwrap(),
            );
        }
    };

    Some(
        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, content_type_for(path))
            .header(header::CONTENT_LENGTH, contents.len())
            // Dev mode: always fresh
            .header(header::CACHE_CONTROL, "no-cache")
            .body(Body::from(contents))
            .unwrap(),
    )
}

/// Content type from the artifact extension.
fn content_type_for(path: &str) -> &'static str {
    match path.rsplit_once('.').map(|(_, ext)| ext) {
        Some("js") => "application/javascript",
        Some("css") => "text/css",
        Some("json") | Some("map") => "application/json",
        Some("html") => "text/html; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        _ => "application/octet-stream",
    }
}

/// Request handler for the development server.
///
/// The host mounts this in front of its own routes: a request whose path
/// falls under the public base path is answered from the artifact store or
/// the hot-update stream, anything else falls through as `None`.
#[derive(Clone)]
pub struct DevMiddleware {
    public_path: String,
    store: Arc<dyn ArtifactStore>,
    hot: HotStage,
}

impl DevMiddleware {
    pub fn new(public_path: impl Into<String>, store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            public_path: public_path.into(),
            store,
            hot: HotStage::new(),
        }
    }

    pub fn hot(&self) -> &HotStage {
        &self.hot
    }

    /// Handle one request path: asset stage first, hot-update stage second.
    /// `None` means the path is not ours and the caller's own handling
    /// continues.
    pub async fn handle(&self, path: &str) -> Option<Response> {
        let rel = path.strip_prefix(self.public_path.as_str())?;

        if let Some(response) = serve_asset(self.store.as_ref(), rel).await {
            return Some(response);
        }
        if rel == HMR_PATH {
            return Some(self.hot.subscribe());
        }
        None
    }
}
