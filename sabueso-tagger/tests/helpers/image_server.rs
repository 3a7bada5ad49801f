//! Local HTTP image server
//!
//! Serves fixed bodies under `/media/:name` on an ephemeral port and records
//! every requested name.

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

struct ServerState {
    images: HashMap<String, Vec<u8>>,
    hits: Mutex<Vec<String>>,
}

/// Handle to a running server
#[derive(Clone)]
pub struct ImageServer {
    /// `http://127.0.0.1:<port>/media/`, usable as the fetcher URL prefix
    pub media_prefix: String,
    state: Arc<ServerState>,
}

impl ImageServer {
    pub fn url_for(&self, name: &str) -> String {
        format!("{}{}", self.media_prefix, name)
    }

    /// Names requested so far, in request order
    pub fn hits(&self) -> Vec<String> {
        self.state.hits.lock().unwrap().clone()
    }
}

/// Start serving `images` (name -> body); unknown names answer 404
pub async fn start_image_server(images: HashMap<String, Vec<u8>>) -> Result<ImageServer> {
    let state = Arc::new(ServerState {
        images,
        hits: Mutex::new(Vec::new()),
    });

    let app = Router::new()
        .route("/media/:name", get(serve_image))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok(ImageServer {
        media_prefix: format!("http://{}/media/", addr),
        state,
    })
}

async fn serve_image(
    State(state): State<Arc<ServerState>>,
    Path(name): Path<String>,
) -> Result<Vec<u8>, StatusCode> {
    state.hits.lock().unwrap().push(name.clone());
    state.images.get(&name).cloned().ok_or(StatusCode::NOT_FOUND)
}
