//! HTTP surface of the shared brain.
//!
//! | route         | form     | response                         |
//! |---------------|----------|----------------------------------|
//! | `GET /`       |          | 200, health probe                |
//! | `POST /learn` | `body`   | 200, empty                       |
//! | `POST /reply` | `body`   | 200, reply text or empty         |
//! | `POST /save`  |          | 200 once the brain is on disk    |
//! | `GET /stats`  |          | 200, `{"words","contexts","lines"}` |
//!
//! Every handler goes through the one [`LocalBrainClient`], whose lock serializes
//! learns, replies and saves. Brain failures become 500; malformed forms are rejected by
//! the extractor with a 4xx.

use std::sync::Arc;

use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use borg::prelude::*;
use serde::Deserialize;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

pub type GatewayState = Arc<LocalBrainClient>;

#[derive(Debug, Deserialize)]
pub struct TextForm {
    pub body: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Brain(#[from] ClientError),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        error!("Internal error in brain: {}", self);
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

pub fn router(brain: GatewayState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/learn", post(learn))
        .route("/reply", post(reply))
        .route("/save", post(save))
        .route("/stats", get(stats))
        .layer(TraceLayer::new_for_http())
        .with_state(brain)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn learn(
    State(brain): State<GatewayState>,
    Form(form): Form<TextForm>,
) -> Result<StatusCode, GatewayError> {
    debug!(len = form.body.len(), "learn");
    brain.learn(&form.body).await?;
    Ok(StatusCode::OK)
}

async fn reply(
    State(brain): State<GatewayState>,
    Form(form): Form<TextForm>,
) -> Result<String, GatewayError> {
    let text = brain.reply(&form.body).await?;
    debug!(replied = text.is_some(), "reply");
    Ok(text.unwrap_or_default())
}

async fn save(State(brain): State<GatewayState>) -> Result<StatusCode, GatewayError> {
    brain.save_all().await?;
    Ok(StatusCode::OK)
}

async fn stats(State(brain): State<GatewayState>) -> Result<Json<BrainStats>, GatewayError> {
    Ok(Json(brain.stats().await?))
}
