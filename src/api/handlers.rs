//! REST API handlers.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::Html, Json};
use tracing::error;

use super::types::{BulkSendRequest, DeleteSessionRequest, SendMessageRequest, StatusResponse};
use crate::dispatch::{self, BulkConfig, BulkSummary, Dispatcher};
use crate::error::BridgeError;
use crate::notify::EventBus;
use crate::protocol::ChatClient;
use crate::session::{LoggedOutPolicy, ReconnectPolicy, SessionRegistry, Supervisor};
use crate::store::CredentialStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub supervisor: Arc<Supervisor>,
    pub dispatcher: Arc<Dispatcher>,
    pub bus: EventBus,
    pub bulk: BulkConfig,
}

impl AppState {
    /// Wire up the core components around a protocol client and store.
    pub fn new(
        client: Arc<dyn ChatClient>,
        store: CredentialStore,
        policy: ReconnectPolicy,
        logged_out: LoggedOutPolicy,
        bulk: BulkConfig,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let bus = EventBus::default();
        let supervisor = Supervisor::new(
            Arc::clone(&registry),
            store,
            bus.clone(),
            client,
            policy,
            logged_out,
        );
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&supervisor),
        ));
        Self {
            registry,
            supervisor,
            dispatcher,
            bus,
            bulk,
        }
    }
}

/// Liveness probe.
pub async fn root() -> &'static str {
    "server working"
}

/// Static page for QR display.
pub async fn scan_page() -> Html<&'static str> {
    Html(include_str!("../../assets/scan.html"))
}

fn error_status(error: &BridgeError) -> StatusCode {
    match error {
        BridgeError::Validation(_)
        | BridgeError::SessionNotFound(_)
        | BridgeError::SessionNotConnected(_)
        | BridgeError::BulkFile(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Send one message through a session.
pub async fn send_message(
    State(state): State<AppState>,
    Json(request): Json<SendMessageRequest>,
) -> (StatusCode, Json<StatusResponse>) {
    let outbound = match request.into_outbound() {
        Ok(outbound) => outbound,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(StatusResponse::error(e.to_string())),
            )
        }
    };

    match state.dispatcher.send(outbound).await {
        Ok(()) => (
            StatusCode::OK,
            Json(StatusResponse::success("message sent")),
        ),
        Err(e) => {
            error!(error = %e, "send-message failed");
            (error_status(&e), Json(StatusResponse::error(e.to_string())))
        }
    }
}

/// Delete a session, its registry entry, and its stored credentials.
pub async fn delete_session(
    State(state): State<AppState>,
    Json(request): Json<DeleteSessionRequest>,
) -> (StatusCode, Json<StatusResponse>) {
    match state.supervisor.delete(&request.session_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(StatusResponse::success("session deleted")),
        ),
        Err(e) => (error_status(&e), Json(StatusResponse::error(e.to_string()))),
    }
}

/// Run the bulk pipeline and report per-row outcomes.
pub async fn send_bulk_messages(
    State(state): State<AppState>,
    Json(request): Json<BulkSendRequest>,
) -> Result<Json<BulkSummary>, (StatusCode, Json<StatusResponse>)> {
    let path = PathBuf::from(&request.file_path);
    let summary = dispatch::send_rows(
        &state.dispatcher,
        &state.bulk,
        &request.session_id,
        &request.message,
        &path,
    )
    .await
    .map_err(|e| {
        error!(error = %e, "send-bulk-messages failed");
        (error_status(&e), Json(StatusResponse::error(e.to_string())))
    })?;

    Ok(Json(summary))
}
