//! WebSocket transport
//!
//! This file implements the listener for the two upgrade endpoints.
//! Responsibilities:
//! - Accept TCP connections and perform the WebSocket handshake
//! - Resolve the request path to a hub and topic during the handshake, and
//!   reject with a plain HTTP status (404, 400, 403, 503) before anything is
//!   registered
//! - Hand each accepted connection to its own session task
//!
//! Security note: with the default `OpenAdmission` any caller that knows a
//! workspace id or an email can subscribe to its events. Embedders should
//! pass their own `Admission` to `serve`.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_hdr_async;
use tracing::{debug, info, warn};
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::http::StatusCode;

use crate::hub::Hubs;
use crate::transport::admission::{Admission, OpenAdmission};
use crate::transport::route::Route;
use crate::transport::session::run_session;
use crate::utils::HubError;

/// Bind `addr` and serve both upgrade endpoints with open admission.
pub async fn start_websocket_server(addr: &str, hubs: Hubs) -> Result<(), HubError> {
    let listener = TcpListener::bind(addr).await.map_err(|source| HubError::Bind {
        addr: addr.to_string(),
        source,
    })?;

    info!("WebSocket server listening on ws://{addr}");
    warn!("subscriptions are not authenticated: any caller may follow any workspace or email");

    serve(listener, hubs, Arc::new(OpenAdmission)).await;
    Ok(())
}

/// Accept connections from an already bound listener until the task is dropped.
pub async fn serve(listener: TcpListener, hubs: Hubs, admission: Arc<dyn Admission>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "failed to accept connection");
                continue;
            }
        };

        let hubs = hubs.clone();
        let admission = admission.clone();
        tokio::spawn(async move {
            handle_connection(stream, peer, hubs, admission).await;
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    hubs: Hubs,
    admission: Arc<dyn Admission>,
) {
    let mut route = None;

    let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let resolved = Route::parse(request.uri().path())
            .map_err(|e| reject(e.status(), e.to_string()))?;
        if !admission.admit(&resolved, request) {
            return Err(reject(StatusCode::FORBIDDEN, "subscription not permitted"));
        }
        let full = match &resolved {
            Route::Workspace(_) => hubs.workspaces.is_full(),
            Route::Invitations(_) => hubs.users.is_full(),
        };
        if full {
            return Err(reject(
                StatusCode::SERVICE_UNAVAILABLE,
                "too many live connections",
            ));
        }
        let (namespace, topic) = resolved.describe();
        debug!(%peer, namespace, topic, "upgrade accepted");
        route = Some(resolved);
        Ok(response)
    };

    let ws_stream = match accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            debug!(%peer, error = %e, "WebSocket handshake rejected");
            return;
        }
    };

    match route {
        Some(Route::Workspace(id)) => run_session(ws_stream, hubs.workspaces, id, peer).await,
        Some(Route::Invitations(email)) => run_session(ws_stream, hubs.users, email, peer).await,
        None => warn!(%peer, "handshake completed without a route"),
    }
}

fn reject(status: StatusCode, reason: impl Into<String>) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(reason.into()));
    *response.status_mut() = status;
    response
}
