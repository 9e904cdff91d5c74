// crates/server/src/routes/stream.rs
//! Live build progress over WebSocket.
//!
//! Each connection is one [`Subscriber`]: an unbounded channel whose receiver
//! is drained into the socket by a forward task. Client messages are read only
//! to notice liveness and disconnects; their content is ignored.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use xapp_core::ProjectId;

use crate::error::ApiError;
use crate::live::{Subscriber, SubscriberId, SubscriberRegistry};
use crate::state::AppState;

/// Detaches the subscriber however the socket task ends.
struct SubscriptionGuard {
    registry: Arc<SubscriberRegistry>,
    project_id: ProjectId,
    subscriber_id: SubscriberId,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.registry.detach(&self.project_id, self.subscriber_id);
        tracing::debug!(
            project_id = %self.project_id,
            subscriber_id = self.subscriber_id,
            "build stream closed"
        );
    }
}

/// WS /ws/build/{project_id}
///
/// The project id is checked before the upgrade so malformed ids get a JSON
/// 400 rather than a socket.
pub async fn ws_build_stream(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    Path(project_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let project_id = match ProjectId::parse(&project_id) {
        Ok(id) => id,
        Err(e) => return ApiError::from(e).into_response(),
    };
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };
    ws.on_upgrade(move |socket| handle_socket(socket, project_id, state))
}

async fn handle_socket(socket: WebSocket, project_id: ProjectId, state: Arc<AppState>) {
    let (mut sink, mut stream) = socket.split();

    let (subscriber, mut rx) = Subscriber::channel();
    let _guard = SubscriptionGuard {
        registry: Arc::clone(&state.registry),
        project_id: project_id.clone(),
        subscriber_id: subscriber.id(),
    };
    state.registry.attach(&project_id, subscriber);
    tracing::info!(project_id = %project_id, "build stream opened");

    let forward_task = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if sink.send(Message::Text(line.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            Message::Text(text) => {
                tracing::debug!(project_id = %project_id, len = text.len(), "client message ignored");
            }
            Message::Close(_) => break,
            // Pong is answered by axum.
            _ => {}
        }
    }

    forward_task.abort();
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/ws/build/{project_id}", get(ws_build_stream))
}
