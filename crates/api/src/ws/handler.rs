use std::collections::HashMap;

use axum::{
    extract::{Query, State, WebSocketUpgrade, ws::{Message, WebSocket}},
    response::{IntoResponse, Response},
};
use bson::oid::ObjectId;
use futures::{SinkExt, Stream, StreamExt, stream::BoxStream};
use resident_house_db::models::{Role, ThreadId};
use resident_house_services::{
    Subscription, Topic,
    dao::{base::DaoResult, log::RECENT_LIMIT},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{error::ApiError, routes, state::AppState};

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame {
    Subscribe { topic: Topic },
    Unsubscribe { topic: Topic },
    Ping,
}

struct Session {
    user_id: ObjectId,
    role: Role,
    connection_id: String,
}

pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Response {
    // Verify JWT before accepting the WebSocket
    let claims = match state.auth.verify_access_token(&params.token) {
        Ok(c) => c,
        Err(e) => return ApiError::from(e).into_response(),
    };
    let user_id = match claims.user_id() {
        Ok(id) => id,
        Err(e) => return ApiError::from(e).into_response(),
    };

    let session = Session {
        user_id,
        role: claims.role,
        connection_id: Uuid::new_v4().to_string(),
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, session))
}

async fn handle_socket(socket: WebSocket, state: AppState, session: Session) {
    let user_id = session.user_id;
    let connection_id = session.connection_id.clone();
    info!(?user_id, %connection_id, "WebSocket connected");

    let (mut sink, mut receiver) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Value>();

    state.ws_storage.add(user_id, connection_id.clone());

    // Single writer; every subscription forwards its frames here.
    let writer = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if sink.send(Message::text(frame.to_string())).await.is_err() {
                break;
            }
        }
    });

    let _ = out_tx.send(json!({
        "type": "connected",
        "user_id": user_id.to_hex(),
    }));

    let mut subscriptions: HashMap<Topic, Subscription> = HashMap::new();

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                handle_client_frame(&state, &session, text.as_str(), &mut subscriptions, &out_tx).await;
            }
            Ok(Message::Close(_)) => {
                break;
            }
            Err(e) => {
                warn!(?user_id, %connection_id, %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    // Cleanup: every live query of this connection goes with it
    let live = subscriptions.len();
    for (_, subscription) in subscriptions.drain() {
        subscription.cancel();
    }
    drop(out_tx);
    writer.abort();
    state.ws_storage.remove(&user_id, &connection_id);

    info!(?user_id, %connection_id, live, "WebSocket disconnected");
}

async fn handle_client_frame(
    state: &AppState,
    session: &Session,
    text: &str,
    subscriptions: &mut HashMap<Topic, Subscription>,
    out: &mpsc::UnboundedSender<Value>,
) {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            let _ = out.send(json!({ "type": "error", "message": e.to_string() }));
            return;
        }
    };

    match frame {
        ClientFrame::Subscribe { topic } => {
            if subscriptions.contains_key(&topic) {
                return;
            }
            match snapshot_stream(state, session, &topic).await {
                Ok(stream) => {
                    debug!(user_id = ?session.user_id, ?topic, "Subscribed");
                    let subscription =
                        Subscription::spawn(&state.feed, topic.clone(), stream, out.clone());
                    subscriptions.insert(topic, subscription);
                }
                Err(err) => {
                    let _ = out.send(json!({
                        "type": "error",
                        "topic": topic,
                        "message": err,
                    }));
                }
            }
        }
        ClientFrame::Unsubscribe { topic } => {
            if let Some(subscription) = subscriptions.remove(&topic) {
                subscription.cancel();
            }
        }
        ClientFrame::Ping => {
            let _ = out.send(json!({ "type": "pong" }));
        }
    }
}

/// Resolves a topic to its live query, checking the caller may see it.
async fn snapshot_stream(
    state: &AppState,
    session: &Session,
    topic: &Topic,
) -> Result<BoxStream<'static, Value>, String> {
    match topic {
        Topic::Chat(raw) => {
            let thread_id = ThreadId::parse(raw).map_err(|e| e.to_string())?;
            let me = session.user_id.to_hex();
            let peer = thread_id
                .peer_of(&me)
                .ok_or_else(|| "Not a participant of this chat".to_string())?;
            let peer = ObjectId::parse_str(peer).map_err(|_| "Invalid peer id".to_string())?;
            state
                .users
                .base
                .find_by_id(peer)
                .await
                .map_err(|e| e.to_string())?;
            let stream = state.chats.subscribe_messages(&state.feed, thread_id);
            Ok(frames(topic.clone(), stream, routes::chat::message_response))
        }
        Topic::Bulletin => {
            let stream = state.bulletin.subscribe(&state.feed);
            Ok(frames(topic.clone(), stream, routes::bulletin::to_response))
        }
        Topic::VisitorLog | Topic::PackageLog if session.role != Role::Concierge => {
            Err("Only concierge accounts can follow the building logs".to_string())
        }
        Topic::VisitorLog => {
            let stream = state.visitors.subscribe_recent(&state.feed, RECENT_LIMIT);
            Ok(frames(topic.clone(), stream, routes::visitor::to_response))
        }
        Topic::PackageLog => {
            let stream = state.packages.subscribe_recent(&state.feed, RECENT_LIMIT);
            Ok(frames(topic.clone(), stream, routes::package::to_response))
        }
    }
}

/// Wraps each emitted snapshot in a `snapshot` frame for the client.
fn frames<T, R, S>(topic: Topic, stream: S, to_response: fn(T) -> R) -> BoxStream<'static, Value>
where
    T: Send + 'static,
    R: Serialize + 'static,
    S: Stream<Item = DaoResult<Vec<T>>> + Send + 'static,
{
    stream
        .map(move |result| match result {
            Ok(items) => {
                let data: Vec<R> = items.into_iter().map(to_response).collect();
                json!({ "type": "snapshot", "topic": topic, "data": data })
            }
            Err(e) => json!({ "type": "error", "topic": topic, "message": e.to_string() }),
        })
        .boxed()
}
