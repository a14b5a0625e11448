use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};
use uuid::Uuid;

use super::live_view::LiveView;
use crate::{
    dto::sse::{Handshake, ServerEvent, SystemStatus},
    error::ServiceError,
    state::SharedState,
};

/// Open a realtime view of `date_key` for a new connection.
///
/// The view is registered in the shared state so its day can be switched
/// later, and the handshake is queued before any snapshot.
pub async fn open_day_view(
    state: &SharedState,
    date_key: &str,
    group_id: Option<String>,
    court_count: u32,
) -> Result<(Arc<LiveView>, mpsc::UnboundedReceiver<ServerEvent>), ServiceError> {
    let store = state.require_store().await?;
    let group_id = group_id.or_else(|| state.config().group_id.clone());
    let (tx, rx) = mpsc::unbounded_channel();

    let view = Arc::new(LiveView::new(store, group_id, court_count, tx.clone()));
    let handshake = Handshake::new(
        view.id(),
        date_key,
        court_count,
        state.clock().now_ms(),
        state.is_degraded(),
    );
    if let Ok(event) = ServerEvent::json(Some("handshake".to_owned()), &handshake) {
        let _ = tx.send(event);
    }

    view.watch_day(date_key);
    state.live_views().insert(view.id(), view.clone());
    info!(view_id = %view.id(), date = date_key, court_count, "new day SSE connection");
    Ok((view, rx))
}

/// Point an open view at another day.
pub fn switch_day(state: &SharedState, view_id: Uuid, date_key: &str) -> Result<(), ServiceError> {
    let view = state
        .live_views()
        .get(&view_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| ServiceError::NotFound(format!("no live view `{view_id}`")))?;
    view.watch_day(date_key);
    Ok(())
}

/// Convert a view's event channel into an SSE response, forwarding snapshots
/// and degraded-mode changes, and dropping the view once the client disconnects.
pub fn to_sse_stream(
    state: SharedState,
    view: Arc<LiveView>,
    mut receiver: mpsc::UnboundedReceiver<ServerEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);
    let mut degraded = state.degraded_watcher();

    tokio::spawn(async move {
        loop {
            let payload = tokio::select! {
                _ = tx.closed() => break,
                changed = degraded.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let status = SystemStatus { degraded: *degraded.borrow_and_update() };
                    match ServerEvent::json(Some("system_status".to_owned()), &status) {
                        Ok(event) => event,
                        Err(err) => {
                            warn!(error = %err, "failed to serialise system status");
                            continue;
                        }
                    }
                }
                received = receiver.recv() => match received {
                    Some(payload) => payload,
                    None => break,
                },
            };

            let mut event = Event::default().data(payload.data);
            if let Some(name) = payload.event {
                event = event.event(name);
            }
            if tx.send(Ok(event)).await.is_err() {
                break;
            }
        }

        state.live_views().remove(&view.id());
        view.close();
        info!(view_id = %view.id(), "day SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
