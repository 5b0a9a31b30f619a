//! Server-Sent Events endpoint for the live-reload client.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio::sync::{mpsc, watch};
use tokio_stream::Stream;

use crate::server::state::AppState;

/// Handle `GET /events`.
///
/// Sends an initial `ok` comment, then one `change` event per broadcast for
/// as long as the client stays connected or until the server shuts down. The
/// bus subscription lives inside the stream, so a disconnect drops it.
pub(crate) async fn events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, mut rx) = mpsc::unbounded_channel::<()>();
    let mut shutdown = state.shutdown_signal();
    let subscription = state.changes.subscribe(move || {
        let _ = tx.send(());
    });
    tracing::debug!(subscribers = state.changes.subscriber_count(), "Live-reload client connected");

    let stream = async_stream::stream! {
        let _subscription = subscription;
        yield Ok(Event::default().comment("ok"));
        loop {
            let changed = tokio::select! {
                message = rx.recv() => message.is_some(),
                () = stopped(&mut shutdown) => false,
            };
            if !changed {
                break;
            }
            yield Ok(Event::default().event("change").data("{}"));
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Resolves once shutdown has begun or the state is gone.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
