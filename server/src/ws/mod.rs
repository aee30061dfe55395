use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{Sink, SinkExt, Stream, StreamExt, TryStreamExt};
use tokio::{sync::mpsc, time};
use tracing::{debug, info, warn};

use crate::{errors::ConnectionError, registry::Connection, Pipeline};

pub async fn accept_and_log(stream: WebSocket, pipeline: Pipeline) {
    let (write, read) = stream.split();
    if let Err(e) = serve_session(write, read.map_err(anyhow::Error::from), &pipeline).await {
        warn!(error = %e, "error on connection");
    }
}

/// Register the observer, then feed its frames to the ingestion handler
/// while a writer drains its outbound queue. The session ends when the
/// observer leaves, a read or write fails, or the connection is pruned.
pub(crate) async fn serve_session<W, R>(
    write: W,
    read: R,
    pipeline: &Pipeline,
) -> anyhow::Result<()>
where
    W: Sink<Message> + Unpin,
    R: Stream<Item = anyhow::Result<Message>>,
{
    let (conn, outbound) = Connection::new(pipeline.server.outbound_queue);
    pipeline.registry.add(conn.clone());
    info!(connection = %conn.id(), "client connected");

    let send_frames = write_frames(outbound, write, pipeline.server.send_timeout());

    let receive_frames = read.try_for_each(|msg| {
        let result = match msg {
            Message::Text(text) => pipeline.ingest.handle(&conn, &text),
            Message::Binary(bin) => pipeline.ingest.handle_bytes(&conn, &bin),
            _ => Ok(()),
        };
        if let Err(e) = result {
            debug!(connection = %conn.id(), error = %e, "rejected location");
        }
        futures_util::future::ok(())
    });

    let outcome = tokio::select! {
        result = receive_frames => result,
        result = send_frames => result.map_err(anyhow::Error::from),
        _ = conn.closed() => {
            info!(connection = %conn.id(), "connection pruned, ending session");
            Ok(())
        }
    };

    pipeline.registry.remove(conn.id());
    info!(connection = %conn.id(), "client disconnected");
    outcome
}

async fn write_frames<W>(
    mut outbound: mpsc::Receiver<String>,
    mut write: W,
    limit: Duration,
) -> Result<(), ConnectionError>
where
    W: Sink<Message> + Unpin,
{
    while let Some(frame) = outbound.recv().await {
        match time::timeout(limit, write.send(Message::Text(frame))).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => return Err(ConnectionError::Closed),
            Err(_) => return Err(ConnectionError::Timeout(limit)),
        }
    }
    Ok(())
}
