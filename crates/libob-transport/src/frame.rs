//! Frame handling shared by the forward and reverse WebSocket bindings.
//!
//! Text frames carry JSON, binary frames carry MessagePack. A response goes
//! back in the encoding of the request; events are always sent as JSON text.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use libob_core::{ActionError, ActionResponse, ActionSink, Encoding, Event, Value};

use crate::connection::ConnectionContext;

const OUTGOING_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    pub(crate) fn encode<T: Serialize + ?Sized>(encoding: Encoding, value: &T) -> Option<Self> {
        let bytes = match encoding.encode(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "Failed to encode frame");
                return None;
            }
        };
        match encoding {
            Encoding::Json => String::from_utf8(bytes).ok().map(Self::Text),
            Encoding::MsgPack => Some(Self::Binary(bytes)),
        }
    }

    pub(crate) fn event(event: &Value) -> Option<Self> {
        Self::encode(Encoding::Json, event)
    }
}

/// What a received WebSocket message means to a session.
pub(crate) enum Incoming {
    Frame(Frame),
    Close,
    Control,
}

/// Conversion between a WebSocket library's message type and [`Frame`].
pub(crate) trait WsMessage: Sized + Send {
    fn into_incoming(self) -> Incoming;
    fn from_frame(frame: Frame) -> Self;
}

#[cfg(feature = "ws-server")]
impl WsMessage for axum::extract::ws::Message {
    fn into_incoming(self) -> Incoming {
        use axum::extract::ws::Message;
        match self {
            Message::Text(text) => Incoming::Frame(Frame::Text(text.as_str().to_owned())),
            Message::Binary(data) => Incoming::Frame(Frame::Binary(data.to_vec())),
            Message::Close(_) => Incoming::Close,
            Message::Ping(_) | Message::Pong(_) => Incoming::Control,
        }
    }

    fn from_frame(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => Self::Text(text.into()),
            Frame::Binary(data) => Self::Binary(data.into()),
        }
    }
}

#[cfg(feature = "ws-client")]
impl WsMessage for tokio_tungstenite::tungstenite::Message {
    fn into_incoming(self) -> Incoming {
        use tokio_tungstenite::tungstenite::Message;
        match self {
            Message::Text(text) => Incoming::Frame(Frame::Text(text.as_str().to_owned())),
            Message::Binary(data) => Incoming::Frame(Frame::Binary(data.to_vec())),
            Message::Close(_) => Incoming::Close,
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Incoming::Control,
        }
    }

    fn from_frame(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => Self::Text(text.into()),
            Frame::Binary(data) => Self::Binary(data.into()),
        }
    }
}

/// Runs the action carried by one frame and encodes the response.
pub(crate) async fn answer(sink: &dyn ActionSink, frame: Frame) -> Option<Frame> {
    let (encoding, decoded) = match &frame {
        Frame::Text(text) => (Encoding::Json, Encoding::Json.decode::<Value>(text.as_bytes())),
        Frame::Binary(data) => (Encoding::MsgPack, Encoding::MsgPack.decode::<Value>(data)),
    };
    let response = match decoded {
        Ok(value) => sink.handle_value(value).await,
        Err(e) => ActionResponse::failed(ActionError::bad_request(format!(
            "invalid frame: {e}"
        ))),
    };
    Frame::encode(encoding, &response)
}

// ============================================================================
// Peers
// ============================================================================

/// The open sockets of one connection.
#[derive(Debug, Default)]
pub(crate) struct Peers {
    next_id: AtomicU64,
    senders: Mutex<HashMap<u64, mpsc::Sender<Frame>>>,
}

impl Peers {
    fn join(&self) -> (u64, mpsc::Sender<Frame>, mpsc::Receiver<Frame>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(OUTGOING_CAPACITY);
        self.senders.lock().insert(id, tx.clone());
        (id, tx, rx)
    }

    fn leave(&self, id: u64) {
        self.senders.lock().remove(&id);
    }

    pub(crate) fn len(&self) -> usize {
        self.senders.lock().len()
    }

    /// Queues `frame` on every open socket, waiting while a socket's queue is
    /// full. Returns how many sockets took it.
    pub(crate) async fn deliver(&self, frame: &Frame) -> usize {
        let senders: Vec<_> = self.senders.lock().values().cloned().collect();
        let mut delivered = 0;
        for tx in senders {
            if tx.send(frame.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Queues `frame` on every socket with room for it. Used for heartbeats,
    /// which are not worth waiting for. Returns how many accepted it.
    pub(crate) fn broadcast(&self, frame: &Frame) -> usize {
        let senders: Vec<_> = self.senders.lock().values().cloned().collect();
        senders
            .iter()
            .filter(|tx| match tx.try_send(frame.clone()) {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "Dropped outgoing frame");
                    false
                }
            })
            .count()
    }
}

// ============================================================================
// Session
// ============================================================================

/// Drives one open socket until it closes or the connection shuts down.
///
/// Sends `meta.connect` first. Each inbound action runs as a tracked task, so
/// responses may leave in a different order than their requests arrived.
pub(crate) async fn run_session<S, M, E>(
    socket: S,
    ctx: &ConnectionContext,
    peers: &Peers,
    peer: &str,
) where
    S: Stream<Item = Result<M, E>> + Sink<M> + Send,
    <S as Sink<M>>::Error: fmt::Display,
    M: WsMessage,
    E: fmt::Display,
{
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (id, tx, mut outgoing) = peers.join();

    let info = ctx.sink.impl_info();
    if let Some(connect) = Frame::event(&Event::connect(info).to_value(&info.platform)) {
        let _ = tx.try_send(connect);
    }
    info!(peer = %peer, "WebSocket session opened");

    loop {
        tokio::select! {
            () = ctx.shutdown.cancelled() => {
                let _ = ws_tx.close().await;
                break;
            }

            Some(frame) = outgoing.recv() => {
                if let Err(e) = ws_tx.send(M::from_frame(frame)).await {
                    warn!(peer = %peer, error = %e, "Failed to send frame");
                    break;
                }
            }

            message = ws_rx.next() => match message {
                Some(Ok(message)) => match message.into_incoming() {
                    Incoming::Frame(frame) => {
                        trace!(peer = %peer, "Frame received");
                        let sink = ctx.sink.clone();
                        let tx = tx.clone();
                        ctx.tasks.spawn_detached(async move {
                            if let Some(reply) = answer(sink.as_ref(), frame).await {
                                let _ = tx.send(reply).await;
                            }
                        });
                    }
                    Incoming::Close => {
                        info!(peer = %peer, "WebSocket closed by peer");
                        break;
                    }
                    Incoming::Control => {}
                },
                Some(Err(e)) => {
                    warn!(peer = %peer, error = %e, "WebSocket error");
                    break;
                }
                None => break,
            },
        }
    }

    peers.leave(id);
    debug!(peer = %peer, "WebSocket session closed");
}

/// Sends `meta.heartbeat` to every open socket every `interval_ms`.
pub(crate) fn spawn_heartbeat(ctx: &ConnectionContext, peers: Arc<Peers>, interval_ms: u64) {
    let shutdown = ctx.shutdown.clone();
    let platform = ctx.sink.impl_info().platform.clone();
    let period = Duration::from_millis(interval_ms.max(1));

    info!(interval_ms, "Heartbeat started");
    ctx.tasks.spawn_detached(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let event = Event::heartbeat(interval_ms).to_value(&platform);
                    if let Some(frame) = Frame::event(&event) {
                        peers.broadcast(&frame);
                    }
                }
            }
        }
        info!("Heartbeat stopped");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::testing::EchoSink;

    #[tokio::test]
    async fn answers_in_the_frame_encoding() {
        let sink = EchoSink::new();
        let reply = answer(
            sink.as_ref(),
            Frame::Text(r#"{"action":"a","params":{},"echo":"e"}"#.to_string()),
        )
        .await;
        let Some(Frame::Text(text)) = reply else {
            panic!("expected a text reply");
        };
        let value: Value = Encoding::Json.decode(text.as_bytes()).unwrap();
        assert_eq!(value.get("echo"), Some(&Value::from("e")));

        let request: Value = [("action", Value::from("b")), ("params", Value::Map(Default::default()))]
            .into_iter()
            .collect();
        let packed = Encoding::MsgPack.encode(&request).unwrap();
        let reply = answer(sink.as_ref(), Frame::Binary(packed)).await;
        assert!(matches!(reply, Some(Frame::Binary(_))));
        assert_eq!(*sink.seen.lock(), ["a", "b"]);
    }

    #[tokio::test]
    async fn garbage_frames_get_bad_request() {
        let sink = EchoSink::new();
        let Some(Frame::Binary(data)) = answer(sink.as_ref(), Frame::Binary(vec![0xc1])).await
        else {
            panic!("expected a binary reply");
        };
        let value: Value = Encoding::MsgPack.decode(&data).unwrap();
        assert_eq!(value.get("retcode"), Some(&Value::Int(10001)));
    }

    #[tokio::test]
    async fn broadcast_reaches_every_peer() {
        let peers = Peers::default();
        let (a, _, mut rx_a) = peers.join();
        let (_, _, mut rx_b) = peers.join();
        assert_eq!(peers.broadcast(&Frame::Text("x".into())), 2);

        peers.leave(a);
        assert_eq!(peers.len(), 1);
        assert_eq!(rx_a.recv().await, Some(Frame::Text("x".into())));
        assert_eq!(rx_b.recv().await, Some(Frame::Text("x".into())));
    }

    #[tokio::test]
    async fn deliver_waits_for_a_slow_reader() {
        let peers = Arc::new(Peers::default());
        let (_, _, mut rx) = peers.join();
        let total = OUTGOING_CAPACITY * 2;

        let sender = {
            let peers = peers.clone();
            tokio::spawn(async move {
                let mut delivered = 0;
                for i in 0..total {
                    delivered += peers.deliver(&Frame::Text(i.to_string())).await;
                }
                delivered
            })
        };

        for i in 0..total {
            assert_eq!(rx.recv().await, Some(Frame::Text(i.to_string())));
        }
        assert_eq!(sender.await.unwrap(), total);
    }

    #[tokio::test]
    async fn broadcast_skips_full_queues() {
        let peers = Peers::default();
        let (_, _, _rx) = peers.join();
        for _ in 0..OUTGOING_CAPACITY {
            assert_eq!(peers.broadcast(&Frame::Text("hb".into())), 1);
        }
        assert_eq!(peers.broadcast(&Frame::Text("hb".into())), 0);
    }
}
