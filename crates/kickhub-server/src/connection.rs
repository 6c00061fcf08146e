use std::collections::HashSet;
use std::fmt::Display;
use std::sync::Arc;

use axum::extract::ws::{close_code, Message, WebSocket};
use futures::{Sink, SinkExt, Stream, StreamExt};
use kickhub_core::{ConnectionId, SessionId};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::handler;
use crate::hub::Hub;

/// Outcome of a non-blocking mailbox push.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The mailbox is at capacity; the frame was not queued.
    Full,
    /// The mailbox was already closed by teardown.
    Closed,
}

/// One connected client: its identity, subscriptions and outbound mailbox.
pub struct Connection {
    pub id: ConnectionId,
    pub session_id: SessionId,
    channels: Mutex<HashSet<String>>,
    // `None` once the hub has closed the mailbox. Dropping the last sender
    // lets the writer drain what is queued and then stop.
    mailbox: Mutex<Option<mpsc::Sender<String>>>,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        session_id: SessionId,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let conn = Self {
            id,
            session_id,
            channels: Mutex::new(HashSet::new()),
            mailbox: Mutex::new(Some(tx)),
        };
        (conn, rx)
    }

    /// Returns `true` if the channel was not already subscribed.
    pub fn subscribe(&self, channel: &str) -> bool {
        self.channels.lock().insert(channel.to_string())
    }

    pub fn unsubscribe(&self, channel: &str) -> bool {
        self.channels.lock().remove(channel)
    }

    #[cfg(test)]
    pub(crate) fn is_subscribed(&self, channel: &str) -> bool {
        self.channels.lock().contains(channel)
    }

    /// Subscribed channels, sorted.
    pub fn channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self.channels.lock().iter().cloned().collect();
        channels.sort();
        channels
    }

    /// Subscribed channels whose name starts with `prefix`, sorted.
    pub fn matching_channels(&self, prefix: &str) -> Vec<String> {
        let mut matched: Vec<String> = self
            .channels
            .lock()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .cloned()
            .collect();
        matched.sort();
        matched
    }

    /// Queue a frame without waiting.
    pub fn try_deliver(&self, frame: String) -> Delivery {
        let mailbox = self.mailbox.lock();
        let Some(tx) = mailbox.as_ref() else {
            return Delivery::Closed;
        };
        match tx.try_send(frame) {
            Ok(()) => Delivery::Delivered,
            Err(mpsc::error::TrySendError::Full(_)) => Delivery::Full,
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    pub fn is_open(&self) -> bool {
        self.mailbox.lock().is_some()
    }

    /// Drop the sender. Returns `false` if it was already closed.
    pub(crate) fn close_mailbox(&self) -> bool {
        self.mailbox.lock().take().is_some()
    }
}

/// Drain the mailbox onto the socket, one text frame per item, in order.
///
/// When the hub closes the mailbox the remaining items are flushed, a Close
/// frame is sent, and the loop ends. A failed write ends it immediately.
pub async fn write_loop<S>(mut sink: S, mut rx: mpsc::Receiver<String>, connection_id: ConnectionId)
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    while let Some(frame) = rx.recv().await {
        if let Err(e) = sink.send(Message::Text(frame.into())).await {
            debug!(connection_id = %connection_id, error = %e, "socket write failed, stopping writer");
            return;
        }
    }

    if let Err(e) = sink.send(Message::Close(None)).await {
        trace!(connection_id = %connection_id, error = %e, "close frame not sent");
    }
    trace!(connection_id = %connection_id, "writer finished");
}

/// Receive frames until the peer goes away or the transport fails.
///
/// Malformed frames are dropped by the handler; they never end the loop.
pub async fn read_loop<St, E>(mut stream: St, hub: &Hub, conn: &Connection)
where
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    while let Some(next) = stream.next().await {
        match next {
            Ok(Message::Text(text)) => handler::handle_frame(hub, conn, text.as_str()),
            Ok(Message::Binary(bytes)) => {
                debug!(connection_id = %conn.id, len = bytes.len(), "ignoring binary frame");
            }
            Ok(Message::Close(frame)) => {
                if let Some(frame) = frame {
                    if frame.code != close_code::NORMAL && frame.code != close_code::AWAY {
                        warn!(
                            connection_id = %conn.id,
                            code = frame.code,
                            reason = frame.reason.as_str(),
                            "connection closed abnormally"
                        );
                    }
                }
                break;
            }
            // axum answers pings itself
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Err(e) => {
                warn!(connection_id = %conn.id, error = %e, "transport error");
                break;
            }
        }
    }
}

/// Run a registered connection to completion.
///
/// Whichever half stops first, teardown goes through `Hub::unregister`
/// exactly once, and the writer is then allowed to flush and close.
pub async fn serve_connection(
    socket: WebSocket,
    hub: Arc<Hub>,
    conn: Arc<Connection>,
    rx: mpsc::Receiver<String>,
) {
    let (sink, stream) = socket.split();
    let mut writer = tokio::spawn(write_loop(sink, rx, conn.id.clone()));

    let writer_finished = tokio::select! {
        () = read_loop(stream, &hub, &conn) => false,
        _ = &mut writer => true,
    };

    hub.unregister(&conn.id);

    if !writer_finished {
        if let Err(e) = writer.await {
            warn!(connection_id = %conn.id, error = %e, "writer task failed");
        }
    }
    info!(connection_id = %conn.id, session_id = %conn.session_id, "client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::ws::{CloseFrame, Utf8Bytes};
    use kickhub_core::Envelope;
    use kickhub_telemetry::MetricsRecorder;

    use crate::session::EmissionRate;

    fn text(s: &str) -> Message {
        Message::Text(s.to_owned().into())
    }

    fn make_connection(capacity: usize) -> (Connection, mpsc::Receiver<String>) {
        Connection::new(ConnectionId::new(), SessionId::from_raw("s1"), capacity)
    }

    #[test]
    fn subscribe_is_idempotent() {
        let (conn, _rx) = make_connection(4);
        assert!(conn.subscribe("chatroom.1"));
        assert!(!conn.subscribe("chatroom.1"));
        assert_eq!(conn.channels(), vec!["chatroom.1".to_string()]);
    }

    #[test]
    fn matching_channels_is_a_literal_prefix_test() {
        let (conn, _rx) = make_connection(4);
        conn.subscribe("chatroom.2");
        conn.subscribe("chatroom.1");
        conn.subscribe("channel.1");
        conn.subscribe("xchatroom.3");
        assert_eq!(conn.matching_channels("chatroom"), vec!["chatroom.1", "chatroom.2"]);
        assert_eq!(conn.matching_channels("channel"), vec!["channel.1"]);
        assert!(conn.matching_channels("chat*").is_empty());
    }

    #[test]
    fn try_deliver_reports_full_then_closed() {
        let (conn, _rx) = make_connection(1);
        assert_eq!(conn.try_deliver("a".into()), Delivery::Delivered);
        assert_eq!(conn.try_deliver("b".into()), Delivery::Full);
        assert!(conn.close_mailbox());
        assert!(!conn.close_mailbox());
        assert_eq!(conn.try_deliver("c".into()), Delivery::Closed);
    }

    #[tokio::test]
    async fn writer_preserves_order_and_closes_after_flush() {
        let (conn, rx) = make_connection(8);
        for frame in ["one", "two", "three"] {
            assert_eq!(conn.try_deliver(frame.into()), Delivery::Delivered);
        }
        conn.close_mailbox();

        let (sink, out) = futures::channel::mpsc::unbounded::<Message>();
        write_loop(sink, rx, conn.id.clone()).await;

        let written: Vec<Message> = out.collect().await;
        assert_eq!(written.len(), 4);
        assert_eq!(written[0], text("one"));
        assert_eq!(written[1], text("two"));
        assert_eq!(written[2], text("three"));
        assert!(matches!(written[3], Message::Close(None)));
    }

    #[tokio::test]
    async fn writer_stops_when_socket_is_gone() {
        let (conn, rx) = make_connection(8);
        conn.try_deliver("one".into());
        let (sink, out) = futures::channel::mpsc::unbounded::<Message>();
        drop(out);
        // Returns even though the mailbox is still open.
        write_loop(sink, rx, conn.id.clone()).await;
    }

    #[tokio::test]
    async fn reader_survives_malformed_frames() {
        let hub = Hub::new(8, EmissionRate::default(), Arc::new(MetricsRecorder::new()));
        let (conn, mut rx) = hub.connect(SessionId::from_raw("s1"));

        let frames = futures::stream::iter(vec![
            Ok::<_, std::io::Error>(text("{not json")),
            Ok(text(r#"{"event":"pusher:subscribe","data":{}}"#)),
            Ok(text(r#"{"event":"mystery","data":{}}"#)),
            Ok(text(r#"{"event":"pusher:subscribe","data":{"channel":"chatroom.9"}}"#)),
        ]);
        read_loop(frames, &hub, &conn).await;

        assert!(conn.is_subscribed("chatroom.9"));
        let ack: Envelope = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(ack.channel, "chatroom.9");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn reader_stops_at_close_and_transport_error() {
        let hub = Hub::new(8, EmissionRate::default(), Arc::new(MetricsRecorder::new()));
        let (conn, _rx) = hub.connect(SessionId::from_raw("s1"));

        let frames = futures::stream::iter(vec![
            Ok::<_, std::io::Error>(Message::Close(None)),
            Ok(text(r#"{"event":"pusher:subscribe","data":{"channel":"chatroom.1"}}"#)),
        ]);
        read_loop(frames, &hub, &conn).await;
        assert!(!conn.is_subscribed("chatroom.1"));

        let frames = futures::stream::iter(vec![
            Err(std::io::Error::other("reset")),
            Ok(text(r#"{"event":"pusher:subscribe","data":{"channel":"chatroom.2"}}"#)),
        ]);
        read_loop(frames, &hub, &conn).await;
        assert!(!conn.is_subscribed("chatroom.2"));
    }

    #[tokio::test]
    async fn reader_stops_at_abnormal_close() {
        let hub = Hub::new(8, EmissionRate::default(), Arc::new(MetricsRecorder::new()));
        let (conn, _rx) = hub.connect(SessionId::from_raw("s1"));

        let frames = futures::stream::iter(vec![
            Ok::<_, std::io::Error>(Message::Close(Some(CloseFrame {
                code: close_code::ERROR,
                reason: Utf8Bytes::from_static("internal error"),
            }))),
            Ok(text(r#"{"event":"pusher:subscribe","data":{"channel":"chatroom.3"}}"#)),
        ]);
        read_loop(frames, &hub, &conn).await;

        assert!(!conn.is_subscribed("chatroom.3"));
        // Teardown belongs to the caller; the reader never unregisters.
        assert!(hub.contains(&conn.id));
    }
}
