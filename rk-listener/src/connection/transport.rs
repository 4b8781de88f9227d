//! Socket transport
//!
//! The connection manager opens and closes sockets through [`Transport`];
//! socket activity comes back into the session loop as
//! [`Input::Socket`] tagged with the [`SocketId`] it belongs to.

use crate::session::Input;
use futures::StreamExt;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};
use url::Url;

/// Identifies one socket for its whole lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketId(u64);

impl SocketId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Socket activity reported by a transport
///
/// An `Error` is always followed by `Closed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Opened,
    Message(String),
    Error(String),
    Closed,
}

/// Opens and closes real-time channel sockets
pub trait Transport {
    /// Begin connecting to `url`
    fn open(&mut self, url: &Url) -> SocketId;

    /// Close a socket. No further events are reported for it.
    fn close(&mut self, id: SocketId);
}

/// WebSocket transport backed by tokio-tungstenite
///
/// Each socket runs in its own task; closing or dropping the transport
/// aborts the task and with it the connection.
pub struct WsTransport {
    tx: mpsc::UnboundedSender<Input>,
    sockets: HashMap<SocketId, JoinHandle<()>>,
    next_id: u64,
}

impl WsTransport {
    pub fn new(tx: mpsc::UnboundedSender<Input>) -> Self {
        Self {
            tx,
            sockets: HashMap::new(),
            next_id: 0,
        }
    }
}

impl Transport for WsTransport {
    fn open(&mut self, url: &Url) -> SocketId {
        self.sockets.retain(|_, handle| !handle.is_finished());

        let id = SocketId(self.next_id);
        self.next_id += 1;

        let handle = tokio::spawn(run_socket(id, url.to_string(), self.tx.clone()));
        self.sockets.insert(id, handle);
        id
    }

    fn close(&mut self, id: SocketId) {
        if let Some(handle) = self.sockets.remove(&id) {
            handle.abort();
        }
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        for (_, handle) in self.sockets.drain() {
            handle.abort();
        }
    }
}

async fn run_socket(id: SocketId, url: String, tx: mpsc::UnboundedSender<Input>) {
    let send = |event: SocketEvent| {
        let _ = tx.send(Input::Socket { id, event });
    };

    match tokio_tungstenite::connect_async(url).await {
        Ok((mut stream, _response)) => {
            send(SocketEvent::Opened);
            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Text(text)) => send(SocketEvent::Message(text)),
                    Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                        Ok(text) => send(SocketEvent::Message(text)),
                        Err(_) => debug!("Ignoring non-UTF-8 binary frame"),
                    },
                    Ok(Message::Close(frame)) => {
                        debug!("Server closed channel: {:?}", frame);
                        break;
                    }
                    // Pings are answered by tungstenite while reading
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Channel read error: {}", e);
                        send(SocketEvent::Error(e.to_string()));
                        break;
                    }
                }
            }
        }
        Err(e) => {
            warn!("Channel connect failed: {}", e);
            send(SocketEvent::Error(e.to_string()));
        }
    }

    send(SocketEvent::Closed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::SinkExt;
    use std::future::Future;
    use std::time::Duration;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::oneshot;
    use tokio_tungstenite::WebSocketStream;

    /// Accept one WebSocket client and hand it to `handler`
    async fn serve_once<F, Fut>(handler: F) -> Url
    where
        F: FnOnce(WebSocketStream<TcpStream>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            handler(ws).await;
        });
        Url::parse(&format!("ws://{}/ws", addr)).unwrap()
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<Input>) -> (SocketId, SocketEvent) {
        match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
            Ok(Some(Input::Socket { id, event })) => (id, event),
            other => panic!("expected socket event, got {:?}", other),
        }
    }

    /// Events of one socket up to and including `Closed`
    async fn events_until_closed(
        rx: &mut mpsc::UnboundedReceiver<Input>,
        expected: SocketId,
    ) -> Vec<SocketEvent> {
        let mut events = Vec::new();
        loop {
            let (id, event) = next_event(rx).await;
            assert_eq!(id, expected);
            let closed = event == SocketEvent::Closed;
            events.push(event);
            if closed {
                return events;
            }
        }
    }

    #[tokio::test]
    async fn test_connect_failure_reports_error_then_closed() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut transport = WsTransport::new(tx);
        let id = transport.open(&Url::parse("ws://127.0.0.1:9/ws").unwrap());

        let events = events_until_closed(&mut rx, id).await;
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], SocketEvent::Error(_)));
    }

    #[tokio::test]
    async fn test_server_frames_then_close() {
        let url = serve_once(|mut ws| async move {
            ws.send(Message::Text("hello".to_string())).await.unwrap();
            ws.send(Message::Binary(vec![0xff, 0xfe, 0xfd])).await.unwrap();
            ws.send(Message::Binary(b"{\"type\":\"x\"}".to_vec())).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut transport = WsTransport::new(tx);
        let id = transport.open(&url);

        // Invalid UTF-8 binary frame is dropped
        assert_eq!(
            events_until_closed(&mut rx, id).await,
            vec![
                SocketEvent::Opened,
                SocketEvent::Message("hello".to_string()),
                SocketEvent::Message("{\"type\":\"x\"}".to_string()),
                SocketEvent::Closed,
            ]
        );
    }

    #[tokio::test]
    async fn test_dropped_connection_ends_with_closed() {
        let url = serve_once(|ws| async move { drop(ws) }).await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut transport = WsTransport::new(tx);
        let id = transport.open(&url);

        let events = events_until_closed(&mut rx, id).await;
        assert_eq!(events[0], SocketEvent::Opened);
        for (i, event) in events.iter().enumerate() {
            if matches!(event, SocketEvent::Error(_)) {
                assert_eq!(events[i + 1], SocketEvent::Closed);
            }
        }
        assert_eq!(events.iter().filter(|e| **e == SocketEvent::Closed).count(), 1);
    }

    #[tokio::test]
    async fn test_close_stops_events() {
        let (go_tx, go_rx) = oneshot::channel::<()>();
        let url = serve_once(|mut ws| async move {
            let _ = go_rx.await;
            let _ = ws.send(Message::Text("late".to_string())).await;
            tokio::time::sleep(Duration::from_millis(500)).await;
        })
        .await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut transport = WsTransport::new(tx);
        let id = transport.open(&url);
        assert_eq!(next_event(&mut rx).await, (id, SocketEvent::Opened));

        transport.close(id);
        let _ = go_tx.send(());
        assert!(
            tokio::time::timeout(Duration::from_millis(300), rx.recv())
                .await
                .is_err(),
            "event after close"
        );
    }

    #[tokio::test]
    async fn test_socket_ids_are_distinct() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut transport = WsTransport::new(tx);
        let url = Url::parse("ws://127.0.0.1:9/ws").unwrap();
        let first = transport.open(&url);
        let second = transport.open(&url);
        assert_ne!(first, second);
    }
}
