//! Local price feed fixture for integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

/// A WebSocket feed server on `127.0.0.1:0` that serves one connection.
///
/// Frames pushed with `send` are written to the connected client in order.
/// Pushing `Message::Close` ends the connection from the server side.
/// Pong payloads received from the client are kept for inspection.
pub struct TestFeed {
    pub url: String,
    frames: mpsc::UnboundedSender<Message>,
    pongs: Arc<Mutex<Vec<Vec<u8>>>>,
    handle: JoinHandle<()>,
}

impl TestFeed {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (frames, rx) = mpsc::unbounded_channel();
        let pongs = Arc::new(Mutex::new(Vec::new()));

        let handle = tokio::spawn(serve_one(listener, rx, Arc::clone(&pongs)));

        Self {
            url: format!("ws://{addr}"),
            frames,
            pongs,
            handle,
        }
    }

    /// Queue a text frame.
    pub fn send_text(&self, text: &str) {
        let _ = self.frames.send(Message::text(text.to_string()));
    }

    /// Queue a raw frame.
    pub fn send(&self, message: Message) {
        let _ = self.frames.send(message);
    }

    /// Pong payloads received so far.
    pub fn pongs(&self) -> Vec<Vec<u8>> {
        self.pongs.lock().clone()
    }

    /// Close the connection from the server side.
    pub fn close(&self) {
        let _ = self.frames.send(Message::Close(None));
    }
}

impl Drop for TestFeed {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve_one(
    listener: TcpListener,
    mut rx: mpsc::UnboundedReceiver<Message>,
    pongs: Arc<Mutex<Vec<Vec<u8>>>>,
) {
    let Ok((tcp, _)) = listener.accept().await else {
        return;
    };
    let Ok(mut ws) = tokio_tungstenite::accept_async(tcp).await else {
        return;
    };

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                let Some(message) = outbound else { break };
                let closing = matches!(message, Message::Close(_));
                if ws.send(message).await.is_err() || closing {
                    break;
                }
            }
            inbound = ws.next() => {
                match inbound {
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(Message::Pong(data))) => pongs.lock().push(data.to_vec()),
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

/// Address of a port with nothing listening on it.
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{addr}")
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within 2s"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
