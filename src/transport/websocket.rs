//! WebSocket transport
//!
//! The connection layer in front of the broker. Responsibilities:
//! - Accept TCP/WebSocket connections, upgrading only requests for the configured path
//! - Create a `Subscriber` for each connection with a fresh id
//! - Decode text frames into `Action`s and hand them to `Broker::execute`
//! - Answer undecodable frames with `INVALID_FORMAT_REPLY` on the same connection
//! - Unsubscribe the connection from every topic when it closes

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_hdr_async;
use tracing::{debug, error, info, warn};
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::http::StatusCode;
use tungstenite::protocol::Message as WsMessage;

use crate::broker::{Action, Broker, Subscriber};
use crate::transport::message::{INVALID_FORMAT_REPLY, decode_action};
use crate::utils::Result;

/// Bind `addr` and serve connections on `path` until the listener fails.
pub async fn start_websocket_server(addr: String, path: String, broker: Arc<Broker>) -> Result<()> {
    let listener = TcpListener::bind(&addr).await?;
    info!("WebSocket server listening on ws://{}{path}", listener.local_addr()?);
    serve(listener, path, broker).await;
    Ok(())
}

/// Accept loop over an already bound listener.
///
/// Upgrade requests for any path other than `path` are answered with 404.
pub async fn serve(listener: TcpListener, path: String, broker: Arc<Broker>) {
    let path: Arc<str> = Arc::from(path);
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                tokio::spawn(handle_connection(stream, peer, path.clone(), broker.clone()));
            }
            Err(e) => {
                error!("Failed to accept connection: {e}");
                break;
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, path: Arc<str>, broker: Arc<Broker>) {
    let check_path = |req: &Request, resp: Response| -> std::result::Result<Response, ErrorResponse> {
        if req.uri().path() == &*path {
            return Ok(resp);
        }
        let mut rejection = ErrorResponse::new(Some(format!("No endpoint at {}", req.uri().path())));
        *rejection.status_mut() = StatusCode::NOT_FOUND;
        Err(rejection)
    };
    let ws_stream = match accept_hdr_async(stream, check_path).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake error from {peer}: {e}");
            return;
        }
    };

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    let subscriber = Subscriber::new(tx);
    info!("Connection established, {subscriber} from {peer}");

    // broker -> client
    let writer = {
        let subscriber_name = subscriber.to_string();
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = ws_sender.send(msg).await {
                    warn!("Failed to send message to {subscriber_name}: {e}");
                    break;
                }
            }
            let _ = ws_sender.close().await;
            debug!("Send loop closed for {subscriber_name}");
        })
    };

    while let Some(frame) = ws_receiver.next().await {
        let msg = match frame {
            Ok(msg) => msg,
            Err(e) => {
                error!("{subscriber} -> {e}");
                break;
            }
        };

        match msg {
            WsMessage::Text(text) => handle_text(&broker, &subscriber, text.as_str()),
            WsMessage::Binary(_) => {
                warn!("{subscriber} -> binary frames are not supported");
                reply(&subscriber, INVALID_FORMAT_REPLY);
            }
            WsMessage::Close(_) => break,
            _ => {}
        }
    }

    broker.execute(&Action::unsubscribe_all(), &subscriber);
    info!("Connection closed, {subscriber}");

    // dropping the last sender ends the writer loop
    drop(subscriber);
    let _ = writer.await;
}

fn handle_text(broker: &Broker, subscriber: &Subscriber, text: &str) {
    match decode_action(text) {
        Ok(action) => {
            debug!("{subscriber} -> {action}");
            broker.execute(&action, subscriber);
        }
        Err(e) => {
            warn!(
                "{subscriber} -> {e} | {}",
                text.chars().take(100).collect::<String>()
            );
            reply(subscriber, INVALID_FORMAT_REPLY);
        }
    }
}

fn reply(subscriber: &Subscriber, text: &str) {
    if let Err(e) = subscriber.deliver(text) {
        warn!("{e}");
    }
}
