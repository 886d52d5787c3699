use async_trait::async_trait;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

/// Something the read half of a connection delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A complete text frame.
    Message(String),
    /// The peer closed the connection or the stream ended.
    Closed,
    /// The stream failed. No further events follow.
    Failed(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tungstenite::Error,
    },

    #[error("websocket error: {0}")]
    Socket(#[from] tungstenite::Error),

    #[error("connection is closed")]
    Closed,
}

pub type EventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

/// Write half of an open connection.
#[async_trait]
pub trait Transport: Send {
    async fn send_text(&mut self, text: &str) -> Result<(), TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Opens connections. Inbound frames arrive on the returned receiver in the
/// order the peer sent them.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        endpoint: &Url,
    ) -> Result<(Box<dyn Transport>, EventReceiver), TransportError>;
}

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;

/// Connects over `ws://` or `wss://` with tokio-tungstenite.
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(
        &self,
        endpoint: &Url,
    ) -> Result<(Box<dyn Transport>, EventReceiver), TransportError> {
        let (stream, response) =
            connect_async(endpoint.as_str())
                .await
                .map_err(|source| TransportError::Connect {
                    url: endpoint.to_string(),
                    source,
                })?;
        info!("Connected to {} (HTTP {})", endpoint, response.status());

        let (sink, source) = stream.split();
        let (tx, rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(pump_frames(source, tx));

        Ok((Box::new(WsTransport { sink, reader }), rx))
    }
}

async fn pump_frames<S>(mut source: S, tx: mpsc::UnboundedSender<TransportEvent>)
where
    S: futures::Stream<Item = Result<WsMessage, tungstenite::Error>> + Unpin,
{
    while let Some(frame) = source.next().await {
        let event = match frame {
            Ok(WsMessage::Text(text)) => {
                debug!("Received frame ({} bytes)", text.len());
                TransportEvent::Message(text)
            }
            Ok(WsMessage::Close(reason)) => {
                debug!("Peer closed connection: {:?}", reason);
                TransportEvent::Closed
            }
            Ok(WsMessage::Binary(data)) => {
                debug!("Ignoring binary frame ({} bytes)", data.len());
                continue;
            }
            Ok(_) => continue,
            Err(e) => {
                warn!("WebSocket read failed: {}", e);
                TransportEvent::Failed(e.to_string())
            }
        };

        let terminal = !matches!(event, TransportEvent::Message(_));
        if tx.send(event).is_err() || terminal {
            return;
        }
    }

    let _ = tx.send(TransportEvent::Closed);
}

pub struct WsTransport {
    sink: WsSink,
    reader: JoinHandle<()>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        debug!("Sending frame ({} bytes)", text.len());
        self.sink.send(WsMessage::Text(text.to_string())).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        let result = self.sink.send(WsMessage::Close(None)).await;
        self.reader.abort();

        match result {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed) => Ok(()),
            Err(tungstenite::Error::AlreadyClosed) => Err(TransportError::Closed),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
