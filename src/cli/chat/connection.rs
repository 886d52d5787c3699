use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};
use url::Url;

use super::conversation_state::ConversationState;
use crate::ws_client::{Connector, EventReceiver, Transport, TransportError, TransportEvent};

/// Seeded into the conversation as soon as the connection opens. It never
/// comes from the backend.
pub const GREETING: &str =
    "Hello! I'm your travel assistant. How can I help you plan your trip to Singapore?";

/// Lifecycle of the single backend connection.
///
/// `Connecting -> Open -> Closed`, with `Error` reachable from any state and
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "online",
            ConnectionState::Closed => "closed",
            ConnectionState::Error => "error",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The text was logged and transmitted; carries the new message id.
    Sent(u64),
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Input was empty after trimming.
    Empty,
    /// A reply to the previous message is still outstanding.
    Busy,
    NotConnected,
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("no response within {} seconds", .0.as_secs())]
    ResponseTimeout(Duration),
}

/// Owns the connection and the "awaiting response" flag.
///
/// Requests and replies are not correlated: whatever frame arrives next is
/// taken as the reply. Strict alternation comes from refusing to send while
/// a reply is outstanding.
pub struct ConnectionManager {
    transport: Option<Box<dyn Transport>>,
    events: Option<EventReceiver>,
    state: ConnectionState,
    awaiting_since: Option<Instant>,
    response_timeout: Duration,
}

impl ConnectionManager {
    pub fn new(response_timeout: Duration) -> Self {
        Self {
            transport: None,
            events: None,
            state: ConnectionState::Closed,
            awaiting_since: None,
            response_timeout,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_awaiting_response(&self) -> bool {
        self.awaiting_since.is_some()
    }

    /// Connect once. No retry: on failure the manager is left in
    /// [`ConnectionState::Error`] and every later `send` is ignored.
    pub async fn open(
        &mut self,
        connector: &dyn Connector,
        endpoint: &Url,
        conversation: &mut ConversationState,
    ) -> Result<(), ConnectionError> {
        self.state = ConnectionState::Connecting;
        info!("Connecting to {}", endpoint);

        match connector.connect(endpoint).await {
            Ok((transport, events)) => {
                self.transport = Some(transport);
                self.events = Some(events);
                self.state = ConnectionState::Open;
                conversation.add_bot_message(GREETING);
                Ok(())
            }
            Err(e) => {
                self.state = ConnectionState::Error;
                Err(e.into())
            }
        }
    }

    /// Log `text` as a user message, then transmit it verbatim.
    pub async fn send(
        &mut self,
        text: &str,
        conversation: &mut ConversationState,
    ) -> Result<SendOutcome, ConnectionError> {
        if text.trim().is_empty() {
            return Ok(SendOutcome::Ignored(IgnoreReason::Empty));
        }
        if self.is_awaiting_response() {
            debug!("Dropping send while a response is outstanding");
            return Ok(SendOutcome::Ignored(IgnoreReason::Busy));
        }
        let transport = match self.transport.as_mut() {
            Some(transport) if self.state == ConnectionState::Open => transport,
            _ => {
                debug!("Dropping send, connection is {}", self.state);
                return Ok(SendOutcome::Ignored(IgnoreReason::NotConnected));
            }
        };

        let id = conversation.add_user_message(text).id();

        if let Err(e) = transport.send_text(text).await {
            warn!("Failed to transmit message #{}: {}", id, e);
            self.fail();
            return Err(e.into());
        }

        self.awaiting_since = Some(Instant::now());
        Ok(SendOutcome::Sent(id))
    }

    pub fn on_message(&mut self, payload: String, conversation: &mut ConversationState) {
        if let Some(since) = self.awaiting_since.take() {
            debug!("Response arrived after {:?}", since.elapsed());
        }
        conversation.add_bot_message(&payload);
    }

    /// Closure and failure leave the awaiting flag untouched; only the
    /// response deadline clears it.
    pub fn on_event(&mut self, event: TransportEvent, conversation: &mut ConversationState) {
        match event {
            TransportEvent::Message(payload) => self.on_message(payload, conversation),
            TransportEvent::Closed => {
                if self.state != ConnectionState::Error {
                    info!("Connection closed by peer");
                    self.state = ConnectionState::Closed;
                }
                self.transport = None;
                self.events = None;
            }
            TransportEvent::Failed(reason) => {
                warn!("Connection failed: {}", reason);
                self.fail();
            }
        }
    }

    /// Deliver every event that has already arrived, without waiting.
    pub fn poll(&mut self, conversation: &mut ConversationState) -> usize {
        let mut delivered = 0;

        while let Some(events) = self.events.as_mut() {
            let next = events.try_recv();
            match next {
                Ok(event) => {
                    self.on_event(event, conversation);
                    delivered += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.on_event(TransportEvent::Closed, conversation);
                    break;
                }
            }
        }

        delivered
    }

    /// Wait until the outstanding request is answered or its deadline
    /// passes. On expiry the request is abandoned and the flag cleared.
    pub async fn wait_for_response(
        &mut self,
        conversation: &mut ConversationState,
    ) -> Result<(), ConnectionError> {
        while let Some(since) = self.awaiting_since {
            let deadline = since + self.response_timeout;

            let next = match self.events.as_mut() {
                Some(events) => time::timeout_at(deadline, events.recv()).await.ok(),
                None => {
                    time::sleep_until(deadline).await;
                    None
                }
            };

            match next {
                Some(Some(event)) => self.on_event(event, conversation),
                Some(None) => self.on_event(TransportEvent::Closed, conversation),
                None => {
                    self.awaiting_since = None;
                    warn!("No response within {:?}", self.response_timeout);
                    return Err(ConnectionError::ResponseTimeout(self.response_timeout));
                }
            }
        }

        Ok(())
    }

    pub async fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.close().await {
                debug!("Error while closing connection: {}", e);
            }
            info!("Connection closed");
        }
        self.events = None;
        if self.state != ConnectionState::Error {
            self.state = ConnectionState::Closed;
        }
    }

    fn fail(&mut self) {
        self.state = ConnectionState::Error;
        self.transport = None;
        self.events = None;
    }
}
