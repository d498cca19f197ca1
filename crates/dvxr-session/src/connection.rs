//! Connection sessions: room negotiation, transport open, stale-session guard.
//!
//! Every connect request gets a fresh [`SessionId`] and becomes the current
//! session before any network work starts. The work itself runs in a spawned
//! task that never touches orchestrator state; it reports back through the
//! event channel, and the orchestrator discards anything whose id is no
//! longer current when the event is applied. In-flight attempts are never
//! aborted, only superseded.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dvxr_api::{RoomOptions, ServiceClient};
use dvxr_common::error::{DvError, DvResult};
use dvxr_common::models::{AccessToken, ComputerDescriptor};
use tokio::sync::mpsc;

use crate::event::OrchestratorEvent;
use crate::platform::{MediaStream, StreamingTransport, TransportConnection};

/// Identifies one connect attempt. Later attempts compare greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Allocates session ids and remembers which one is current.
#[derive(Debug, Default)]
pub struct SessionTracker {
    issued: u64,
    current: Option<SessionId>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new id and make it current, superseding any previous one.
    pub fn begin(&mut self) -> SessionId {
        self.issued += 1;
        let id = SessionId(self.issued);
        if let Some(previous) = self.current.replace(id) {
            tracing::debug!(%previous, current = %id, "Session superseded");
        }
        id
    }

    pub fn current(&self) -> Option<SessionId> {
        self.current
    }

    pub fn is_current(&self, id: SessionId) -> bool {
        self.current == Some(id)
    }

    /// Forget the current session; every in-flight attempt becomes stale.
    pub fn clear(&mut self) -> Option<SessionId> {
        self.current.take()
    }
}

/// What a connect attempt reports back.
pub enum SessionEvent {
    StreamAdded {
        session: SessionId,
        channel_name: String,
        stream: MediaStream,
        connection: Arc<dyn TransportConnection>,
    },
    Failed {
        session: SessionId,
        channel_name: String,
        error: DvError,
    },
}

impl SessionEvent {
    pub fn session(&self) -> SessionId {
        match self {
            Self::StreamAdded { session, .. } | Self::Failed { session, .. } => *session,
        }
    }
}

/// The transport connection backing the current surface.
pub struct ActiveConnection {
    pub session: SessionId,
    pub channel_name: String,
    pub connection: Arc<dyn TransportConnection>,
    pub connected_at: DateTime<Utc>,
}

impl ActiveConnection {
    pub fn teardown(&self) {
        self.connection.close();
        tracing::info!(session = %self.session, channel = %self.channel_name, "Connection closed");
    }
}

/// One requested connection. Dropping it does not cancel the attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSession {
    pub id: SessionId,
    pub computer_id: String,
    pub channel_name: String,
}

impl ConnectionSession {
    /// Start connecting to `computer` under session `id`.
    ///
    /// Negotiation completes before the transport is created; the outcome
    /// arrives on `events` exactly once.
    pub fn connect(
        id: SessionId,
        computer: &ComputerDescriptor,
        token: AccessToken,
        api: ServiceClient,
        transport: Arc<dyn StreamingTransport>,
        stream_timeout: Duration,
        events: mpsc::UnboundedSender<OrchestratorEvent>,
    ) -> Self {
        let channel_name = computer.channel_name.clone();
        tracing::info!(session = %id, computer = %computer.id, channel = %channel_name, "Connecting");

        let channel = channel_name.clone();
        tokio::spawn(async move {
            let event = match establish(&api, &token, &channel, transport.as_ref(), stream_timeout).await {
                Ok((stream, connection)) => SessionEvent::StreamAdded {
                    session: id,
                    channel_name: channel,
                    stream,
                    connection,
                },
                Err(error) => SessionEvent::Failed { session: id, channel_name: channel, error },
            };
            if events.send(OrchestratorEvent::Session(event)).is_err() {
                tracing::debug!(session = %id, "Orchestrator gone; dropping session outcome");
            }
        });

        Self {
            id,
            computer_id: computer.id.clone(),
            channel_name,
        }
    }
}

/// Negotiate room options, then open the transport and wait for its stream.
async fn establish(
    api: &ServiceClient,
    token: &AccessToken,
    channel_name: &str,
    transport: &dyn StreamingTransport,
    stream_timeout: Duration,
) -> DvResult<(MediaStream, Arc<dyn TransportConnection>)> {
    let options = api
        .request_room_options(token, channel_name)
        .await
        .map_err(DvError::negotiation)?;
    open_stream(transport, options, stream_timeout).await
}

/// Open a transport connection and wait (bounded) for its first stream.
///
/// The connection is closed again on any failure after it was opened.
pub async fn open_stream(
    transport: &dyn StreamingTransport,
    options: RoomOptions,
    stream_timeout: Duration,
) -> DvResult<(MediaStream, Arc<dyn TransportConnection>)> {
    let connection = transport.open(options).await?;

    match tokio::time::timeout(stream_timeout, connection.wait_for_stream()).await {
        Ok(Ok(stream)) => Ok((stream, connection)),
        Ok(Err(e)) => {
            connection.close();
            Err(e)
        }
        Err(_) => {
            connection.close();
            Err(DvError::StreamTimeout { seconds: stream_timeout.as_secs() })
        }
    }
}
