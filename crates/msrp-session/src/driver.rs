//! Tokio event loop around a [`SessionEngine`].
//!
//! The engine itself is synchronous; this module owns it on a task and
//! feeds it commands from a [`SessionHandle`], events from the transport,
//! and timer ticks. The handle is cheap to clone and safe to use from
//! anywhere in the application.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use msrp_core::Body;

use crate::error::SessionError;
use crate::negotiation::PeerInfo;
use crate::session::{SessionEngine, SessionState};
use crate::transport::TransportEvent;

const COMMAND_QUEUE_DEPTH: usize = 64;

enum Command {
    Send {
        body: Option<Body>,
        content_type: Option<String>,
        disposition: Option<String>,
        description: Option<String>,
        reply: oneshot::Sender<Result<String, SessionError>>,
    },
    SetPeer(PeerInfo),
    LocalInfo {
        reply: oneshot::Sender<PeerInfo>,
    },
    AbortSend {
        message_id: Option<String>,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    AbortReceive {
        message_id: Option<String>,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Close,
}

/// Cloneable application-side handle to a running session task.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
}

impl SessionHandle {
    /// Queue a message; resolves once the engine accepted it, with the
    /// message id used in event notifications.
    pub async fn send(
        &self,
        body: Option<Body>,
        content_type: Option<String>,
        disposition: Option<String>,
        description: Option<String>,
    ) -> Result<String, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Send {
                body,
                content_type,
                disposition,
                description,
                reply,
            })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    pub async fn send_text(&self, text: impl Into<String>) -> Result<String, SessionError> {
        self.send(Some(Body::Text(text.into())), None, None, None)
            .await
    }

    /// Hand the engine the peer's negotiated path and accepted types.
    pub async fn set_peer(&self, peer: PeerInfo) -> Result<(), SessionError> {
        self.commands
            .send(Command::SetPeer(peer))
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// Our side of negotiation, for the application to publish.
    pub async fn local_info(&self) -> Result<PeerInfo, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::LocalInfo { reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Abort an outgoing message, or all of them when no id is given.
    pub async fn abort_send(&self, message_id: Option<String>) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::AbortSend { message_id, reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    /// Abort an incoming message, or all of them when no id is given.
    pub async fn abort_receive(&self, message_id: Option<String>) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::AbortReceive { message_id, reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    /// Close the session and stop the task.
    pub async fn close(&self) -> Result<(), SessionError> {
        self.commands
            .send(Command::Close)
            .await
            .map_err(|_| SessionError::Closed)
    }
}

/// Run `engine` on a new task, fed by `transport_events`. The task stops
/// when the session is closed or every handle is dropped.
pub fn spawn(
    engine: SessionEngine,
    transport_events: mpsc::Receiver<TransportEvent>,
) -> (SessionHandle, JoinHandle<()>) {
    let (commands, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
    let task = tokio::spawn(run(engine, rx, transport_events));
    (SessionHandle { commands }, task)
}

async fn run(
    mut engine: SessionEngine,
    mut commands: mpsc::Receiver<Command>,
    mut transport_events: mpsc::Receiver<TransportEvent>,
) {
    loop {
        let deadline = engine.tick();
        if engine.state() == SessionState::Closed {
            break;
        }

        let timer = async {
            match deadline {
                Some(after) => tokio::time::sleep(after).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            command = commands.recv() => match command {
                Some(command) => apply(&mut engine, command),
                // Every handle dropped; tear the session down.
                None => {
                    engine.close();
                    break;
                }
            },
            event = transport_events.recv() => match event {
                Some(TransportEvent::Open) => engine.on_open(),
                Some(TransportEvent::Frame(frame)) => {
                    if let Err(e) = engine.on_frame(&frame) {
                        // Framing is gone; nothing after this byte can be
                        // trusted. Drop the connection and wait for a new one.
                        tracing::warn!(error = %e, "unparseable frame, dropping the connection");
                        engine.on_close();
                    }
                }
                Some(TransportEvent::Close) | None => engine.on_close(),
            },
            _ = timer => {}
        }
    }
}

fn apply(engine: &mut SessionEngine, command: Command) {
    match command {
        Command::Send {
            body,
            content_type,
            disposition,
            description,
            reply,
        } => {
            let result = engine.send(body, content_type, disposition, description);
            let _ = reply.send(result);
        }
        Command::SetPeer(peer) => engine.set_peer(peer),
        Command::LocalInfo { reply } => {
            let _ = reply.send(engine.local_info());
        }
        Command::AbortSend { message_id, reply } => {
            let _ = reply.send(engine.abort_send(message_id.as_deref()));
        }
        Command::AbortReceive { message_id, reply } => {
            let _ = reply.send(engine.abort_receive(message_id.as_deref()));
        }
        Command::Close => engine.close(),
    }
}
