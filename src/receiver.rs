//! Command listener for coordinator-pushed commands.
//!
//! The coordinator POSTs a [`Command`] to `/` on this agent's assigned port.
//! `TESTNOW` is answered OK and then handed to the orchestrator through a
//! two-step rendezvous: the handler sends the command code, then waits until
//! the orchestrator acknowledges it. Anything else is refused without
//! touching the rendezvous.
//!
//! The HTTP reply never waits on the orchestrator; the handoff runs on its own
//! task once the reply has been produced.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::post,
};
use std::net::SocketAddr;
use tgo_common::{Command, ReplyCode, StatusReply};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::errors::OrchestratorError;

/// One command passed from the listener to the orchestrator.
#[derive(Debug)]
pub struct Handoff {
    pub code: i64,
    ack: oneshot::Sender<()>,
}

impl Handoff {
    /// Release the handler that delivered this command.
    pub fn acknowledge(self) {
        let _ = self.ack.send(());
    }
}

/// Listener side of the rendezvous.
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::Sender<Handoff>,
}

/// Orchestrator side of the rendezvous.
#[derive(Debug)]
pub struct CommandInbox {
    rx: mpsc::Receiver<Handoff>,
}

/// Create a single-slot rendezvous channel.
pub fn rendezvous() -> (CommandSender, CommandInbox) {
    let (tx, rx) = mpsc::channel(1);
    (CommandSender { tx }, CommandInbox { rx })
}

impl CommandSender {
    /// Deliver `code` and block until the orchestrator acknowledges it.
    ///
    /// Returns false if the orchestrator went away before acknowledging.
    pub async fn deliver(&self, code: i64) -> bool {
        let (ack, acked) = oneshot::channel();
        if self.tx.send(Handoff { code, ack }).await.is_err() {
            return false;
        }
        acked.await.is_ok()
    }
}

impl CommandInbox {
    /// Wait for the next command. `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<Handoff> {
        self.rx.recv().await
    }
}

/// Long-lived HTTP listener feeding the rendezvous.
pub struct CommandReceiver {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl CommandReceiver {
    /// Bind to `port` on all interfaces and serve until stopped.
    pub async fn start(port: u16, sender: CommandSender) -> Result<Self, OrchestratorError> {
        Self::bind(SocketAddr::from(([0, 0, 0, 0], port)), sender).await
    }

    pub async fn bind(addr: SocketAddr, sender: CommandSender) -> Result<Self, OrchestratorError> {
        let listener_error = |source| OrchestratorError::Listener {
            port: addr.port(),
            source,
        };
        let listener = TcpListener::bind(addr).await.map_err(listener_error)?;
        let addr = listener.local_addr().map_err(listener_error)?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let app = build_router(sender);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
            {
                error!(error = %e, "command listener failed");
            }
        });

        info!(%addr, "listening for coordinator commands");
        Ok(Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for CommandReceiver {
    fn drop(&mut self) {
        self.stop();
    }
}

fn build_router(sender: CommandSender) -> Router {
    Router::new()
        .route("/", post(command_handler))
        .with_state(sender)
}

async fn command_handler(
    State(sender): State<CommandSender>,
    body: Bytes,
) -> (StatusCode, Json<StatusReply>) {
    let cmd: Command = match serde_json::from_slice(&body) {
        Ok(cmd) => cmd,
        Err(e) => {
            warn!(error = %e, "undecodable command");
            return (
                StatusCode::BAD_REQUEST,
                Json(StatusReply::new("cannot decode command", ReplyCode::BadCommand)),
            );
        }
    };
    debug!(?cmd, "command received");

    if cmd.command != Command::TESTNOW {
        warn!(command = %cmd.command, "unrecognized command");
        return (
            StatusCode::OK,
            Json(StatusReply::new("bad command", ReplyCode::BadCommand)),
        );
    }

    let code = cmd.cmd_code;
    tokio::spawn(async move {
        if sender.deliver(code).await {
            debug!(code, "orchestrator acknowledged command");
        } else {
            warn!(code, "orchestrator is no longer waiting for commands");
        }
    });
    (StatusCode::OK, Json(StatusReply::ok()))
}
