// In crates/engine/src/actor.rs

use crate::pipeline::TradingEngine;
use crate::{Error, Result};
use analytics::MetricsSummary;
use core_types::PortfolioState;
use events::{InboundMessage, OutboundMessage};
use risk::RiskParameters;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

enum Command {
    Message {
        message: InboundMessage,
        reply: oneshot::Sender<OutboundMessage>,
    },
    UpdateRisk {
        params: RiskParameters,
        reply: oneshot::Sender<Result<()>>,
    },
    Portfolio {
        reply: oneshot::Sender<PortfolioState>,
    },
    Metrics {
        reply: oneshot::Sender<MetricsSummary>,
    },
    Shutdown,
}

/// A cloneable handle to an engine running behind a mailbox.
///
/// Messages are processed one at a time in arrival order.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<Command>,
}

/// Starts the mailbox loop for `engine` on the current runtime.
///
/// The loop ends when [`EngineHandle::shutdown`] is called or every handle
/// has been dropped; await the returned task to wait for it.
pub fn spawn(engine: Arc<TradingEngine>, capacity: usize) -> (EngineHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let task = tokio::spawn(run(engine, rx));
    (EngineHandle { tx }, task)
}

async fn run(engine: Arc<TradingEngine>, mut rx: mpsc::Receiver<Command>) {
    tracing::info!("Engine mailbox started.");
    while let Some(command) = rx.recv().await {
        match command {
            Command::Message { message, reply } => {
                let response = match message {
                    InboundMessage::TradeExecution { signal, params } => {
                        engine.handle_signal(signal, params.unwrap_or_default()).await
                    }
                };
                if reply.send(OutboundMessage::ExecutionResponse(response)).is_err() {
                    tracing::debug!("Caller went away before the response was sent.");
                }
            }
            Command::UpdateRisk { params, reply } => {
                let _ = reply.send(engine.update_risk_parameters(params).await);
            }
            Command::Portfolio { reply } => {
                let _ = reply.send(engine.portfolio().await);
            }
            Command::Metrics { reply } => {
                let _ = reply.send(engine.metrics_summary().await);
            }
            Command::Shutdown => break,
        }
    }
    tracing::info!("Engine mailbox stopped.");
}

impl EngineHandle {
    /// Queues a message and waits for its response.
    pub async fn submit(&self, message: InboundMessage) -> Result<OutboundMessage> {
        self.request(|reply| Command::Message { message, reply }).await
    }

    pub async fn update_risk_parameters(&self, params: RiskParameters) -> Result<()> {
        self.request(|reply| Command::UpdateRisk { params, reply }).await?
    }

    pub async fn portfolio(&self) -> Result<PortfolioState> {
        self.request(|reply| Command::Portfolio { reply }).await
    }

    pub async fn metrics(&self) -> Result<MetricsSummary> {
        self.request(|reply| Command::Metrics { reply }).await
    }

    /// Stops the loop after the messages already queued ahead of this call.
    pub async fn shutdown(&self) -> Result<()> {
        self.tx.send(Command::Shutdown).await.map_err(|_| Error::MailboxClosed)
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(command(reply)).await.map_err(|_| Error::MailboxClosed)?;
        rx.await.map_err(|_| Error::ReplyDropped)
    }
}
