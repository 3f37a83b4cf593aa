//! Application actor.
//!
//! One task owns the domain store, the transport session and the per-session
//! dispatcher, and processes console commands, negotiation completions and
//! channel signals one at a time. The UI talks to it through an [`AppHandle`]
//! and observes it through [`AppSnapshot`]s on a `watch` channel.

pub mod console;
pub mod replay;

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::core::dispatch::EventDispatcher;
use crate::core::handler::CommandHandler;
use crate::core::realtime::{
    ChannelSignal, ClientEvent, Established, NegotiationError, SessionState, TransportSession,
};
use crate::core::tools::{SessionOptions, ToolRegistry};
use crate::domain::DomainModule;

const COMMAND_BUFFER: usize = 64;

/// The app task has exited.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Voice app is no longer running")]
pub struct AppClosed;

/// Requests from the UI.
#[derive(Debug)]
pub enum ControlCommand<A> {
    Start,
    Stop,
    Action(A),
    Shutdown,
}

/// What the UI renders.
#[derive(Debug, Clone, PartialEq)]
pub struct AppSnapshot<S> {
    pub session: SessionState,
    pub tools_configured: bool,
    pub domain: S,
}

/// Cloneable front door to a running [`VoiceApp`].
pub struct AppHandle<D: DomainModule> {
    commands: mpsc::Sender<ControlCommand<D::Action>>,
    snapshots: watch::Receiver<AppSnapshot<D::Snapshot>>,
}

impl<D: DomainModule> Clone for AppHandle<D> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            snapshots: self.snapshots.clone(),
        }
    }
}

impl<D: DomainModule> AppHandle<D> {
    async fn send(&self, command: ControlCommand<D::Action>) -> Result<(), AppClosed> {
        self.commands.send(command).await.map_err(|_| AppClosed)
    }

    pub async fn start(&self) -> Result<(), AppClosed> {
        self.send(ControlCommand::Start).await
    }

    pub async fn stop(&self) -> Result<(), AppClosed> {
        self.send(ControlCommand::Stop).await
    }

    pub async fn act(&self, action: D::Action) -> Result<(), AppClosed> {
        self.send(ControlCommand::Action(action)).await
    }

    pub async fn shutdown(&self) -> Result<(), AppClosed> {
        self.send(ControlCommand::Shutdown).await
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> AppSnapshot<D::Snapshot> {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AppSnapshot<D::Snapshot>> {
        self.snapshots.clone()
    }
}

type NegotiationOutcome = (u64, Result<Established, NegotiationError>);

/// Single owner of all mutable client state.
pub struct VoiceApp<D: DomainModule> {
    session: TransportSession,
    handler: CommandHandler<D>,
    registry: Arc<ToolRegistry>,
    options: SessionOptions,
    dispatcher: Option<EventDispatcher>,
    snapshots: watch::Sender<AppSnapshot<D::Snapshot>>,
}

impl<D: DomainModule> VoiceApp<D> {
    pub fn new(session: TransportSession, domain: D, options: SessionOptions) -> Self {
        let handler = CommandHandler::new(domain);
        let (snapshots, _) = watch::channel(AppSnapshot {
            session: session.state(),
            tools_configured: false,
            domain: handler.snapshot(),
        });
        Self {
            session,
            handler,
            registry: Arc::new(D::registry()),
            options,
            dispatcher: None,
            snapshots,
        }
    }

    /// Spawn the actor on the current runtime.
    pub fn spawn(self) -> (AppHandle<D>, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let handle = AppHandle {
            commands: commands_tx,
            snapshots: self.snapshots.subscribe(),
        };
        let task = tokio::spawn(self.run(commands_rx));
        (handle, task)
    }

    async fn run(mut self, mut commands: mpsc::Receiver<ControlCommand<D::Action>>) {
        let (negotiated_tx, mut negotiated_rx) = mpsc::unbounded_channel::<NegotiationOutcome>();
        info!(domain = %D::KIND, tools = self.registry.len(), "Voice app running");

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(ControlCommand::Start) => self.start(&negotiated_tx),
                    Some(ControlCommand::Stop) => self.stop().await,
                    Some(ControlCommand::Action(action)) => self.handler.apply_action(action),
                    Some(ControlCommand::Shutdown) | None => {
                        self.stop().await;
                        self.publish();
                        break;
                    }
                },
                Some((generation, result)) = negotiated_rx.recv() => {
                    if self.session.complete(generation, result).await.is_err() {
                        self.dispatcher = None;
                    }
                }
                signal = self.session.next_signal(), if self.session.is_attached() => {
                    self.on_signal(signal).await;
                }
            }
            self.publish();
        }

        info!("Voice app stopped");
    }

    fn start(&mut self, negotiated_tx: &mpsc::UnboundedSender<NegotiationOutcome>) {
        let Some(negotiation) = self.session.begin() else {
            return;
        };
        self.dispatcher = Some(EventDispatcher::new(
            Arc::clone(&self.registry),
            self.options.clone(),
        ));

        let tx = negotiated_tx.clone();
        tokio::spawn(async move {
            let generation = negotiation.generation();
            let result = negotiation.run().await;
            if tx.send((generation, result)).is_err() {
                debug!(generation, "App gone before negotiation finished");
            }
        });
    }

    async fn stop(&mut self) {
        self.session.stop().await;
        self.dispatcher = None;
    }

    async fn on_signal(&mut self, signal: ChannelSignal) {
        if let Some(event) = self.session.handle_signal(signal).await
            && let Some(dispatcher) = self.dispatcher.as_mut()
        {
            let outbound = dispatcher.handle(&event, &mut self.handler);
            for event in &outbound {
                let delivered = self.session.send(event).await;
                if !delivered && matches!(event, ClientEvent::SessionUpdate { .. }) {
                    dispatcher.tools_not_delivered();
                }
            }
        }

        if self.session.state() == SessionState::Idle {
            self.dispatcher = None;
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(AppSnapshot {
            session: self.session.state(),
            tools_configured: self
                .dispatcher
                .as_ref()
                .is_some_and(EventDispatcher::tools_configured),
            domain: self.handler.snapshot(),
        });
    }
}
