//! Session driver: runs the pure update loop against a conversation graph.
//!
//! [`Session::dispatch`] applies an action, pushes the new state to the [`View`]
//! on every `Render` effect, and executes `StartConversation` /
//! `ResumeConversation` by draining the graph's event stream back into actions.

use std::sync::{Arc, Mutex};

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::conversation::{ConversationEvent, ConversationGraph, ConversationStream};
use crate::error::ConversationError;

use super::action::{Action, Effect};
use super::state::AppState;
use super::update::{update, Transition};

/// Display collaborator. Receives a full snapshot on every render.
pub trait View: Send {
    fn render(&mut self, state: &AppState);
}

/// Cancels the turn in flight. Cloneable so a signal handler can hold it while
/// the session is busy.
#[derive(Clone, Default)]
pub struct TurnCanceller {
    current: Arc<Mutex<CancellationToken>>,
}

impl TurnCanceller {
    /// Cancels the running turn, if any. The next turn gets a fresh token.
    pub fn cancel(&self) {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .cancel();
    }

    fn next_turn(&self) -> CancellationToken {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if current.is_cancelled() {
            *current = CancellationToken::new();
        }
        current.clone()
    }
}

/// One writing session: display state, thread id, conversation graph and view.
pub struct Session<V: View> {
    state: AppState,
    thread_id: String,
    graph: ConversationGraph,
    view: V,
    canceller: TurnCanceller,
}

impl<V: View> Session<V> {
    /// New session showing the intake dialog.
    pub fn new(graph: ConversationGraph, thread_id: impl Into<String>, view: V) -> Self {
        Self {
            state: AppState::default(),
            thread_id: thread_id.into(),
            graph,
            view,
            canceller: TurnCanceller::default(),
        }
    }

    /// Session attached to a thread that already has a conversation in the store.
    /// Returns `None` when the thread is unknown.
    pub async fn reopen(
        graph: ConversationGraph,
        thread_id: impl Into<String>,
        view: V,
    ) -> Result<Option<Self>, ConversationError> {
        let thread_id = thread_id.into();
        let Some(snapshot) = graph.snapshot(&thread_id).await? else {
            return Ok(None);
        };
        tracing::info!(thread_id = %thread_id, position = %snapshot.position, "session reopened");
        Ok(Some(Self {
            state: AppState::from_conversation(&snapshot.state),
            thread_id,
            graph,
            view,
            canceller: TurnCanceller::default(),
        }))
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    /// Handle that cancels the turn in flight.
    pub fn canceller(&self) -> TurnCanceller {
        self.canceller.clone()
    }

    /// Draws the current state.
    pub fn render(&mut self) {
        self.view.render(&self.state);
    }

    /// Applies `action` and runs the effects it requests. Graph failures are
    /// turned into `TurnFailed` and shown inline; this never returns an error.
    pub async fn dispatch(&mut self, action: Action) {
        for effect in self.apply(action) {
            let cancel = self.canceller.next_turn();
            let events = match effect {
                Effect::StartConversation(intake) => {
                    self.graph
                        .start_with_cancel(&self.thread_id, intake, cancel)
                        .await
                }
                Effect::ResumeConversation(patch) => {
                    self.graph
                        .resume_with_cancel(&self.thread_id, patch, cancel)
                        .await
                }
                Effect::Render => continue,
            };
            self.run_turn(events).await;
        }
    }

    /// Runs the transition, renders on `Render`, returns the remaining effects.
    fn apply(&mut self, action: Action) -> Vec<Effect> {
        let Transition { state, effects } = update(&self.state, action);
        self.state = state;
        let mut pending = Vec::new();
        for effect in effects {
            match effect {
                Effect::Render => self.view.render(&self.state),
                other => pending.push(other),
            }
        }
        pending
    }

    async fn run_turn(&mut self, events: Result<ConversationStream, ConversationError>) {
        let mut events = match events {
            Ok(events) => events,
            Err(e) => {
                self.apply(Action::TurnFailed(e));
                return;
            }
        };
        while let Some(event) = events.next().await {
            let terminal = event.is_terminal();
            let action = match event {
                ConversationEvent::Token { text, .. } => Action::TokenReceived(text),
                ConversationEvent::Paused { .. } => Action::TurnFinished,
                ConversationEvent::Failed(e) => Action::TurnFailed(e),
            };
            self.apply(action);
            if terminal {
                return;
            }
        }
        self.apply(Action::TurnFailed(ConversationError::ExecutionFailed(
            "event stream closed before the turn ended".into(),
        )));
    }
}
