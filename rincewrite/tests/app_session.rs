//! A writing session driven through `Session`, the way a front end drives it.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{graph_with, scripted_llm, CHAT_REPLY, WELCOME_REPLY};
use rincewrite::{Action, AppState, ConversationGraph, Message, MockLlm, Role, Session, View};

/// Keeps every rendered frame.
#[derive(Default)]
struct RecordingView {
    frames: Vec<AppState>,
}

impl View for RecordingView {
    fn render(&mut self, state: &AppState) {
        self.frames.push(state.clone());
    }
}

async fn intake(session: &mut Session<RecordingView>) {
    session
        .dispatch(Action::PieceSubmitted {
            name: "Dune Two".into(),
            description: "sequel outline".into(),
        })
        .await;
    session
        .dispatch(Action::UserSubmitted {
            name: "Ada".into(),
            description: "aspiring novelist".into(),
        })
        .await;
}

#[tokio::test]
async fn intake_then_chat_turns() {
    let llm = Arc::new(
        MockLlm::with_replies(vec![WELCOME_REPLY.into(), CHAT_REPLY.into()]).with_stream_by_char(),
    );
    let mut session = Session::new(graph_with(llm), "novel", RecordingView::default());
    intake(&mut session).await;

    let state = session.state();
    assert!(!state.show_dialog);
    assert!(state.input_enabled && state.conversation_started);
    assert_eq!(state.renderer_content, "# Dune Two\n\nsequel outline\n\n");
    assert_eq!(state.messages.len(), 1);
    assert_eq!(state.messages[0].text, WELCOME_REPLY);

    // One frame per streamed character, between the intake frames and the final one.
    let frames = &session.view().frames;
    assert!(frames.len() > WELCOME_REPLY.chars().count());
    assert!(frames.iter().any(|f| f.turn_in_flight()
        && f.messages.last().map(|m| m.text.as_str()) == Some("W")));

    session
        .dispatch(Action::MessageSubmitted("Where do I begin?".into()))
        .await;
    let state = session.state();
    assert_eq!(state.messages.len(), 3);
    assert_eq!(state.messages[1].role, Role::User);
    assert_eq!(state.messages[2].text, CHAT_REPLY);
    assert!(state.input_enabled);
}

#[tokio::test]
async fn action_button_sends_its_label() {
    let llm = scripted_llm();
    let mut session = Session::new(graph_with(llm.clone()), "novel", RecordingView::default());
    intake(&mut session).await;

    session.dispatch(Action::ActionButtonPressed(1)).await;
    let state = session.state();
    assert_eq!(state.messages[1].text, "help me structure the thing");
    let last_call = llm.calls().pop().unwrap();
    assert_eq!(
        last_call.last().map(|m| m.content().to_string()),
        Some("help me structure the thing".to_string())
    );
}

/// **Scenario**: a failed turn is shown inline and the next submission works.
#[tokio::test]
async fn failed_turn_is_reported_and_recoverable() {
    let llm = scripted_llm();
    let graph = graph_with(llm.clone());
    let mut session = Session::new(graph.clone(), "novel", RecordingView::default());
    intake(&mut session).await;

    llm.fail_next(1);
    session.dispatch(Action::MessageSubmitted("first try".into())).await;
    let state = session.state();
    assert!(state.input_enabled);
    let last = state.messages.last().unwrap();
    assert_eq!(last.role, Role::System);
    assert!(last.text.starts_with("error: "), "{}", last.text);

    session.dispatch(Action::MessageSubmitted("first try".into())).await;
    assert_eq!(session.state().messages.last().unwrap().text, CHAT_REPLY);

    // The display shows the resent message once, as the store does.
    let shown: Vec<_> = session
        .state()
        .messages
        .iter()
        .filter(|m| m.role == Role::User)
        .map(|m| m.text.clone())
        .collect();
    let stored = graph.snapshot("novel").await.unwrap().unwrap().state.messages;
    let sent: Vec<_> = stored
        .iter()
        .filter(|m| matches!(m, Message::User(_)))
        .map(|m| m.content().to_string())
        .collect();
    assert_eq!(shown, vec!["first try".to_string()]);
    assert_eq!(shown, sent);
}

#[tokio::test]
async fn failed_welcome_reopens_the_intake_dialog() {
    let llm = scripted_llm();
    llm.fail_next(1);
    let graph = graph_with(llm);
    let mut session = Session::new(graph.clone(), "novel", RecordingView::default());
    intake(&mut session).await;

    let state = session.state();
    assert!(state.show_dialog);
    assert!(!state.conversation_started);
    assert!(graph.snapshot("novel").await.unwrap().is_none());
}

#[tokio::test]
async fn reopen_restores_a_stored_conversation() {
    let graph = graph_with(scripted_llm());
    let mut first = Session::new(graph.clone(), "novel", RecordingView::default());
    intake(&mut first).await;
    first.dispatch(Action::MessageSubmitted("hello".into())).await;

    let reopened: Session<RecordingView> =
        Session::reopen(graph.clone(), "novel", RecordingView::default())
            .await
            .unwrap()
            .expect("thread exists");
    assert_eq!(reopened.state().messages, first.state().messages);
    assert_eq!(reopened.state().renderer_content, first.state().renderer_content);

    let missing = Session::reopen(graph, "nobody", RecordingView::default())
        .await
        .unwrap();
    assert!(missing.is_none());
}

/// **Scenario**: cancelling a slow welcome ends the turn with an inline error.
#[tokio::test]
async fn cancelled_turn_is_shown_inline() {
    let slow = Arc::new(MockLlm::new(WELCOME_REPLY).with_delay(Duration::from_secs(10)));
    let graph: ConversationGraph = graph_with(slow);
    let mut session = Session::new(graph.clone(), "novel", RecordingView::default());

    let canceller = session.canceller();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });
    intake(&mut session).await;

    let state = session.state();
    assert!(state.show_dialog);
    assert_eq!(state.messages.last().map(|m| m.role), Some(Role::System));
    assert!(graph.snapshot("novel").await.unwrap().is_none());
}
