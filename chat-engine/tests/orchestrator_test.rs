//! Handler-level tests for ChatOrchestrator: the rate → moderation → thread →
//! completion → persist pipeline, including the end-to-end quota scenario.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chat_core::ChatRole;
use chat_engine::{
    ChatOrchestrator, CompletionEngine, ContinuationPolicy, MessageLimiter, ModerationGate,
    CANT_ANSWER_NOW_MSG, UNABLE_TO_ASSIST_MSG,
};
use common::{CompletionStep, MockProvider, DEFAULT_REPLY};
use conversation::ConversationCache;
use llm_client::CompletionParams;

const PROMPT: &str = "You are a helpful assistant.";

struct Setup {
    provider: Arc<MockProvider>,
    cache: ConversationCache,
    orchestrator: ChatOrchestrator,
}

/// Builds an orchestrator over the given mock with test-friendly limits.
/// Single-attempt retries keep failure tests free of backoff sleeps.
fn setup(provider: MockProvider, quota: usize) -> Setup {
    let provider = Arc::new(provider);
    let cache = ConversationCache::new(Duration::from_secs(60));
    let limiter = MessageLimiter::new(quota, Duration::from_secs(60));
    let gate = ModerationGate::new(provider.clone(), 1, false);
    let engine = CompletionEngine::new(
        provider.clone(),
        5,
        CompletionParams::default(),
        4096,
        1,
        ContinuationPolicy::ReturnPartial,
    );
    let orchestrator = ChatOrchestrator::new(limiter, gate, cache.clone(), engine, PROMPT, 2);
    Setup {
        provider,
        cache,
        orchestrator,
    }
}

#[tokio::test]
async fn happy_path_returns_model_reply() {
    let s = setup(MockProvider::new(), 5);

    let reply = s.orchestrator.handle_message("alice", "Hi").await;

    assert_eq!(reply, DEFAULT_REPLY);
    assert_eq!(s.provider.moderation_call_count(), 1);
    assert_eq!(s.provider.completion_call_count(), 1);
}

#[tokio::test]
async fn flagged_input_never_reaches_completion() {
    let s = setup(MockProvider::new().flagging_input(), 5);

    let reply = s.orchestrator.handle_message("alice", "something vile").await;

    assert_eq!(reply, UNABLE_TO_ASSIST_MSG);
    assert_eq!(s.provider.moderation_call_count(), 1);
    assert_eq!(s.provider.completion_call_count(), 0);
    // Nothing is cached for a refused message.
    assert!(s.cache.get("alice").await.is_none());
}

#[tokio::test]
async fn moderation_failure_returns_fallback_message() {
    let s = setup(MockProvider::new().with_moderation_failures(3), 5);

    let reply = s.orchestrator.handle_message("alice", "Hi").await;

    assert_eq!(reply, CANT_ANSWER_NOW_MSG);
    assert_eq!(s.provider.completion_call_count(), 0);
}

#[tokio::test]
async fn completion_failure_returns_fallback_and_persists_nothing() {
    let s = setup(
        MockProvider::new().with_completion_script(vec![CompletionStep::Fail("provider down")]),
        5,
    );

    let reply = s.orchestrator.handle_message("alice", "Hi").await;

    assert_eq!(reply, CANT_ANSWER_NOW_MSG);
    // The user turn is not persisted; the next message starts clean.
    assert!(s.cache.get("alice").await.is_none());
}

#[tokio::test]
async fn conversation_continues_across_messages() {
    let s = setup(MockProvider::new(), 5);

    s.orchestrator.handle_message("alice", "first question").await;
    s.orchestrator.handle_message("alice", "second question").await;

    // The second request carried the whole exchange so far.
    let turns = s.provider.last_request_turns();
    assert_eq!(turns.len(), 4);
    assert_eq!(turns[0].role, ChatRole::System);
    assert_eq!(turns[0].content, PROMPT);
    assert_eq!(turns[1].content, "first question");
    assert_eq!(turns[2].role, ChatRole::Assistant);
    assert_eq!(turns[2].content, DEFAULT_REPLY);
    assert_eq!(turns[3].content, "second question");

    // One thread, one system prompt, five turns after the second reply.
    let record = s.cache.get("alice").await.unwrap();
    assert_eq!(record.threads.len(), 1);
    let thread = record.active_thread().unwrap();
    assert_eq!(thread.turns.len(), 5);
    assert!(!thread.finished);
    let system_count = thread
        .turns
        .iter()
        .filter(|t| t.role == ChatRole::System)
        .count();
    assert_eq!(system_count, 1);
}

#[tokio::test]
async fn truncated_reply_retires_thread() {
    let s = setup(
        MockProvider::new().with_completion_script(vec![CompletionStep::Truncated("cut short")]),
        5,
    );

    let reply = s.orchestrator.handle_message("alice", "Hi").await;
    assert_eq!(reply, "cut short");

    let record = s.cache.get("alice").await.unwrap();
    assert!(record.active_thread().unwrap().finished);

    // The next message starts a fresh thread: system prompt + new user turn only.
    s.orchestrator.handle_message("alice", "And now?").await;
    let turns = s.provider.last_request_turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role, ChatRole::System);
    assert_eq!(turns[1].content, "And now?");

    let record = s.cache.get("alice").await.unwrap();
    assert_eq!(record.threads.len(), 2);
}

#[tokio::test]
async fn users_do_not_share_conversations() {
    let s = setup(MockProvider::new(), 5);

    s.orchestrator.handle_message("alice", "alice question").await;
    s.orchestrator.handle_message("bob", "bob question").await;

    let turns = s.provider.last_request_turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[1].content, "bob question");
    assert_eq!(s.cache.len().await, 2);
}

#[tokio::test]
async fn sixth_message_within_window_is_rate_limited() {
    let s = setup(MockProvider::new(), 5);

    for i in 0..5 {
        let reply = s
            .orchestrator
            .handle_message("alice", &format!("question {i}"))
            .await;
        assert_eq!(reply, DEFAULT_REPLY);
    }

    let reply = s.orchestrator.handle_message("alice", "one more").await;

    assert!(
        reply.starts_with("Sorry, you can ask another question in"),
        "unexpected reply: {reply}"
    );
    // The denied message triggered neither moderation nor completion.
    assert_eq!(s.provider.moderation_call_count(), 5);
    assert_eq!(s.provider.completion_call_count(), 5);

    // Another user is unaffected.
    let reply = s.orchestrator.handle_message("bob", "Hi").await;
    assert_eq!(reply, DEFAULT_REPLY);
}

#[tokio::test]
async fn zero_quota_denies_everything_up_front() {
    let s = setup(MockProvider::new(), 0);

    let reply = s.orchestrator.handle_message("alice", "Hi").await;

    assert!(reply.starts_with("Sorry, you can ask another question in"));
    assert_eq!(s.provider.moderation_call_count(), 0);
    assert_eq!(s.provider.completion_call_count(), 0);
}
