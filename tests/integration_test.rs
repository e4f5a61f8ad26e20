//! Integration tests for the full turn flow: orchestrator → generator
//! clients → mock HTTP backends → storage.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mcp_debate_trainer::config::{ChallengerConfig, DefenderConfig, RequestConfig};
use mcp_debate_trainer::error::{GeneratorError, OrchestratorError};
use mcp_debate_trainer::generators::{Challenger, ChallengerClient, DefenderClient};
use mcp_debate_trainer::orchestrator::{NextAction, TurnAction, TurnOrchestrator};
use mcp_debate_trainer::storage::{
    DebateMessage, DebateSession, SenderType, SqliteStorage, Storage,
};

const CHALLENGER_PATH: &str = "/v1beta/models/challenger-test:generateContent";
const DEFENDER_PATH: &str = "/chat/completions";

fn test_request_config() -> RequestConfig {
    RequestConfig {
        timeout_ms: 5000,
        max_retries: 0,
        retry_delay_ms: 50,
    }
}

fn challenger_client(mock_url: &str) -> ChallengerClient {
    let config = ChallengerConfig {
        api_key: "test-challenger-key".to_string(),
        base_url: mock_url.to_string(),
        model: "challenger-test".to_string(),
    };
    ChallengerClient::new(&config, test_request_config()).expect("challenger client")
}

fn defender_client(mock_url: &str) -> DefenderClient {
    let config = DefenderConfig {
        api_key: "test-defender-key".to_string(),
        base_url: mock_url.to_string(),
        model: "defender-test".to_string(),
    };
    DefenderClient::new(&config, test_request_config()).expect("defender client")
}

fn challenger_response(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [
            { "content": { "parts": [ { "text": text } ] } }
        ]
    }))
}

fn defender_response(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [
            { "message": { "role": "assistant", "content": text } }
        ]
    }))
}

async fn build_orchestrator(
    challenger_server: &MockServer,
    defender_server: &MockServer,
) -> (TurnOrchestrator, SqliteStorage) {
    let storage = SqliteStorage::new_in_memory().await.expect("storage");
    let orchestrator = TurnOrchestrator::new(
        storage.clone(),
        Arc::new(challenger_client(&challenger_server.uri())),
        Arc::new(defender_client(&defender_server.uri())),
    );
    (orchestrator, storage)
}

#[tokio::test]
async fn test_apologist_opening_and_follow_up() {
    let challenger_server = MockServer::start().await;
    let defender_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(CHALLENGER_PATH))
        .respond_with(challenger_response("Why trust the gospels?"))
        .mount(&challenger_server)
        .await;

    let (orchestrator, storage) = build_orchestrator(&challenger_server, &defender_server).await;
    let session = DebateSession::new("user-1", "the resurrection", true);
    storage.create_session(&session).await.unwrap();

    // Begin: exactly one AI message, awaiting user input
    let outcome = orchestrator
        .process_turn(&session.id, None, TurnAction::Begin)
        .await
        .unwrap();
    assert_eq!(outcome.appended.len(), 1);
    assert_eq!(outcome.appended[0].sender_type, SenderType::Ai);
    assert!(!outcome.appended[0].content.is_empty());
    assert_eq!(outcome.next_action, NextAction::AwaitingUserInput);

    // User replies: USER then AI follow-up, expert now available
    let outcome = orchestrator
        .process_turn(&session.id, Some("my reply"), TurnAction::UserMessage)
        .await
        .unwrap();
    assert_eq!(outcome.appended.len(), 2);
    assert_eq!(outcome.appended[0].sender_type, SenderType::User);
    assert_eq!(outcome.appended[1].sender_type, SenderType::Ai);
    assert_eq!(outcome.next_action, NextAction::ExpertAvailable);

    let transcript = storage.get_session_messages(&session.id).await.unwrap();
    let senders: Vec<SenderType> = transcript.iter().map(|m| m.sender_type).collect();
    assert_eq!(
        senders,
        vec![SenderType::Ai, SenderType::User, SenderType::Ai]
    );
}

#[tokio::test]
async fn test_expert_proposal_leaves_transcript_unchanged() {
    let challenger_server = MockServer::start().await;
    let defender_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(DEFENDER_PATH))
        .respond_with(defender_response("A stronger apologetic answer."))
        .mount(&defender_server)
        .await;

    let (orchestrator, storage) = build_orchestrator(&challenger_server, &defender_server).await;
    let session = DebateSession::new("user-1", "the resurrection", true);
    storage.create_session(&session).await.unwrap();
    storage
        .create_message(&DebateMessage::new(&session.id, "Q1", SenderType::Ai))
        .await
        .unwrap();
    storage
        .create_message(&DebateMessage::new(&session.id, "my try", SenderType::User))
        .await
        .unwrap();

    let outcome = orchestrator
        .process_turn(&session.id, None, TurnAction::GetExpertResponse)
        .await
        .unwrap();

    assert!(outcome.appended.is_empty());
    assert_eq!(
        outcome.proposed_expert.as_deref(),
        Some("A stronger apologetic answer.")
    );
    assert_eq!(
        storage.get_session_messages(&session.id).await.unwrap().len(),
        2
    );
}

#[tokio::test]
async fn test_expert_adoption_grows_transcript_by_two() {
    let challenger_server = MockServer::start().await;
    let defender_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(CHALLENGER_PATH))
        .respond_with(challenger_response("Next challenge"))
        .mount(&challenger_server)
        .await;

    let (orchestrator, storage) = build_orchestrator(&challenger_server, &defender_server).await;
    let session = DebateSession::new("user-1", "the resurrection", true);
    storage.create_session(&session).await.unwrap();
    storage
        .create_message(&DebateMessage::new(&session.id, "Q1", SenderType::Ai))
        .await
        .unwrap();

    let outcome = orchestrator
        .process_turn(
            &session.id,
            Some("the expert answer"),
            TurnAction::UseExpertResponse,
        )
        .await
        .unwrap();

    assert_eq!(outcome.appended.len(), 2);
    assert!(outcome.appended[0].is_expert_response);

    let transcript = storage.get_session_messages(&session.id).await.unwrap();
    assert_eq!(transcript.len(), 3);
    assert_eq!(transcript[1].sender_type, SenderType::User);
    assert_eq!(transcript[1].content, "the expert answer");
    assert_eq!(transcript[2].sender_type, SenderType::Ai);
}

#[tokio::test]
async fn test_expert_adoption_partial_failure_grows_by_one() {
    let challenger_server = MockServer::start().await;
    let defender_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(CHALLENGER_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("backend down"))
        .mount(&challenger_server)
        .await;

    let (orchestrator, storage) = build_orchestrator(&challenger_server, &defender_server).await;
    let session = DebateSession::new("user-1", "the resurrection", true);
    storage.create_session(&session).await.unwrap();
    storage
        .create_message(&DebateMessage::new(&session.id, "Q1", SenderType::Ai))
        .await
        .unwrap();

    let err = orchestrator
        .process_turn(
            &session.id,
            Some("the expert answer"),
            TurnAction::UseExpertResponse,
        )
        .await
        .unwrap_err();

    match err {
        OrchestratorError::TurnIncomplete { appended, .. } => {
            assert_eq!(appended.content, "the expert answer");
            assert!(appended.is_expert_response);
        }
        other => panic!("expected TurnIncomplete, got {other}"),
    }

    // The adopted message stays committed; nothing else was appended
    let transcript = storage.get_session_messages(&session.id).await.unwrap();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[1].sender_type, SenderType::User);
}

#[tokio::test]
async fn test_skeptic_defense_request_shape() {
    let challenger_server = MockServer::start().await;
    let defender_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(DEFENDER_PATH))
        .respond_with(defender_response("Consider the empty tomb."))
        .mount(&defender_server)
        .await;

    let (orchestrator, storage) = build_orchestrator(&challenger_server, &defender_server).await;
    let session = DebateSession::new("user-1", "the resurrection", false);
    storage.create_session(&session).await.unwrap();

    let outcome = orchestrator
        .process_turn(&session.id, Some("prove it"), TurnAction::UserMessage)
        .await
        .unwrap();

    assert_eq!(outcome.appended.len(), 2);
    assert_eq!(outcome.next_action, NextAction::AwaitingUserInput);

    // Inspect what the defender backend actually received
    let requests = defender_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages.last().unwrap()["role"], "user");
    assert_eq!(messages.last().unwrap()["content"], "prove it");
    assert_eq!(body["stream"], false);
    assert_eq!(requests[0].headers.get("x-api-key").unwrap(), "test-defender-key");
}

#[tokio::test]
async fn test_expert_request_invalid_for_skeptic() {
    let challenger_server = MockServer::start().await;
    let defender_server = MockServer::start().await;

    let (orchestrator, storage) = build_orchestrator(&challenger_server, &defender_server).await;
    let session = DebateSession::new("user-1", "the resurrection", false);
    storage.create_session(&session).await.unwrap();

    let err = orchestrator
        .process_turn(&session.id, None, TurnAction::GetExpertResponse)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OrchestratorError::InvalidRoleTransition { .. }
    ));
    assert!(storage
        .get_session_messages(&session.id)
        .await
        .unwrap()
        .is_empty());
    assert!(defender_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_challenger_retries_then_reports_unavailable() {
    let challenger_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(CHALLENGER_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(3)
        .mount(&challenger_server)
        .await;

    let config = ChallengerConfig {
        api_key: "test-challenger-key".to_string(),
        base_url: challenger_server.uri(),
        model: "challenger-test".to_string(),
    };
    let client = ChallengerClient::new(
        &config,
        RequestConfig {
            timeout_ms: 5000,
            max_retries: 2,
            retry_delay_ms: 10,
        },
    )
    .unwrap();

    let err = client.generate_opening("topic").await.unwrap_err();
    match err {
        GeneratorError::Unavailable { retries, .. } => assert_eq!(retries, 3),
        other => panic!("expected Unavailable, got {other}"),
    }
}

#[tokio::test]
async fn test_empty_completion_is_rejected() {
    let challenger_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(CHALLENGER_PATH))
        .respond_with(challenger_response("   "))
        .mount(&challenger_server)
        .await;

    let client = challenger_client(&challenger_server.uri());

    let err = client.generate_opening("topic").await.unwrap_err();
    match err {
        GeneratorError::Unavailable { message, .. } => {
            assert!(message.contains("empty completion"));
        }
        other => panic!("expected Unavailable wrapping empty completion, got {other}"),
    }
}

#[tokio::test]
async fn test_concurrent_user_messages_serialize_per_session() {
    let challenger_server = MockServer::start().await;
    let defender_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(DEFENDER_PATH))
        .respond_with(
            defender_response("A defense.").set_delay(Duration::from_millis(100)),
        )
        .mount(&defender_server)
        .await;

    let (orchestrator, storage) = build_orchestrator(&challenger_server, &defender_server).await;
    let session = DebateSession::new("user-1", "the resurrection", false);
    storage.create_session(&session).await.unwrap();

    let orchestrator = Arc::new(orchestrator);
    let first = {
        let orch = orchestrator.clone();
        let id = session.id.clone();
        tokio::spawn(async move {
            orch.process_turn(&id, Some("first question"), TurnAction::UserMessage)
                .await
        })
    };
    let second = {
        let orch = orchestrator.clone();
        let id = session.id.clone();
        tokio::spawn(async move {
            orch.process_turn(&id, Some("second question"), TurnAction::UserMessage)
                .await
        })
    };

    let (first, second) = tokio::join!(first, second);
    assert!(first.unwrap().is_ok());
    assert!(second.unwrap().is_ok());

    // Serialized turns keep the log strictly alternating
    let transcript = storage.get_session_messages(&session.id).await.unwrap();
    assert_eq!(transcript.len(), 4);
    let senders: Vec<SenderType> = transcript.iter().map(|m| m.sender_type).collect();
    assert_eq!(
        senders,
        vec![
            SenderType::User,
            SenderType::Ai,
            SenderType::User,
            SenderType::Ai
        ]
    );
}

#[tokio::test]
async fn test_challenger_receives_api_key_header() {
    let challenger_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(CHALLENGER_PATH))
        .respond_with(challenger_response("Q"))
        .mount(&challenger_server)
        .await;

    let client = challenger_client(&challenger_server.uri());
    client.generate_opening("topic").await.unwrap();

    let requests = challenger_server.received_requests().await.unwrap();
    assert_eq!(
        requests[0].headers.get("x-goog-api-key").unwrap(),
        "test-challenger-key"
    );
}
