//! Gateway integration tests
//!
//! Every test starts its own in-process gateway on an ephemeral port with the in-memory
//! store; no external services are needed.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use std::time::Duration;

use integration_tests::{
    assign, authenticate, conversation, send_message, unique_user_id, TestServer,
};
use reqwest::StatusCode;
use serde_json::{json, Value};
use support_common::ChatConfig;
use support_core::{ConversationRepository, ConversationStatus, ParticipantRole};
use tokio_tungstenite::tungstenite::Message;

const CUSTOMER: ParticipantRole = ParticipantRole::Customer;
const AGENT: ParticipantRole = ParticipantRole::Agent;

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::start().await.unwrap();
    let response = server.get("/health").await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_health_stats() {
    let server = TestServer::start().await.unwrap();
    let _agent = server.connect_as(unique_user_id(), AGENT).await.unwrap();
    let _anonymous = server.connect().await.unwrap();
    server
        .eventually(|state| state.registry().connection_count() == 2)
        .await
        .unwrap();

    let response = server.get("/health/stats").await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let stats: Value = response.json().await.unwrap();
    assert_eq!(stats["participants"], 1);
    assert_eq!(stats["agentsOnline"], 1);
    assert_eq!(stats["connections"], 2);
}

// ============================================================================
// Handshake
// ============================================================================

#[tokio::test]
async fn test_bad_token_gets_auth_error_and_may_retry() {
    let server = TestServer::start().await.unwrap();
    let user = unique_user_id();
    let mut client = server.connect().await.unwrap();

    client
        .send("authenticate", authenticate(user, CUSTOMER, "not-a-token"))
        .await
        .unwrap();
    let frame = client.recv().await.unwrap();
    assert_eq!(frame.t, "auth_error");

    // Still unauthenticated
    client
        .send("send_message", send_message(None, "hello"))
        .await
        .unwrap();
    let frame = client.recv().await.unwrap();
    assert_eq!(frame.t, "error");
    assert_eq!(frame.d["code"], "AUTHORIZATION_ERROR");

    let token = server.token(user, CUSTOMER).unwrap();
    client
        .send("authenticate", authenticate(user, CUSTOMER, &token))
        .await
        .unwrap();
    let frame = client.recv().await.unwrap();
    assert_eq!(frame.t, "authenticated");
    assert_eq!(frame.d["userType"], "customer");
}

#[tokio::test]
async fn test_token_for_another_role_is_rejected() {
    let server = TestServer::start().await.unwrap();
    let user = unique_user_id();
    let mut client = server.connect().await.unwrap();

    let customer_token = server.token(user, CUSTOMER).unwrap();
    client
        .send("authenticate", authenticate(user, AGENT, &customer_token))
        .await
        .unwrap();
    assert_eq!(client.recv().await.unwrap().t, "auth_error");
}

#[tokio::test]
async fn test_second_authenticate_is_rejected() {
    let server = TestServer::start().await.unwrap();
    let user = unique_user_id();
    let mut client = server.connect_as(user, CUSTOMER).await.unwrap();

    let token = server.token(user, CUSTOMER).unwrap();
    client
        .send("authenticate", authenticate(user, CUSTOMER, &token))
        .await
        .unwrap();
    let frame = client.expect("error").await.unwrap();
    assert_eq!(frame.d["code"], "ALREADY_AUTHENTICATED");
}

#[tokio::test]
async fn test_protocol_errors_go_to_the_sender() {
    let server = TestServer::start().await.unwrap();
    let mut client = server.connect_as(unique_user_id(), CUSTOMER).await.unwrap();

    client
        .send_raw(Message::Text("{not json".to_string()))
        .await
        .unwrap();
    assert_eq!(client.recv().await.unwrap().d["code"], "VALIDATION_ERROR");

    client.send("dance", json!({})).await.unwrap();
    assert_eq!(client.recv().await.unwrap().d["code"], "UNKNOWN_EVENT");

    client
        .send("join_conversation", json!({ "conversationId": "999999" }))
        .await
        .unwrap();
    assert_eq!(client.recv().await.unwrap().d["code"], "NOT_FOUND");

    client.send("heartbeat", Value::Null).await.unwrap();
    assert_eq!(client.recv().await.unwrap().t, "heartbeat_ack");
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_first_message_starts_conversation() {
    let server = TestServer::start().await.unwrap();
    let customer_id = unique_user_id();
    let mut customer = server.connect_as(customer_id, CUSTOMER).await.unwrap();

    customer
        .send("send_message", send_message(None, "Hello"))
        .await
        .unwrap();

    // Room echo
    let echo = customer.expect("new_message").await.unwrap();
    assert_eq!(echo.d["content"], "Hello");
    assert_eq!(echo.d["senderType"], "customer");

    let conversation_id = echo.conversation_id().unwrap();
    let stored = ConversationRepository::find_by_id(server.store.as_ref(), conversation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, ConversationStatus::Waiting);
    assert_eq!(stored.customer_id, customer_id);
    assert_eq!(server.store.message_count(conversation_id), 1);
}

#[tokio::test]
async fn test_assign_broadcasts_admin_joined() {
    let server = TestServer::start().await.unwrap();
    let agent_id = unique_user_id();
    let mut agent = server.connect_as(agent_id, AGENT).await.unwrap();
    let mut customer = server.connect_as(unique_user_id(), CUSTOMER).await.unwrap();

    customer
        .send("send_message", send_message(None, "Hello"))
        .await
        .unwrap();
    let created = agent.expect("conversation_created").await.unwrap();
    assert_eq!(created.d["status"], "waiting");
    let conversation_id = created.d["id"].as_str().unwrap().parse().unwrap();

    agent
        .send("assign_conversation", assign(conversation_id, agent_id))
        .await
        .unwrap();

    let to_agent = agent.expect("admin_joined").await.unwrap();
    let to_customer = customer.expect("admin_joined").await.unwrap();
    assert_eq!(to_agent.d["adminId"], json!(agent_id.to_string()));
    assert_eq!(to_customer.conversation_id(), Some(conversation_id));

    let stored = ConversationRepository::find_by_id(server.store.as_ref(), conversation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, ConversationStatus::Active);
    assert_eq!(stored.agent_id, Some(agent_id));
}

#[tokio::test]
async fn test_agent_reconnect_replays_missed_messages() {
    let server = TestServer::start().await.unwrap();
    let agent_id = unique_user_id();
    let mut agent = server.connect_as(agent_id, AGENT).await.unwrap();
    let mut customer = server.connect_as(unique_user_id(), CUSTOMER).await.unwrap();

    customer
        .send("send_message", send_message(None, "first"))
        .await
        .unwrap();
    let conversation_id = customer.expect("new_message").await.unwrap().conversation_id().unwrap();
    agent
        .send("assign_conversation", assign(conversation_id, agent_id))
        .await
        .unwrap();
    agent.expect("admin_joined").await.unwrap();

    customer
        .send("send_message", send_message(Some(conversation_id), "second"))
        .await
        .unwrap();
    let live = agent.expect("new_message").await.unwrap();
    assert_eq!(live.d["content"], "second");

    agent.close().await.unwrap();
    customer.expect("user_offline").await.unwrap();

    customer
        .send("send_message", send_message(Some(conversation_id), "third"))
        .await
        .unwrap();
    customer.expect("new_message").await.unwrap();

    let mut agent = server.connect_as(agent_id, AGENT).await.unwrap();
    agent
        .send("join_conversation", conversation(conversation_id))
        .await
        .unwrap();
    let joined = agent.expect("joined_conversation").await.unwrap();
    assert_eq!(joined.conversation_id(), Some(conversation_id));

    let history = agent.expect("message_history").await.unwrap();
    assert_eq!(history.history_contents(), vec!["first", "second", "third"]);
    assert_eq!(history.d["hasMore"], false);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_join_history_precedes_live_messages() {
    let server = TestServer::start().await.unwrap();
    let agent_id = unique_user_id();
    let mut customer = server.connect_as(unique_user_id(), CUSTOMER).await.unwrap();

    customer
        .send("send_message", send_message(None, "m0"))
        .await
        .unwrap();
    let conversation_id = customer.expect("new_message").await.unwrap().conversation_id().unwrap();

    let mut agent = server.connect_as(agent_id, AGENT).await.unwrap();
    agent
        .send("assign_conversation", assign(conversation_id, agent_id))
        .await
        .unwrap();
    agent.expect("admin_joined").await.unwrap();
    agent.close().await.unwrap();

    // The customer keeps talking while the agent rejoins
    let sender = tokio::spawn(async move {
        for i in 1..=1500 {
            customer
                .send(
                    "send_message",
                    send_message(Some(conversation_id), &format!("m{i}")),
                )
                .await
                .unwrap();
        }
    });

    for _ in 0..5 {
        let mut agent = server.connect_as(agent_id, AGENT).await.unwrap();
        agent
            .send("join_conversation", conversation(conversation_id))
            .await
            .unwrap();

        let history = loop {
            let frame = agent.recv().await.unwrap();
            match frame.t.as_str() {
                "message_history" => break frame,
                "new_message" => panic!("{} arrived before message_history", frame.d["content"]),
                _ => {}
            }
        };

        // Live messages pick up after the newest message of the page
        let mut newest = history
            .history_contents()
            .last()
            .map_or(0, |content| message_number(content));
        while let Ok(frame) = tokio::time::timeout(Duration::from_millis(50), agent.recv()).await {
            let frame = frame.unwrap();
            if frame.t == "new_message" {
                let number = message_number(frame.d["content"].as_str().unwrap());
                assert!(number > newest, "m{number} arrived after m{newest}");
                newest = number;
            }
        }

        agent.close().await.unwrap();
    }

    sender.await.unwrap();
}

fn message_number(content: &str) -> u32 {
    content.trim_start_matches('m').parse().unwrap()
}

#[tokio::test]
async fn test_closed_conversation_rejects_sends() {
    let server = TestServer::start().await.unwrap();
    let agent_id = unique_user_id();
    let mut agent = server.connect_as(agent_id, AGENT).await.unwrap();
    let mut customer = server.connect_as(unique_user_id(), CUSTOMER).await.unwrap();

    customer
        .send("send_message", send_message(None, "Hello"))
        .await
        .unwrap();
    let conversation_id = customer.expect("new_message").await.unwrap().conversation_id().unwrap();
    agent
        .send("assign_conversation", assign(conversation_id, agent_id))
        .await
        .unwrap();
    agent.expect("admin_joined").await.unwrap();

    agent
        .send("close_conversation", conversation(conversation_id))
        .await
        .unwrap();
    agent.expect("conversation_closed").await.unwrap();
    let closed = customer.expect("conversation_closed").await.unwrap();
    assert_eq!(closed.d["closedBy"], json!(agent_id.to_string()));

    customer
        .send("send_message", send_message(Some(conversation_id), "wait!"))
        .await
        .unwrap();
    let error = customer.expect("error").await.unwrap();
    assert_eq!(error.d["code"], "TERMINAL_STATE");
    assert_eq!(server.store.message_count(conversation_id), 1);

    // Closing again only answers the caller
    agent
        .send("close_conversation", conversation(conversation_id))
        .await
        .unwrap();
    agent.expect("conversation_closed").await.unwrap();
    customer
        .expect_none("conversation_closed", Duration::from_millis(200))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_simultaneous_sends_reach_both_sides() {
    let server = TestServer::start().await.unwrap();
    let agent_id = unique_user_id();
    let mut agent = server.connect_as(agent_id, AGENT).await.unwrap();
    let mut customer = server.connect_as(unique_user_id(), CUSTOMER).await.unwrap();

    customer
        .send("send_message", send_message(None, "Hello"))
        .await
        .unwrap();
    let conversation_id = customer.expect("new_message").await.unwrap().conversation_id().unwrap();
    agent
        .send("assign_conversation", assign(conversation_id, agent_id))
        .await
        .unwrap();
    agent.expect("admin_joined").await.unwrap();
    customer.expect("admin_joined").await.unwrap();

    let (from_customer, from_agent) = tokio::join!(
        customer.send("send_message", send_message(Some(conversation_id), "from customer")),
        agent.send("send_message", send_message(Some(conversation_id), "from agent")),
    );
    from_customer.unwrap();
    from_agent.unwrap();

    for client in [&mut customer, &mut agent] {
        let mut seen = vec![
            client.expect("new_message").await.unwrap().d["content"].clone(),
            client.expect("new_message").await.unwrap().d["content"].clone(),
        ];
        seen.sort_by_key(ToString::to_string);
        assert_eq!(seen, vec![json!("from agent"), json!("from customer")]);
    }
    assert_eq!(server.store.message_count(conversation_id), 3);
}

// ============================================================================
// Reconnection and liveness
// ============================================================================

#[tokio::test]
async fn test_customer_reconnect_resumes_open_conversation() {
    let server = TestServer::start().await.unwrap();
    let customer_id = unique_user_id();
    let mut customer = server.connect_as(customer_id, CUSTOMER).await.unwrap();

    customer
        .send("send_message", send_message(None, "before the tunnel"))
        .await
        .unwrap();
    let conversation_id = customer.expect("new_message").await.unwrap().conversation_id().unwrap();
    customer.close().await.unwrap();

    let mut customer = server.connect_as(customer_id, CUSTOMER).await.unwrap();
    let joined = customer.expect("joined_conversation").await.unwrap();
    assert_eq!(joined.conversation_id(), Some(conversation_id));
    let history = customer.expect("message_history").await.unwrap();
    assert_eq!(history.history_contents(), vec!["before the tunnel"]);

    // Back in the room without asking
    customer
        .send("send_message", send_message(None, "after the tunnel"))
        .await
        .unwrap();
    let echo = customer.expect("new_message").await.unwrap();
    assert_eq!(echo.conversation_id(), Some(conversation_id));
}

#[tokio::test]
async fn test_new_connection_supersedes_old_one() {
    let server = TestServer::start().await.unwrap();
    let customer_id = unique_user_id();
    let mut first = server.connect_as(customer_id, CUSTOMER).await.unwrap();
    let mut second = server.connect_as(customer_id, CUSTOMER).await.unwrap();

    assert_eq!(first.expect_close().await.unwrap(), 4010);

    // The old connection's cleanup leaves the participant online
    server
        .eventually(|state| state.registry().connection_count() == 1)
        .await
        .unwrap();
    assert!(server.state.registry().is_online(customer_id));

    second.send("heartbeat", Value::Null).await.unwrap();
    assert_eq!(second.recv().await.unwrap().t, "heartbeat_ack");
}

#[tokio::test]
async fn test_binary_frame_closes_with_decode_error() {
    let server = TestServer::start().await.unwrap();
    let mut client = server.connect().await.unwrap();

    client.send_raw(Message::Binary(vec![1, 2, 3])).await.unwrap();
    assert_eq!(client.expect_close().await.unwrap(), 4002);
}

#[tokio::test]
async fn test_silent_connection_times_out() {
    let server = TestServer::start_with_chat(ChatConfig {
        heartbeat_interval_ms: 100,
        heartbeat_timeout_ms: 300,
        ..ChatConfig::default()
    })
    .await
    .unwrap();
    let user = unique_user_id();
    let mut client = server.connect_as(user, CUSTOMER).await.unwrap();

    assert_eq!(client.expect_close().await.unwrap(), 4009);
    server
        .eventually(|state| !state.registry().is_online(user))
        .await
        .unwrap();
}

// ============================================================================
// Typing and read receipts
// ============================================================================

#[tokio::test]
async fn test_typing_and_read_receipts() {
    let server = TestServer::start().await.unwrap();
    let agent_id = unique_user_id();
    let customer_id = unique_user_id();
    let mut agent = server.connect_as(agent_id, AGENT).await.unwrap();
    let mut customer = server.connect_as(customer_id, CUSTOMER).await.unwrap();

    customer
        .send("send_message", send_message(None, "Hello"))
        .await
        .unwrap();
    let conversation_id = customer.expect("new_message").await.unwrap().conversation_id().unwrap();
    agent
        .send("assign_conversation", assign(conversation_id, agent_id))
        .await
        .unwrap();
    agent.expect("admin_joined").await.unwrap();

    customer
        .send("typing_start", conversation(conversation_id))
        .await
        .unwrap();
    let typing = agent.expect("user_typing").await.unwrap();
    assert_eq!(typing.d["isTyping"], true);
    assert_eq!(typing.d["userId"], json!(customer_id.to_string()));

    agent
        .send("mark_read", conversation(conversation_id))
        .await
        .unwrap();
    let read = customer.expect("messages_read").await.unwrap();
    assert_eq!(read.d["count"], 1);
    assert_eq!(read.d["userId"], json!(agent_id.to_string()));

    // Nothing left to mark
    agent
        .send("mark_read", conversation(conversation_id))
        .await
        .unwrap();
    customer
        .expect_none("messages_read", Duration::from_millis(200))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_list_conversations_is_for_agents() {
    let server = TestServer::start().await.unwrap();
    let mut agent = server.connect_as(unique_user_id(), AGENT).await.unwrap();
    let mut customer = server.connect_as(unique_user_id(), CUSTOMER).await.unwrap();

    customer
        .send("send_message", send_message(None, "Hello"))
        .await
        .unwrap();
    customer.expect("new_message").await.unwrap();

    agent.send("list_conversations", Value::Null).await.unwrap();
    let list = agent.expect("conversation_list").await.unwrap();
    assert_eq!(list.d["conversations"].as_array().map(Vec::len), Some(1));

    customer
        .send("list_conversations", json!({ "status": "waiting" }))
        .await
        .unwrap();
    assert_eq!(
        customer.expect("error").await.unwrap().d["code"],
        "AUTHORIZATION_ERROR"
    );
}
