//! Test fixtures: an in-memory context and a publisher that records everything

use std::sync::Arc;

use parking_lot::Mutex;
use support_common::{ChatConfig, JwtService};
use support_core::{
    Conversation, DomainEvent, EventPublisher, EventTarget, Snowflake, SnowflakeGenerator,
};
use support_db::{MemoryStore, Repositories};

use crate::dto::{Actor, AssignRequest, SendMessageRequest};
use crate::services::{ConversationService, MessageService, ServiceContext, ServiceContextBuilder};

pub fn id(raw: i64) -> Snowflake {
    Snowflake::new(raw)
}

#[derive(Debug, Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<(EventTarget, DomainEvent)>>,
    joins: Mutex<Vec<(Snowflake, Snowflake)>>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<(EventTarget, DomainEvent)> {
        self.events.lock().clone()
    }

    pub fn last_event(&self) -> Option<(EventTarget, DomainEvent)> {
        self.events.lock().last().cloned()
    }

    pub fn event_types(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(|(_, e)| e.event_type()).collect()
    }

    pub fn count(&self, event_type: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|(_, e)| e.event_type() == event_type)
            .count()
    }

    pub fn joins(&self) -> Vec<(Snowflake, Snowflake)> {
        self.joins.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
        self.joins.lock().clear();
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, target: EventTarget, event: DomainEvent) {
        self.events.lock().push((target, event));
    }

    fn join_room(&self, user_id: Snowflake, conversation_id: Snowflake) -> bool {
        self.joins.lock().push((user_id, conversation_id));
        true
    }
}

pub struct Harness {
    pub ctx: ServiceContext,
    pub store: Arc<MemoryStore>,
    pub publisher: Arc<RecordingPublisher>,
}

pub fn harness() -> Harness {
    harness_with(ChatConfig::default())
}

pub fn harness_with(chat: ChatConfig) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let publisher = Arc::new(RecordingPublisher::default());
    let ctx = ServiceContextBuilder::new()
        .repositories(Repositories::memory(Arc::clone(&store)))
        .publisher(publisher.clone())
        .jwt_service(Arc::new(JwtService::new("test-secret", 3600)))
        .snowflake_generator(Arc::new(SnowflakeGenerator::new(1)))
        .chat_config(chat)
        .build()
        .unwrap();

    Harness {
        ctx,
        store,
        publisher,
    }
}

impl Harness {
    /// Open conversation for `customer`, optionally assigned to `agent`
    pub async fn open_conversation(
        &self,
        customer: Snowflake,
        agent: Option<Snowflake>,
    ) -> Conversation {
        let service = ConversationService::new(&self.ctx);
        let conversation = service.find_or_start(customer).await.unwrap();
        match agent {
            Some(agent) => service
                .assign(
                    Actor::agent(agent),
                    AssignRequest {
                        conversation_id: conversation.id,
                        admin_id: agent,
                    },
                )
                .await
                .unwrap(),
            None => conversation,
        }
    }

    pub async fn send(&self, actor: Actor, conversation_id: Snowflake, content: &str) {
        MessageService::new(&self.ctx)
            .send(actor, SendMessageRequest::text(Some(conversation_id), content))
            .await
            .unwrap();
    }
}
