//! Presence service
//!
//! Online/offline follows the session registry: the gateway calls [`PresenceService::connected`]
//! after registering a connection and [`PresenceService::disconnected`] once the registry
//! entry is really gone (not when a superseded connection cleans up).

use chrono::{DateTime, Utc};
use support_core::events::PresenceEvent;
use support_core::{DomainEvent, EventTarget, Participant, ParticipantRole, Snowflake};
use tracing::{info, instrument, warn};

use super::context::ServiceContext;
use super::error::ServiceResult;

/// Presence service
pub struct PresenceService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> PresenceService<'a> {
    /// Create a new PresenceService
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Mark the participant online and tell the agents
    #[instrument(skip(self))]
    pub async fn connected(
        &self,
        user_id: Snowflake,
        role: ParticipantRole,
    ) -> ServiceResult<Participant> {
        let participant = Participant::online(user_id, role);
        self.ctx.participant_repo().upsert(&participant).await?;

        info!(user_id = %user_id, role = %role, "Participant online");

        self.ctx.publisher().publish(
            EventTarget::agents_except(user_id),
            DomainEvent::ParticipantOnline(PresenceEvent {
                user_id,
                role,
                last_seen_at: participant.last_seen_at,
            }),
        );

        Ok(participant)
    }

    /// Mark the participant offline, clear their typing state and tell the agents
    ///
    /// An agent's departure also reaches the customers of the conversations that connection
    /// had joined. The offline event is published even if recording last-seen fails.
    #[instrument(skip(self, joined_rooms))]
    pub async fn disconnected(
        &self,
        user_id: Snowflake,
        role: ParticipantRole,
        joined_rooms: &[Snowflake],
    ) -> ServiceResult<DateTime<Utc>> {
        let last_seen_at = Utc::now();

        self.ctx.typing().clear_user(user_id);

        let recorded = self
            .ctx
            .participant_repo()
            .update_online_status(user_id, false, last_seen_at)
            .await;

        let event = PresenceEvent {
            user_id,
            role,
            last_seen_at,
        };
        self.ctx.publisher().publish(
            EventTarget::agents_except(user_id),
            DomainEvent::ParticipantOffline(event.clone()),
        );

        if role.is_agent() {
            let customers = self.customers_of(user_id, joined_rooms).await;
            if !customers.is_empty() {
                self.ctx.publisher().publish(
                    EventTarget::Users(customers),
                    DomainEvent::ParticipantOffline(event),
                );
            }
        }

        info!(user_id = %user_id, role = %role, "Participant offline");

        recorded?;
        Ok(last_seen_at)
    }

    /// Customers of the joined conversations `agent_id` is still assigned to
    async fn customers_of(&self, agent_id: Snowflake, rooms: &[Snowflake]) -> Vec<Snowflake> {
        let mut customers = Vec::with_capacity(rooms.len());
        for &conversation_id in rooms {
            match self.ctx.conversation_repo().find_by_id(conversation_id).await {
                Ok(Some(conversation)) if conversation.agent_id == Some(agent_id) => {
                    customers.push(conversation.customer_id);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, conversation_id = %conversation_id, "Failed to load conversation for presence");
                }
            }
        }
        customers.sort_unstable();
        customers.dedup();
        customers
    }
}
