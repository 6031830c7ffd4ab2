//! Participant entity <-> model mapper

use support_core::entities::Participant;
use support_core::value_objects::Snowflake;
use support_core::DomainError;

use super::corrupt_column;
use crate::models::ParticipantModel;

/// Convert ParticipantModel to Participant entity
impl TryFrom<ParticipantModel> for Participant {
    type Error = DomainError;

    fn try_from(model: ParticipantModel) -> Result<Self, Self::Error> {
        Ok(Participant {
            id: Snowflake::new(model.id),
            role: model
                .role
                .parse()
                .map_err(|e| corrupt_column("participants.role", e))?,
            online: model.online,
            last_seen_at: model.last_seen_at,
        })
    }
}
