use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{Principal, PhotoResponse};
use crate::entitlement::Entitlement;

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms the connection's identity
    Ready { principal: Principal, name: String },

    /// The connection now receives this event's feed
    Subscribed { event_id: Uuid },

    /// The subscription request was refused
    SubscribeDenied { event_id: Uuid, reason: String },

    /// A guest joined the event
    GuestJoined {
        event_id: Uuid,
        guest_id: Uuid,
        display_name: String,
    },

    /// A photo was uploaded
    PhotoCreate { event_id: Uuid, photo: PhotoResponse },

    /// A photo's caption changed
    PhotoUpdate {
        event_id: Uuid,
        photo_id: Uuid,
        caption: Option<String>,
    },

    /// A photo was deleted by its owner
    PhotoDelete {
        event_id: Uuid,
        photo_id: Uuid,
        guest_id: Uuid,
    },

    /// The receiving guest's allowance changed
    QuotaUpdate {
        guest_id: Uuid,
        entitlement: Entitlement,
    },
}

impl GatewayEvent {
    /// Returns the event_id if this event belongs to one event's feed.
    /// Events that return `None` are connection-level and only ever sent
    /// to a single client.
    pub fn event_id(&self) -> Option<Uuid> {
        match self {
            Self::GuestJoined { event_id, .. }
            | Self::PhotoCreate { event_id, .. }
            | Self::PhotoUpdate { event_id, .. }
            | Self::PhotoDelete { event_id, .. } => Some(*event_id),
            _ => None,
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Start receiving one event's feed, replacing any previous subscription
    Subscribe { event_id: Uuid },

    /// Stop receiving feed events
    Unsubscribe,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_command_wire_format() {
        let id = Uuid::new_v4();
        let raw = format!(r#"{{"type":"Subscribe","data":{{"event_id":"{id}"}}}}"#);
        match serde_json::from_str::<GatewayCommand>(&raw).unwrap() {
            GatewayCommand::Subscribe { event_id } => assert_eq!(event_id, id),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn quota_update_is_not_event_scoped() {
        let event = GatewayEvent::QuotaUpdate {
            guest_id: Uuid::new_v4(),
            entitlement: Entitlement::grant(10),
        };
        assert_eq!(event.event_id(), None);
    }
}
