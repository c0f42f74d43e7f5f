use serde_json::Value;

use crate::weclapp::client as resources;

/// Local entity family an ERP event refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Task,
    SalesOrder,
    TimeRecord,
    Party,
    User,
}

impl EntityKind {
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix.to_ascii_lowercase().as_str() {
            "task" => Some(EntityKind::Task),
            "salesorder" => Some(EntityKind::SalesOrder),
            "timetracking" | "timerecord" => Some(EntityKind::TimeRecord),
            "party" | "customer" => Some(EntityKind::Party),
            "user" => Some(EntityKind::User),
            _ => None,
        }
    }

    /// WeClapp REST resource holding this entity
    pub fn resource(&self) -> &'static str {
        match self {
            EntityKind::Task => resources::TASK,
            EntityKind::SalesOrder => resources::SALES_ORDER,
            EntityKind::TimeRecord => resources::TIME_RECORD,
            EntityKind::Party => resources::PARTY,
            EntityKind::User => resources::USER,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    Created,
    Updated,
    Deleted,
    Other,
}

impl EventAction {
    fn from_suffix(suffix: &str) -> Self {
        match suffix.to_ascii_lowercase().as_str() {
            "created" | "create" => EventAction::Created,
            "updated" | "update" => EventAction::Updated,
            "deleted" | "delete" => EventAction::Deleted,
            _ => EventAction::Other,
        }
    }
}

/// An inbound webhook payload reduced to what dispatch needs
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEvent {
    pub event_type: String,
    pub entity: Option<EntityKind>,
    pub action: EventAction,
    pub entity_id: Option<String>,
}

impl WebhookEvent {
    /// Accepts `{"event"|"type": "task.updated", "entityId"|"id": ...}` and the
    /// `{"entityName": "task", "type": "updated"}` form.
    pub fn from_payload(payload: &Value) -> Self {
        let event_type = dotted(payload, "event")
            .or_else(|| dotted(payload, "type"))
            .or_else(|| {
                let entity = text(payload, "entityName")?;
                let action = text(payload, "type").unwrap_or_else(|| "updated".to_string());
                Some(format!("{}.{}", entity, action))
            })
            .unwrap_or_else(|| "unknown".to_string());

        let (prefix, suffix) = match event_type.split_once('.') {
            Some((prefix, _)) => (prefix, event_type.rsplit('.').next().unwrap_or_default()),
            None => (event_type.as_str(), ""),
        };

        WebhookEvent {
            entity: EntityKind::from_prefix(prefix),
            action: EventAction::from_suffix(suffix),
            entity_id: text(payload, "entityId").or_else(|| text(payload, "id")),
            event_type: event_type.clone(),
        }
    }

    /// Prefix of the event type, stored as the log's entity type
    pub fn entity_type(&self) -> Option<&str> {
        self.event_type
            .split_once('.')
            .map(|(prefix, _)| prefix)
            .filter(|prefix| !prefix.is_empty())
    }
}

/// String or number field as text
fn text(payload: &Value, key: &str) -> Option<String> {
    match payload.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn dotted(payload: &Value, key: &str) -> Option<String> {
    text(payload, key).filter(|s| s.contains('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_event_and_entity_id() {
        let event = WebhookEvent::from_payload(&json!({"event": "salesOrder.updated", "entityId": "881"}));
        assert_eq!(event.entity, Some(EntityKind::SalesOrder));
        assert_eq!(event.action, EventAction::Updated);
        assert_eq!(event.entity_id.as_deref(), Some("881"));
        assert_eq!(event.entity_type(), Some("salesOrder"));
    }

    #[test]
    fn type_and_numeric_id_fallbacks() {
        let event = WebhookEvent::from_payload(&json!({"type": "timeTracking.deleted", "id": 17}));
        assert_eq!(event.entity, Some(EntityKind::TimeRecord));
        assert_eq!(event.action, EventAction::Deleted);
        assert_eq!(event.entity_id.as_deref(), Some("17"));
    }

    #[test]
    fn entity_name_form() {
        let event = WebhookEvent::from_payload(&json!({"entityName": "customer", "type": "created", "entityId": "5"}));
        assert_eq!(event.event_type, "customer.created");
        assert_eq!(event.entity, Some(EntityKind::Party));
        assert_eq!(event.action, EventAction::Created);
    }

    #[test]
    fn unknown_prefix_and_missing_event() {
        let event = WebhookEvent::from_payload(&json!({"event": "article.updated", "entityId": "1"}));
        assert_eq!(event.entity, None);

        let event = WebhookEvent::from_payload(&json!({"hello": "world"}));
        assert_eq!(event.event_type, "unknown");
        assert_eq!(event.entity, None);
        assert_eq!(event.entity_id, None);
        assert_eq!(event.entity_type(), None);
    }
}
