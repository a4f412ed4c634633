use std::sync::Mutex;

use serde::Serialize;
use uuid::Uuid;

/// Domain events for emailers, analytics and the like. Published only
/// after the transaction that produced them has committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FamilyEvent {
    RequestCreated {
        request_id: Uuid,
        master_subscription_id: Uuid,
        code: String,
    },
    RequestAccepted {
        request_id: Uuid,
        master_subscription_id: Uuid,
        slave_user_id: Uuid,
        slave_subscription_id: Uuid,
    },
    RequestCanceled {
        request_id: Uuid,
        master_subscription_id: Uuid,
        slave_user_id: Option<Uuid>,
    },
}

pub trait EventBus: Send + Sync {
    fn publish(&self, event: &FamilyEvent);
}

/// Writes every event to the log.
#[derive(Debug, Default)]
pub struct LogEventBus;

impl EventBus for LogEventBus {
    fn publish(&self, event: &FamilyEvent) {
        match serde_json::to_string(event) {
            Ok(json) => log::info!("Family event: {}", json),
            Err(e) => log::error!("Failed to serialize family event {:?}: {}", event, e),
        }
    }
}

/// Keeps published events in memory.
#[derive(Debug, Default)]
pub struct MemoryEventBus {
    events: Mutex<Vec<FamilyEvent>>,
}

impl MemoryEventBus {
    pub fn new() -> Self {
        MemoryEventBus::default()
    }

    pub fn events(&self) -> Vec<FamilyEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl EventBus for MemoryEventBus {
    fn publish(&self, event: &FamilyEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
    }
}
