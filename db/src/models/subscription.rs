use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub is_paid: bool,
    pub origin: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Subscription {
    pub fn has_ended_at(&self, now: NaiveDateTime) -> bool {
        self.end_time <= now
    }

    pub fn same_range(&self, other: &Subscription) -> bool {
        self.start_time == other.start_time && self.end_time == other.end_time
    }
}
