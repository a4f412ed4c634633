use chrono::NaiveDateTime;
use uuid::Uuid;

pub struct SubscriptionCreateRequest {
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub is_paid: bool,
    pub origin: String,
}

pub struct SubscriptionRangeUpdate {
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
}

/// Previous-period candidates of a user: subscriptions on any of `plan_ids`
/// ending inside `[ending_after, ending_before]`.
pub struct LineageFilter {
    pub user_id: Uuid,
    pub plan_ids: Vec<Uuid>,
    pub ending_after: NaiveDateTime,
    pub ending_before: NaiveDateTime,
    pub exclude_id: Uuid,
}
