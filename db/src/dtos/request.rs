use chrono::NaiveDateTime;
use uuid::Uuid;

pub struct RequestCreateRequest {
    pub code: String,
    pub master_user_id: Uuid,
    pub master_subscription_id: Uuid,
    pub slave_plan_id: Uuid,
    pub expires_at: Option<NaiveDateTime>,
    pub now: NaiveDateTime,
}

pub struct RequestAcceptRequest {
    pub slave_user_id: Uuid,
    pub now: NaiveDateTime,
}
