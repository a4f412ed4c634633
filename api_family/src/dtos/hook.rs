use serde::Deserialize;
use uuid::Uuid;

/// Body of every subscription hook.
#[derive(Debug, Deserialize)]
pub struct SubscriptionHookRequest {
    pub subscription_id: Uuid,
}
