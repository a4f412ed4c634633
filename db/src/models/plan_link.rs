use common::misc::ProvisioningMethod;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maps a payer ("master") plan to what its seats grant.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct PlanLink {
    pub id: Uuid,
    pub master_plan_id: Uuid,
    /// `None` marks a configurable plan whose seats come from purchase line items.
    pub slave_plan_id: Option<Uuid>,
    #[sqlx(try_from = "String")]
    pub provisioning_method: ProvisioningMethod,
    /// 0 means "derive from the purchase".
    pub seat_count: i32,
    pub is_paid: bool,
}

impl PlanLink {
    pub fn is_configurable(&self) -> bool {
        self.slave_plan_id.is_none()
    }
}
