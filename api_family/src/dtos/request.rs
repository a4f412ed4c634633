use chrono::NaiveDateTime;
use common::misc::RequestStatus;
use db::models::request::FamilyRequest;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct NoteRequest {
    pub note: Option<String>,
}

/// What a recipient sees of an invitation.
#[derive(Debug, Serialize)]
pub struct InvitationResponse {
    pub code: String,
    pub status: RequestStatus,
    pub slave_plan_id: Uuid,
    pub expires_at: Option<NaiveDateTime>,
    pub accepted_by_you: bool,
}

impl InvitationResponse {
    pub fn for_viewer(request: FamilyRequest, viewer: Uuid) -> Self {
        InvitationResponse {
            accepted_by_you: request.slave_user_id == Some(viewer),
            code: request.code,
            status: request.status,
            slave_plan_id: request.slave_plan_id,
            expires_at: request.expires_at,
        }
    }
}
