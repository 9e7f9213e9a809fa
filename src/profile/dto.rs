use serde::{Deserialize, Serialize};

use crate::users::{repo_types::ProfileChanges, User};

/// Request body for `PUT /profile`. An empty string means "not supplied",
/// so a field can never be cleared through this request.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: String,
}

impl From<UpdateProfileRequest> for ProfileChanges {
    fn from(req: UpdateProfileRequest) -> Self {
        fn non_empty(v: String) -> Option<String> {
            (!v.is_empty()).then_some(v)
        }
        Self {
            first_name: non_empty(req.first_name),
            last_name: non_empty(req.last_name),
            phone: non_empty(req.phone),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: User,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct MembershipInfo {
    pub membership_id: String,
    pub member_level: String,
    pub points: i32,
    pub member_since: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
}
