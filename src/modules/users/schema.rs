use serde::{Deserialize, Serialize};

use crate::modules::auth::model::Role;
use crate::modules::auth::schema::UserResponse;

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct ClientsResponse {
    pub clients: Vec<UserResponse>,
    pub total: usize,
}
