use std::sync::Arc;

use super::interface::CoachAssignmentRepository;
use crate::modules::auth::interface::{AuthError, UserRepository};
use crate::modules::auth::model::{Role, User};

/// Profile reads and administrative role changes.
pub struct UserService {
    users: Arc<dyn UserRepository>,
    assignments: Arc<dyn CoachAssignmentRepository>,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        assignments: Arc<dyn CoachAssignmentRepository>,
    ) -> Self {
        Self { users, assignments }
    }

    pub async fn get_user(&self, user_id: &str) -> Result<User, AuthError> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    pub async fn list_clients(&self, coach_id: &str) -> Result<Vec<User>, AuthError> {
        Ok(self.assignments.list_clients(coach_id).await?)
    }

    pub async fn update_role(
        &self,
        admin_id: &str,
        user_id: &str,
        role: Role,
    ) -> Result<User, AuthError> {
        let mut user = self.get_user(user_id).await?;
        if user.role == role {
            return Ok(user);
        }

        self.users.update_role(user_id, role).await?;
        tracing::info!(
            admin_id = %admin_id,
            user_id = %user_id,
            from = %user.role,
            to = %role,
            "User role changed"
        );

        user.role = role;
        Ok(user)
    }
}
