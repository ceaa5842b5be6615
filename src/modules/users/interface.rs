use async_trait::async_trait;

use crate::modules::auth::interface::StoreResult;
use crate::modules::auth::model::User;

/// Coach to client assignments, maintained outside this service.
#[async_trait]
pub trait CoachAssignmentRepository: Send + Sync {
    async fn is_coach_of(&self, coach_id: &str, client_id: &str) -> StoreResult<bool>;
    async fn list_clients(&self, coach_id: &str) -> StoreResult<Vec<User>>;
}
