use async_trait::async_trait;
use sqlx::{MySql, Pool};

use super::interface::CoachAssignmentRepository;
use crate::modules::auth::interface::StoreResult;
use crate::modules::auth::model::User;

pub struct CoachAssignmentCrud {
    pool: Pool<MySql>,
}

impl CoachAssignmentCrud {
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CoachAssignmentRepository for CoachAssignmentCrud {
    async fn is_coach_of(&self, coach_id: &str, client_id: &str) -> StoreResult<bool> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM coach_client_assignments
            WHERE coach_id = ? AND client_id = ? AND active = TRUE
            "#,
        )
        .bind(coach_id)
        .bind(client_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn list_clients(&self, coach_id: &str) -> StoreResult<Vec<User>> {
        Ok(sqlx::query_as::<_, User>(
            r#"
            SELECT u.* FROM users u
            JOIN coach_client_assignments a ON a.client_id = u.id
            WHERE a.coach_id = ? AND a.active = TRUE
            ORDER BY u.name
            "#,
        )
        .bind(coach_id)
        .fetch_all(&self.pool)
        .await?)
    }
}
