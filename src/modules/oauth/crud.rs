use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySql, Pool};

use super::interface::{AccountRepository, OAuthStateRepository};
use super::model::{FederatedAccount, OAuthState};
use crate::modules::auth::interface::StoreResult;

pub struct OAuthStateCrud {
    pool: Pool<MySql>,
}

impl OAuthStateCrud {
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OAuthStateRepository for OAuthStateCrud {
    async fn create(&self, state: &OAuthState) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO oauth_states (state, provider, redirect_url, expires_at, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&state.state)
        .bind(&state.provider)
        .bind(&state.redirect_url)
        .bind(state.expires_at)
        .bind(state.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, state: &str) -> StoreResult<Option<OAuthState>> {
        Ok(
            sqlx::query_as::<_, OAuthState>("SELECT * FROM oauth_states WHERE state = ?")
                .bind(state)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn delete(&self, state: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM oauth_states WHERE state = ?")
            .bind(state)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired(&self) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM oauth_states WHERE expires_at < ?")
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

pub struct AccountCrud {
    pool: Pool<MySql>,
}

impl AccountCrud {
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepository for AccountCrud {
    async fn create(&self, account: &FederatedAccount) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, user_id, provider, provider_account_id, provider_email, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.id)
        .bind(&account.user_id)
        .bind(&account.provider)
        .bind(&account.provider_account_id)
        .bind(&account.provider_email)
        .bind(account.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_provider_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> StoreResult<Option<FederatedAccount>> {
        Ok(sqlx::query_as::<_, FederatedAccount>(
            "SELECT * FROM accounts WHERE provider = ? AND provider_account_id = ?",
        )
        .bind(provider)
        .bind(provider_account_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_for_user(&self, user_id: &str) -> StoreResult<Vec<FederatedAccount>> {
        Ok(sqlx::query_as::<_, FederatedAccount>(
            "SELECT * FROM accounts WHERE user_id = ? ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn delete_for_user(&self, user_id: &str, provider: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM accounts WHERE user_id = ? AND provider = ?")
            .bind(user_id)
            .bind(provider)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
