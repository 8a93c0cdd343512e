//! Repository for the `reward_rules` table (read-only to the core).

use sqlx::PgPool;

use crate::models::coin::RewardRule;

const COLUMNS: &str = "key, label, coins, enabled, daily_cap, meta, updated_at";

pub struct RewardRuleRepo;

impl RewardRuleRepo {
    /// Find a rule by its key.
    pub async fn find_by_key(pool: &PgPool, key: &str) -> Result<Option<RewardRule>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM reward_rules WHERE key = $1");
        sqlx::query_as::<_, RewardRule>(&query)
            .bind(key)
            .fetch_optional(pool)
            .await
    }

    /// List all rules ordered by key.
    pub async fn list(pool: &PgPool) -> Result<Vec<RewardRule>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM reward_rules ORDER BY key ASC");
        sqlx::query_as::<_, RewardRule>(&query).fetch_all(pool).await
    }
}
