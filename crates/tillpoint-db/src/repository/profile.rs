//! # POS Profile Repository
//!
//! POS profiles (terminal defaults), the users assigned to them and the
//! default account of each mode of payment.

use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use tillpoint_core::{PosProfile, ProfilePaymentMethod};

#[derive(Debug, FromRow)]
struct ProfileRow {
    name: String,
    company: String,
    warehouse: Option<String>,
    selling_price_list: Option<String>,
    disable_rounded_total: bool,
}

#[derive(Debug, FromRow)]
struct ProfilePaymentRow {
    mode_of_payment: String,
    is_default: bool,
}

/// Repository for POS profile operations.
#[derive(Debug, Clone)]
pub struct ProfileRepository {
    pool: SqlitePool,
}

impl ProfileRepository {
    /// Creates a new ProfileRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProfileRepository { pool }
    }

    /// Loads a profile with its payment methods in configured order.
    pub async fn get(&self, name: &str) -> DbResult<Option<PosProfile>> {
        let row: Option<ProfileRow> = sqlx::query_as(
            r#"
            SELECT name, company, warehouse, selling_price_list, disable_rounded_total
            FROM pos_profiles WHERE name = ?1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let payments: Vec<ProfilePaymentRow> = sqlx::query_as(
            "SELECT mode_of_payment, is_default FROM pos_profile_payments WHERE profile = ?1 ORDER BY idx",
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(PosProfile {
            name: row.name,
            company: row.company,
            warehouse: row.warehouse,
            selling_price_list: row.selling_price_list,
            disable_rounded_total: row.disable_rounded_total,
            payments: payments
                .into_iter()
                .map(|p| ProfilePaymentMethod {
                    mode_of_payment: p.mode_of_payment,
                    is_default: p.is_default,
                })
                .collect(),
        }))
    }

    /// Resolves the profile a user works with when none is named.
    ///
    /// ## Resolution Order
    /// 1. The profile assigned to the user and flagged default
    /// 2. The first profile assigned to the user (by name)
    /// 3. The only profile of `company`, when there is exactly one
    pub async fn default_for_user(&self, user: &str, company: Option<&str>) -> DbResult<Option<String>> {
        let assigned: Option<String> = sqlx::query_scalar(
            r#"
            SELECT profile FROM pos_profile_users
            WHERE user = ?1
            ORDER BY is_default DESC, profile
            LIMIT 1
            "#,
        )
        .bind(user)
        .fetch_optional(&self.pool)
        .await?;

        if assigned.is_some() {
            return Ok(assigned);
        }

        let Some(company) = company else {
            return Ok(None);
        };

        let names: Vec<String> =
            sqlx::query_scalar("SELECT name FROM pos_profiles WHERE company = ?1 LIMIT 2")
                .bind(company)
                .fetch_all(&self.pool)
                .await?;

        debug!(user, company, candidates = names.len(), "No profile assigned to user");

        Ok(match names.as_slice() {
            [only] => Some(only.clone()),
            _ => None,
        })
    }

    /// Default bank/cash account of a mode of payment for a company.
    pub async fn account_for(&self, mode_of_payment: &str, company: &str) -> DbResult<Option<String>> {
        let account = sqlx::query_scalar(
            r#"
            SELECT default_account FROM mode_of_payment_accounts
            WHERE mode_of_payment = ?1 AND company = ?2
            "#,
        )
        .bind(mode_of_payment)
        .bind(company)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    // =========================================================================
    // Writes (seeding and administration)
    // =========================================================================

    /// Inserts a profile with its payment methods.
    pub async fn insert(&self, profile: &PosProfile) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO pos_profiles (name, company, warehouse, selling_price_list, disable_rounded_total)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&profile.name)
        .bind(&profile.company)
        .bind(&profile.warehouse)
        .bind(&profile.selling_price_list)
        .bind(profile.disable_rounded_total)
        .execute(&mut *tx)
        .await?;

        for (idx, method) in profile.payments.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO pos_profile_payments (profile, idx, mode_of_payment, is_default)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(&profile.name)
            .bind(idx as i64)
            .bind(&method.mode_of_payment)
            .bind(method.is_default)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Assigns a user to a profile.
    pub async fn assign_user(&self, profile: &str, user: &str, is_default: bool) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO pos_profile_users (profile, user, is_default) VALUES (?1, ?2, ?3)
            ON CONFLICT(profile, user) DO UPDATE SET is_default = excluded.is_default
            "#,
        )
        .bind(profile)
        .bind(user)
        .bind(is_default)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Sets the default account of a mode of payment for a company.
    pub async fn set_account(&self, mode_of_payment: &str, company: &str, account: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO mode_of_payment_accounts (mode_of_payment, company, default_account)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(mode_of_payment, company) DO UPDATE SET default_account = excluded.default_account
            "#,
        )
        .bind(mode_of_payment)
        .bind(company)
        .bind(account)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    fn profile(name: &str, company: &str) -> PosProfile {
        PosProfile {
            name: name.to_string(),
            company: company.to_string(),
            warehouse: Some(format!("Stores - {}", company)),
            selling_price_list: Some("Retail".to_string()),
            disable_rounded_total: false,
            payments: vec![
                ProfilePaymentMethod {
                    mode_of_payment: "Cash".to_string(),
                    is_default: true,
                },
                ProfilePaymentMethod {
                    mode_of_payment: "Card".to_string(),
                    is_default: false,
                },
            ],
        }
    }

    async fn repo() -> ProfileRepository {
        Database::new(DbConfig::in_memory()).await.unwrap().profiles()
    }

    #[tokio::test]
    async fn test_insert_and_get_keeps_payment_order() {
        let profiles = repo().await;
        profiles.insert(&profile("P1", "Co")).await.unwrap();

        let loaded = profiles.get("P1").await.unwrap().unwrap();
        assert_eq!(loaded, profile("P1", "Co"));
        assert!(profiles.get("P9").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_default_profile_resolution() {
        let profiles = repo().await;
        profiles.insert(&profile("P1", "Co")).await.unwrap();
        profiles.insert(&profile("P2", "Co")).await.unwrap();
        profiles.insert(&profile("Solo", "Other")).await.unwrap();

        profiles.assign_user("P1", "a@co", false).await.unwrap();
        assert_eq!(profiles.default_for_user("a@co", None).await.unwrap().as_deref(), Some("P1"));

        profiles.assign_user("P2", "a@co", true).await.unwrap();
        assert_eq!(profiles.default_for_user("a@co", None).await.unwrap().as_deref(), Some("P2"));

        // Unassigned user: only a company with a single profile resolves
        assert_eq!(
            profiles.default_for_user("b@other", Some("Other")).await.unwrap().as_deref(),
            Some("Solo")
        );
        assert_eq!(profiles.default_for_user("b@co", Some("Co")).await.unwrap(), None);
        assert_eq!(profiles.default_for_user("b@co", None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_account_for() {
        let profiles = repo().await;
        assert_eq!(profiles.account_for("Cash", "Co").await.unwrap(), None);
        profiles.set_account("Cash", "Co", "Cash - Co").await.unwrap();
        assert_eq!(
            profiles.account_for("Cash", "Co").await.unwrap().as_deref(),
            Some("Cash - Co")
        );
    }
}
