use crate::entities::prelude::*;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Schema;
use std::fmt::Write;

#[derive(DeriveMigrationName)]
pub struct Migration;

const DEFAULT_BOOTSTRAP_EMAIL: &str = "root@localhost";
const ENV_BOOTSTRAP_EMAIL: &str = "HANDOVR_BOOTSTRAP_EMAIL";
const ENV_BOOTSTRAP_PASSWORD: &str = "HANDOVR_BOOTSTRAP_PASSWORD";

struct BootstrapCredentials {
    email: String,
    password: String,
    generated_password: bool,
}

fn read_non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn random_hex(byte_len: usize) -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let mut result = String::with_capacity(byte_len * 2);

    for _ in 0..byte_len {
        let value: u8 = rng.random();
        let _ = write!(result, "{value:02x}");
    }

    result
}

fn resolve_bootstrap_credentials() -> BootstrapCredentials {
    let email = read_non_empty_env(ENV_BOOTSTRAP_EMAIL)
        .unwrap_or_else(|| DEFAULT_BOOTSTRAP_EMAIL.to_string());

    let password = read_non_empty_env(ENV_BOOTSTRAP_PASSWORD).unwrap_or_else(|| random_hex(16));
    let generated_password = std::env::var(ENV_BOOTSTRAP_PASSWORD).is_err();

    BootstrapCredentials {
        email,
        password,
        generated_password,
    }
}

fn hash_password(password: &str) -> Result<String, DbErr> {
    use argon2::{
        Argon2,
        password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
    };

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| DbErr::Custom(format!("Failed to hash bootstrap password: {err}")))
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        manager
            .create_table(
                schema
                    .create_table_from_entity(Users)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(SharedBundles)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(LoginHistory)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(SessionActivity)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(SecurityAlerts)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Payments)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(BillingHistory)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(AuditLogs)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(BundleEvents)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Domains)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Proxies)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_login_history_user_time")
                    .table(LoginHistory)
                    .col(crate::entities::login_history::Column::UserId)
                    .col(crate::entities::login_history::Column::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_session_activity_user_active")
                    .table(SessionActivity)
                    .col(crate::entities::session_activity::Column::UserId)
                    .col(crate::entities::session_activity::Column::IsActive)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_security_alerts_user")
                    .table(SecurityAlerts)
                    .col(crate::entities::security_alerts::Column::UserId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_payments_user")
                    .table(Payments)
                    .col(crate::entities::payments::Column::UserId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_billing_history_user")
                    .table(BillingHistory)
                    .col(crate::entities::billing_history::Column::UserId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // Seed the operator-root account
        let credentials = resolve_bootstrap_credentials();
        let password_hash = hash_password(&credentials.password)?;
        let now = chrono::Utc::now();

        let insert = sea_orm_migration::sea_query::Query::insert()
            .into_table(Users)
            .columns([
                crate::entities::users::Column::Email,
                crate::entities::users::Column::PasswordHash,
                crate::entities::users::Column::Role,
                crate::entities::users::Column::Status,
                crate::entities::users::Column::IsTrialActive,
                crate::entities::users::Column::IsBillingActive,
                crate::entities::users::Column::CreatedAt,
                crate::entities::users::Column::UpdatedAt,
            ])
            .values_panic([
                credentials.email.clone().into(),
                password_hash.into(),
                "operator_root".into(),
                "active".into(),
                false.into(),
                false.into(),
                now.into(),
                now.into(),
            ])
            .to_owned();

        manager.exec_stmt(insert).await?;

        if credentials.generated_password {
            tracing::warn!(
                email = %credentials.email,
                password = %credentials.password,
                "No {} set; generated a one-time operator-root password",
                ENV_BOOTSTRAP_PASSWORD
            );
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Proxies).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Domains).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BundleEvents).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AuditLogs).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BillingHistory).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Payments).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SecurityAlerts).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SessionActivity).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LoginHistory).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SharedBundles).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users).to_owned())
            .await?;

        Ok(())
    }
}
