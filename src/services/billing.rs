//! Billing state machine: cycle and trial lifecycle, derived status, and
//! the expiration sweep.
//!
//! The payment ledger is the accountable state; the user row's billing
//! fields are a materialized projection updated here and only here.

use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use crate::db::Store;
use crate::entities::{payments, users};
use crate::models::{BillingEvent, BillingStatus, CycleType, UserStatus};

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("User not found")]
    UserNotFound,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for BillingError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for BillingError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[derive(Clone)]
pub struct BillingService {
    store: Store,
}

impl BillingService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    /// Derived billing state. End dates are exclusive: at the exact expiry
    /// instant the account is expired. A user with no dates at all has no
    /// plan, which the login gate lets through.
    #[must_use]
    pub fn status_for(user: &users::Model, now: DateTime<Utc>) -> BillingStatus {
        if user.is_trial_active {
            if let Some(end) = user.trial_end_date {
                if end > now {
                    return BillingStatus::Active {
                        days_remaining: days_remaining(end, now),
                    };
                }
            }
        }

        if user.is_billing_active {
            if let Some(end) = user.billing_cycle_end_date {
                if end > now {
                    return BillingStatus::Active {
                        days_remaining: days_remaining(end, now),
                    };
                }
            }
        }

        let trial_lapsed = user.trial_end_date.is_some_and(|end| end <= now);
        let cycle_lapsed = user.billing_cycle_end_date.is_some_and(|end| end <= now);

        if trial_lapsed || cycle_lapsed {
            BillingStatus::Expired
        } else {
            BillingStatus::NoPlan
        }
    }

    pub async fn status(&self, user_id: i32) -> Result<BillingStatus, BillingError> {
        let user = self.require_user(user_id).await?;
        Ok(Self::status_for(&user, Utc::now()))
    }

    pub async fn start_cycle(
        &self,
        user_id: i32,
        cycle: CycleType,
        start_date: Option<DateTime<Utc>>,
    ) -> Result<users::Model, BillingError> {
        let user = self.require_user(user_id).await?;

        let start = start_date.unwrap_or_else(Utc::now);
        let end = cycle.advance(start);

        let mut active: users::ActiveModel = user.into();
        active.billing_cycle = Set(Some(cycle.as_str().to_string()));
        active.billing_cycle_start_date = Set(Some(start));
        active.billing_cycle_end_date = Set(Some(end));
        active.is_billing_active = Set(true);
        active.is_trial_active = Set(false);
        active.trial_start_date = Set(None);
        active.trial_end_date = Set(None);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&self.store.conn).await?;

        self.record_event(
            user_id,
            BillingEvent::CycleStarted,
            json!({ "cycle": cycle.as_str(), "start": start, "end": end }),
        )
        .await;

        Ok(updated)
    }

    /// Prepayments stack: a new cycle starts where the current one ends,
    /// never in the past. Restoring a disabled account is deliberately not
    /// done here; an operator re-enables explicitly.
    pub async fn add_payment(
        &self,
        user_id: i32,
        cycle: CycleType,
        amount: f64,
        memo: Option<String>,
        admin_id: i32,
    ) -> Result<payments::Model, BillingError> {
        if amount < 0.0 {
            return Err(BillingError::Validation(
                "Payment amount cannot be negative".to_string(),
            ));
        }

        let user = self.require_user(user_id).await?;

        let now = Utc::now();
        let cycle_start = match user.billing_cycle_end_date {
            Some(end) if end > now => end,
            _ => now,
        };
        let cycle_end = cycle.advance(cycle_start);

        let payment = self
            .store
            .billing_repo()
            .insert_payment(user_id, amount, cycle, cycle_start, cycle_end, memo, admin_id)
            .await?;

        let mut active: users::ActiveModel = user.into();
        active.billing_cycle = Set(Some(cycle.as_str().to_string()));
        active.billing_cycle_start_date = Set(Some(cycle_start));
        active.billing_cycle_end_date = Set(Some(cycle_end));
        active.is_billing_active = Set(true);
        active.is_trial_active = Set(false);
        active.updated_at = Set(now);
        active.update(&self.store.conn).await?;

        self.record_event(
            user_id,
            BillingEvent::PaymentAdded,
            json!({
                "payment_id": payment.id,
                "amount": amount,
                "cycle": cycle.as_str(),
                "cycle_start": cycle_start,
                "cycle_end": cycle_end,
                "recorded_by": admin_id,
            }),
        )
        .await;

        Ok(payment)
    }

    pub async fn set_trial(&self, user_id: i32, hours: i64) -> Result<users::Model, BillingError> {
        if hours <= 0 {
            return Err(BillingError::Validation(
                "Trial length must be positive".to_string(),
            ));
        }

        let user = self.require_user(user_id).await?;

        let now = Utc::now();
        let end = now + Duration::hours(hours);

        let mut active: users::ActiveModel = user.into();
        active.trial_start_date = Set(Some(now));
        active.trial_end_date = Set(Some(end));
        active.is_trial_active = Set(true);
        active.is_billing_active = Set(false);
        active.billing_cycle = Set(None);
        active.billing_cycle_start_date = Set(None);
        active.billing_cycle_end_date = Set(None);
        active.updated_at = Set(now);
        let updated = active.update(&self.store.conn).await?;

        self.record_event(
            user_id,
            BillingEvent::TrialStarted,
            json!({ "hours": hours, "start": now, "end": end }),
        )
        .await;

        Ok(updated)
    }

    /// The expiration sweep: disable every account whose trial or billing
    /// cycle has lapsed. Idempotent; the `status <> disabled` guard in the
    /// update makes a re-run against unchanged state a no-op.
    pub async fn sweep_expired(&self) -> Result<u64, BillingError> {
        let now = Utc::now();
        let candidates = self.store.user_repo().find_expired(now).await?;

        let mut disabled = 0;

        for user in candidates {
            let billing_lapsed = user.is_billing_active
                && user.billing_cycle_end_date.is_some_and(|end| end < now);

            let reason = if billing_lapsed {
                "billing_cycle_expired"
            } else {
                "trial_expired"
            };

            let mut update = users::Entity::update_many()
                .filter(users::Column::Id.eq(user.id))
                .filter(users::Column::Status.ne(UserStatus::Disabled.as_str()))
                .col_expr(
                    users::Column::Status,
                    Expr::value(UserStatus::Disabled.as_str()),
                )
                .col_expr(users::Column::UpdatedAt, Expr::value(now));

            update = if billing_lapsed {
                update.col_expr(users::Column::IsBillingActive, Expr::value(false))
            } else {
                update.col_expr(users::Column::IsTrialActive, Expr::value(false))
            };

            let result = update.exec(&self.store.conn).await?;

            if result.rows_affected == 0 {
                continue;
            }

            disabled += 1;
            info!(user_id = user.id, email = %user.email, reason, "Disabled expired account");

            self.record_event(
                user.id,
                BillingEvent::AutoDisabled,
                json!({ "reason": reason }),
            )
            .await;
        }

        Ok(disabled)
    }

    pub async fn payments(&self, user_id: i32) -> Result<Vec<payments::Model>, BillingError> {
        Ok(self.store.billing_repo().payments_for_user(user_id).await?)
    }

    async fn require_user(&self, user_id: i32) -> Result<users::Model, BillingError> {
        self.store
            .user_repo()
            .get_by_id(user_id)
            .await
            .map_err(|e| BillingError::Internal(e.to_string()))?
            .ok_or(BillingError::UserNotFound)
    }

    async fn record_event(&self, user_id: i32, event: BillingEvent, details: serde_json::Value) {
        if let Err(e) = self
            .store
            .billing_repo()
            .record_event(user_id, event, Some(details.to_string()))
            .await
        {
            warn!(user_id, event = event.as_str(), "Failed to record billing event: {}", e);
        }
    }
}

fn days_remaining(end: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (end - now).num_seconds().max(0) as u64;
    seconds.div_ceil(86_400) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn user_with(
        trial_active: bool,
        billing_active: bool,
        trial_end: Option<DateTime<Utc>>,
        cycle_end: Option<DateTime<Utc>>,
    ) -> users::Model {
        let epoch = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        users::Model {
            id: 1,
            email: "test@example.com".to_string(),
            password_hash: String::new(),
            role: "user".to_string(),
            status: "active".to_string(),
            current_session_token: None,
            last_login_at: None,
            last_login_ip: None,
            is_trial_active: trial_active,
            is_billing_active: billing_active,
            trial_start_date: None,
            trial_end_date: trial_end,
            billing_cycle: None,
            billing_cycle_start_date: None,
            billing_cycle_end_date: cycle_end,
            created_at: epoch,
            updated_at: epoch,
        }
    }

    #[test]
    fn no_plan_when_nothing_is_set() {
        let now = Utc::now();
        let user = user_with(false, false, None, None);
        assert_eq!(BillingService::status_for(&user, now), BillingStatus::NoPlan);
    }

    #[test]
    fn active_cycle_reports_days_remaining() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 3, 31, 0, 0, 0).unwrap();
        let user = user_with(false, true, None, Some(end));

        assert_eq!(
            BillingService::status_for(&user, now),
            BillingStatus::Active { days_remaining: 30 }
        );
    }

    #[test]
    fn partial_days_round_up() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();
        let user = user_with(true, false, Some(end), None);

        assert_eq!(
            BillingService::status_for(&user, now),
            BillingStatus::Active { days_remaining: 1 }
        );
    }

    #[test]
    fn expiry_instant_is_exclusive() {
        let end = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let user = user_with(true, false, Some(end), None);

        assert_eq!(BillingService::status_for(&user, end), BillingStatus::Expired);

        let just_before = end - Duration::milliseconds(1);
        assert!(matches!(
            BillingService::status_for(&user, just_before),
            BillingStatus::Active { .. }
        ));
    }

    #[test]
    fn lapsed_dates_mean_expired_even_with_flags_cleared() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let past = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();

        let user = user_with(false, false, None, Some(past));
        assert_eq!(BillingService::status_for(&user, now), BillingStatus::Expired);

        let user = user_with(false, false, Some(past), None);
        assert_eq!(BillingService::status_for(&user, now), BillingStatus::Expired);
    }
}
