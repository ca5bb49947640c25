use chrono::{DateTime, Days, Months, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Purchasable billing cycles and their duration arithmetic.
///
/// Month-based cycles preserve the day-of-month where possible and clamp to
/// the last day of the target month otherwise (Jan 31 + 1 month = Feb 28/29).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CycleType {
    Daily,
    Weekly,
    Monthly,
    ThreeMonths,
    HalfYear,
    Yearly,
}

impl CycleType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::ThreeMonths => "THREE_MONTHS",
            Self::HalfYear => "HALF_YEAR",
            Self::Yearly => "YEARLY",
        }
    }

    /// End instant of a cycle starting at `from`.
    #[must_use]
    pub fn advance(self, from: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Daily => from
                .checked_add_days(Days::new(1))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            Self::Weekly => from
                .checked_add_days(Days::new(7))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            Self::Monthly => from
                .checked_add_months(Months::new(1))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            Self::ThreeMonths => from
                .checked_add_months(Months::new(3))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            Self::HalfYear => from
                .checked_add_months(Months::new(6))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            Self::Yearly => from
                .checked_add_months(Months::new(12))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

}

impl FromStr for CycleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DAILY" => Ok(Self::Daily),
            "WEEKLY" => Ok(Self::Weekly),
            "MONTHLY" => Ok(Self::Monthly),
            "THREE_MONTHS" => Ok(Self::ThreeMonths),
            "HALF_YEAR" => Ok(Self::HalfYear),
            "YEARLY" => Ok(Self::Yearly),
            other => Err(format!("unknown billing cycle: {other}")),
        }
    }
}

impl fmt::Display for CycleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived billing state of a user at a point in time. End dates are
/// exclusive upper bounds: a login at the exact expiry instant is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BillingStatus {
    NoPlan,
    Active { days_remaining: i64 },
    Expired,
}

impl BillingStatus {
    #[must_use]
    pub const fn is_expired(self) -> bool {
        matches!(self, Self::Expired)
    }
}

/// Structured billing audit events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingEvent {
    CycleStarted,
    PaymentAdded,
    TrialStarted,
    AutoDisabled,
}

impl BillingEvent {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CycleStarted => "CYCLE_STARTED",
            Self::PaymentAdded => "PAYMENT_ADDED",
            Self::TrialStarted => "TRIAL_STARTED",
            Self::AutoDisabled => "AUTO_DISABLED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn fixed_length_cycles() {
        assert_eq!(CycleType::Daily.advance(at(2026, 3, 1)), at(2026, 3, 2));
        assert_eq!(CycleType::Weekly.advance(at(2026, 3, 1)), at(2026, 3, 8));
    }

    #[test]
    fn month_addition_clamps_to_month_end() {
        assert_eq!(CycleType::Monthly.advance(at(2026, 1, 31)), at(2026, 2, 28));
        assert_eq!(CycleType::Monthly.advance(at(2024, 1, 31)), at(2024, 2, 29));
        assert_eq!(CycleType::Monthly.advance(at(2026, 1, 30)), at(2026, 2, 28));
        assert_eq!(CycleType::Monthly.advance(at(2026, 2, 28)), at(2026, 3, 28));
    }

    #[test]
    fn month_addition_preserves_day_when_possible() {
        assert_eq!(
            CycleType::ThreeMonths.advance(at(2026, 1, 15)),
            at(2026, 4, 15)
        );
        assert_eq!(CycleType::HalfYear.advance(at(2026, 1, 31)), at(2026, 7, 31));
        assert_eq!(CycleType::Yearly.advance(at(2026, 2, 14)), at(2027, 2, 14));
    }

    #[test]
    fn cycle_round_trips_through_strings() {
        for cycle in [
            CycleType::Daily,
            CycleType::Weekly,
            CycleType::Monthly,
            CycleType::ThreeMonths,
            CycleType::HalfYear,
            CycleType::Yearly,
        ] {
            assert_eq!(cycle.as_str().parse::<CycleType>().unwrap(), cycle);
        }
    }
}
