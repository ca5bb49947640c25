pub use super::audit_logs::Entity as AuditLogs;
pub use super::billing_history::Entity as BillingHistory;
pub use super::bundle_events::Entity as BundleEvents;
pub use super::domains::Entity as Domains;
pub use super::login_history::Entity as LoginHistory;
pub use super::payments::Entity as Payments;
pub use super::proxies::Entity as Proxies;
pub use super::security_alerts::Entity as SecurityAlerts;
pub use super::session_activity::Entity as SessionActivity;
pub use super::shared_bundles::Entity as SharedBundles;
pub use super::users::Entity as Users;
