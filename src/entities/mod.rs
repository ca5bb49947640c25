pub mod prelude;

pub mod audit_logs;
pub mod billing_history;
pub mod bundle_events;
pub mod domains;
pub mod login_history;
pub mod payments;
pub mod proxies;
pub mod security_alerts;
pub mod session_activity;
pub mod shared_bundles;
pub mod users;
