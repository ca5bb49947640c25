pub mod auth_service;
pub use auth_service::{AuthError, AuthService, AuthenticatedUser, LoginOutcome, LoginRequest};

pub mod auth_service_impl;
pub use auth_service_impl::SeaOrmAuthService;

pub mod alerts;
pub use alerts::AlertService;

pub mod billing;
pub use billing::{BillingError, BillingService};

pub mod bundles;
pub use bundles::{BundleError, BundleService, SHARED_BUNDLE_NAME};
