//! Static authorization policy: endpoint pattern to minimum role.
//!
//! Consulted by the authentication middleware after the bearer and
//! current-session checks pass. Patterns are matched segment-wise; `{..}`
//! segments are wildcards, literal segments win over wildcards by being
//! listed first. Routes absent from the table require the base `user`
//! role.

use axum::http::Method;

use crate::models::Role;

pub struct RoutePolicy {
    pub method: &'static str,
    pub pattern: &'static str,
    pub min_role: Role,
}

pub const ROUTE_POLICY: &[RoutePolicy] = &[
    // Users
    RoutePolicy { method: "GET", pattern: "/users", min_role: Role::Operator },
    RoutePolicy { method: "POST", pattern: "/users", min_role: Role::Operator },
    RoutePolicy { method: "GET", pattern: "/users/{id}", min_role: Role::Support },
    RoutePolicy { method: "PATCH", pattern: "/users/{id}", min_role: Role::Operator },
    RoutePolicy { method: "DELETE", pattern: "/users/{id}", min_role: Role::OperatorRoot },
    RoutePolicy { method: "PATCH", pattern: "/users/{id}/role", min_role: Role::OperatorRoot },
    RoutePolicy { method: "PATCH", pattern: "/users/{id}/status", min_role: Role::Operator },
    RoutePolicy { method: "PATCH", pattern: "/users/{id}/password", min_role: Role::OperatorRoot },
    RoutePolicy { method: "POST", pattern: "/users/{id}/force-logout", min_role: Role::Operator },
    RoutePolicy { method: "GET", pattern: "/users/{id}/history/logins", min_role: Role::Support },
    RoutePolicy { method: "GET", pattern: "/users/{id}/activity/sessions", min_role: Role::Support },
    // Bundle distribution
    RoutePolicy { method: "GET", pattern: "/sessions/my-sessions", min_role: Role::User },
    RoutePolicy { method: "GET", pattern: "/sessions/shared-stats", min_role: Role::Support },
    RoutePolicy { method: "GET", pattern: "/sessions", min_role: Role::Operator },
    RoutePolicy { method: "POST", pattern: "/sessions", min_role: Role::OperatorRoot },
    RoutePolicy { method: "POST", pattern: "/sessions/{id}/request-upload", min_role: Role::Operator },
    RoutePolicy { method: "POST", pattern: "/sessions/{id}/complete-upload", min_role: Role::Operator },
    RoutePolicy { method: "POST", pattern: "/sessions/{id}/request-download", min_role: Role::User },
    RoutePolicy { method: "POST", pattern: "/sessions/{id}/mark-ready", min_role: Role::OperatorRoot },
    RoutePolicy { method: "POST", pattern: "/sessions/{id}/events", min_role: Role::User },
    RoutePolicy { method: "GET", pattern: "/sessions/{id}/events", min_role: Role::Support },
    RoutePolicy { method: "GET", pattern: "/sessions/{id}", min_role: Role::Operator },
    RoutePolicy { method: "PATCH", pattern: "/sessions/{id}", min_role: Role::OperatorRoot },
    RoutePolicy { method: "DELETE", pattern: "/sessions/{id}", min_role: Role::OperatorRoot },
    // Alerts
    RoutePolicy { method: "GET", pattern: "/alerts", min_role: Role::Support },
    RoutePolicy { method: "GET", pattern: "/alerts/unread-count", min_role: Role::Support },
    RoutePolicy { method: "GET", pattern: "/alerts/stats", min_role: Role::Support },
    RoutePolicy { method: "POST", pattern: "/alerts/{id}/read", min_role: Role::Support },
    RoutePolicy { method: "POST", pattern: "/alerts/{id}/dismiss", min_role: Role::Support },
    // Billing
    RoutePolicy { method: "GET", pattern: "/billing/{id}/status", min_role: Role::Support },
    RoutePolicy { method: "GET", pattern: "/billing/{id}/history", min_role: Role::Support },
    RoutePolicy { method: "GET", pattern: "/billing/{id}/payments", min_role: Role::Support },
    RoutePolicy { method: "POST", pattern: "/billing/{id}/payments", min_role: Role::OperatorRoot },
    RoutePolicy { method: "POST", pattern: "/billing/{id}/start-cycle", min_role: Role::OperatorRoot },
    RoutePolicy { method: "POST", pattern: "/billing/{id}/trial", min_role: Role::OperatorRoot },
    // Admin catalog & audit
    RoutePolicy { method: "GET", pattern: "/audit", min_role: Role::OperatorRoot },
    RoutePolicy { method: "GET", pattern: "/domains", min_role: Role::OperatorRoot },
    RoutePolicy { method: "POST", pattern: "/domains", min_role: Role::OperatorRoot },
    RoutePolicy { method: "GET", pattern: "/proxies", min_role: Role::OperatorRoot },
    RoutePolicy { method: "POST", pattern: "/proxies", min_role: Role::OperatorRoot },
];

/// Minimum role for a request. The first matching table entry wins;
/// unlisted endpoints need an authenticated `user`.
#[must_use]
pub fn required_role(method: &Method, path: &str) -> Role {
    let path = path.strip_prefix("/api/v1").unwrap_or(path);

    ROUTE_POLICY
        .iter()
        .find(|policy| policy.method == method.as_str() && pattern_matches(policy.pattern, path))
        .map_or(Role::User, |policy| policy.min_role)
}

fn pattern_matches(pattern: &str, path: &str) -> bool {
    let pattern_segments: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if pattern_segments.len() != path_segments.len() {
        return false;
    }

    pattern_segments
        .iter()
        .zip(&path_segments)
        .all(|(pattern_seg, path_seg)| {
            pattern_seg.starts_with('{') || pattern_seg == path_seg
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_segments_beat_wildcards() {
        assert_eq!(
            required_role(&Method::GET, "/api/v1/sessions/my-sessions"),
            Role::User
        );
        assert_eq!(
            required_role(&Method::GET, "/api/v1/sessions/7"),
            Role::Operator
        );
    }

    #[test]
    fn destructive_user_operations_need_root() {
        assert_eq!(
            required_role(&Method::DELETE, "/api/v1/users/3"),
            Role::OperatorRoot
        );
        assert_eq!(
            required_role(&Method::PATCH, "/api/v1/users/3/role"),
            Role::OperatorRoot
        );
        assert_eq!(
            required_role(&Method::PATCH, "/api/v1/users/3/status"),
            Role::Operator
        );
    }

    #[test]
    fn billing_mutations_need_root_but_reads_need_support() {
        assert_eq!(
            required_role(&Method::POST, "/api/v1/billing/9/payments"),
            Role::OperatorRoot
        );
        assert_eq!(
            required_role(&Method::GET, "/api/v1/billing/9/payments"),
            Role::Support
        );
    }

    #[test]
    fn unlisted_routes_default_to_user() {
        assert_eq!(required_role(&Method::GET, "/api/v1/auth/me"), Role::User);
        assert_eq!(
            required_role(&Method::GET, "/api/v1/auth/session-status"),
            Role::User
        );
    }

    #[test]
    fn method_is_part_of_the_key() {
        assert_eq!(required_role(&Method::GET, "/api/v1/users"), Role::Operator);
        assert_eq!(
            required_role(&Method::POST, "/api/v1/sessions"),
            Role::OperatorRoot
        );
        assert_eq!(required_role(&Method::GET, "/api/v1/sessions"), Role::Operator);
    }

    #[test]
    fn upload_endpoints_are_operator_gated() {
        assert_eq!(
            required_role(&Method::POST, "/api/v1/sessions/1/request-upload"),
            Role::Operator
        );
        assert_eq!(
            required_role(&Method::POST, "/api/v1/sessions/1/mark-ready"),
            Role::OperatorRoot
        );
        assert_eq!(
            required_role(&Method::POST, "/api/v1/sessions/1/request-download"),
            Role::User
        );
    }
}
