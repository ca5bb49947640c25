use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a session-activity row went inactive. Transitions are one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutReason {
    Manual,
    NewLogin,
    ForcedByAdmin,
    TokenExpired,
}

impl LogoutReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::NewLogin => "new_login",
            Self::ForcedByAdmin => "forced_by_admin",
            Self::TokenExpired => "token_expired",
        }
    }
}

impl fmt::Display for LogoutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
