use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle states of the shared session bundle.
///
/// `downloading` is a bookkeeping label only; callers treat it like `ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleStatus {
    Pending,
    Uploading,
    Ready,
    Downloading,
    AuthError,
    ProxyError,
    Disabled,
}

impl BundleStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Uploading => "uploading",
            Self::Ready => "ready",
            Self::Downloading => "downloading",
            Self::AuthError => "auth_error",
            Self::ProxyError => "proxy_error",
            Self::Disabled => "disabled",
        }
    }

    #[must_use]
    pub const fn is_downloadable(self) -> bool {
        matches!(self, Self::Ready | Self::Downloading)
    }
}

impl FromStr for BundleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "uploading" => Ok(Self::Uploading),
            "ready" => Ok(Self::Ready),
            "downloading" => Ok(Self::Downloading),
            "auth_error" => Ok(Self::AuthError),
            "proxy_error" => Ok(Self::ProxyError),
            "disabled" => Ok(Self::Disabled),
            other => Err(format!("unknown bundle status: {other}")),
        }
    }
}

impl fmt::Display for BundleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
