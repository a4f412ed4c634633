use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Lifecycle of a family request. `Created` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Created,
    Accepted,
    Canceled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Created => "created",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(RequestStatus::Created),
            "accepted" => Ok(RequestStatus::Accepted),
            "canceled" => Ok(RequestStatus::Canceled),
            other => Err(AppError::Internal(format!(
                "Unknown family request status: {}",
                other
            ))),
        }
    }
}

impl TryFrom<String> for RequestStatus {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// How a plan link provisions the recipient's subscription, as stored on the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvisioningMethod {
    /// The dependent mirrors the payer's start and end time.
    Copy,
    /// The dependent gets a fixed number of days from the recipient's own extension point.
    Days,
}

impl ProvisioningMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisioningMethod::Copy => "copy",
            ProvisioningMethod::Days => "days",
        }
    }
}

impl fmt::Display for ProvisioningMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProvisioningMethod {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "copy" => Ok(ProvisioningMethod::Copy),
            "days" => Ok(ProvisioningMethod::Days),
            other => Err(AppError::Internal(format!(
                "Unknown provisioning method: {}",
                other
            ))),
        }
    }
}

impl TryFrom<String> for ProvisioningMethod {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            RequestStatus::Created,
            RequestStatus::Accepted,
            RequestStatus::Canceled,
        ] {
            assert_eq!(status.as_str().parse::<RequestStatus>().unwrap(), status);
        }
        assert!("used".parse::<RequestStatus>().is_err());
    }

    #[test]
    fn unknown_method_is_internal() {
        let err = "weeks".parse::<ProvisioningMethod>().unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
