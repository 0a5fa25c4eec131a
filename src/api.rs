//! RPC wire format shared by the server and the client.
//!
//! Every procedure is invoked as `POST /rpc/{procedure}` with an optional JSON
//! body and answers with an [`ApiResponse`] envelope.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DashboardError;
use crate::query::DEFAULT_LIMIT;

/// Path prefix of the RPC endpoint
pub const RPC_PATH: &str = "/rpc";

/// Named RPC procedures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Procedure {
    CreateLogEntry,
    GetLogs,
    GetRecentLogs,
    SearchLogs,
    GetStreamStatus,
    ControlStream,
    ClearLogs,
    GetLogSources,
    Healthcheck,
}

impl Procedure {
    pub const ALL: [Procedure; 9] = [
        Procedure::CreateLogEntry,
        Procedure::GetLogs,
        Procedure::GetRecentLogs,
        Procedure::SearchLogs,
        Procedure::GetStreamStatus,
        Procedure::ControlStream,
        Procedure::ClearLogs,
        Procedure::GetLogSources,
        Procedure::Healthcheck,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Procedure::CreateLogEntry => "createLogEntry",
            Procedure::GetLogs => "getLogs",
            Procedure::GetRecentLogs => "getRecentLogs",
            Procedure::SearchLogs => "searchLogs",
            Procedure::GetStreamStatus => "getStreamStatus",
            Procedure::ControlStream => "controlStream",
            Procedure::ClearLogs => "clearLogs",
            Procedure::GetLogSources => "getLogSources",
            Procedure::Healthcheck => "healthcheck",
        }
    }

    /// Procedures that change server state
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Procedure::CreateLogEntry | Procedure::ControlStream | Procedure::ClearLogs
        )
    }
}

impl FromStr for Procedure {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Procedure::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| DashboardError::UnknownProcedure(s.to_string()))
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error half of the envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub kind: String,
    pub message: String,
}

impl From<&DashboardError> for ApiError {
    fn from(e: &DashboardError) -> Self {
        Self {
            kind: e.kind().to_string(),
            message: e.message().to_string(),
        }
    }
}

impl From<ApiError> for DashboardError {
    fn from(e: ApiError) -> Self {
        DashboardError::from_kind(&e.kind, e.message)
    }
}

/// API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: &DashboardError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    /// Unwrap the envelope into a library result
    pub fn into_result(self) -> Result<T, DashboardError> {
        match (self.success, self.data, self.error) {
            (true, Some(data), _) => Ok(data),
            (_, _, Some(error)) => Err(error.into()),
            (true, None, None) => Err(DashboardError::Transport(
                "response marked successful but carried no data".to_string(),
            )),
            (false, _, None) => Err(DashboardError::Transport(
                "server returned an error without details".to_string(),
            )),
        }
    }
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

/// Input for `searchLogs`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchInput {
    pub keyword: String,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

/// Input for `getRecentLogs`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentInput {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

impl Default for RecentInput {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_procedure_names_round_trip() {
        for procedure in Procedure::ALL {
            assert_eq!(procedure.as_str().parse::<Procedure>().unwrap(), procedure);
        }
        assert!(matches!(
            "dropTables".parse::<Procedure>(),
            Err(DashboardError::UnknownProcedure(_))
        ));
    }

    #[test]
    fn test_envelope_into_result() {
        let ok: ApiResponse<u32> = ApiResponse::ok(3);
        assert_eq!(ok.into_result().unwrap(), 3);

        let err: ApiResponse<u32> =
            ApiResponse::err(&DashboardError::Validation("limit too large".into()));
        assert_eq!(
            err.into_result().unwrap_err(),
            DashboardError::Validation("limit too large".into())
        );
    }

    #[test]
    fn test_search_input_default_limit() {
        let input: SearchInput = serde_json::from_str(r#"{"keyword":"user"}"#).unwrap();
        assert_eq!(input.limit, 100);
    }
}
