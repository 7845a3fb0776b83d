use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of a recorded feed or job execution.
///
/// Rows are written by the ingestion path with one of these labels in the `status`
/// column. `Completed` counts as healthy and `Failed` as unhealthy when feed health is
/// computed; every other value is treated as still running or indeterminate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Starting,
    Started,
    Stopping,
    Stopped,
    Completed,
    Failed,
    Abandoned,
    Unknown,
}

impl ExecutionStatus {
    pub const ALL: [ExecutionStatus; 8] = [
        ExecutionStatus::Starting,
        ExecutionStatus::Started,
        ExecutionStatus::Stopping,
        ExecutionStatus::Stopped,
        ExecutionStatus::Completed,
        ExecutionStatus::Failed,
        ExecutionStatus::Abandoned,
        ExecutionStatus::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Starting => "STARTING",
            ExecutionStatus::Started => "STARTED",
            ExecutionStatus::Stopping => "STOPPING",
            ExecutionStatus::Stopped => "STOPPED",
            ExecutionStatus::Completed => "COMPLETED",
            ExecutionStatus::Failed => "FAILED",
            ExecutionStatus::Abandoned => "ABANDONED",
            ExecutionStatus::Unknown => "UNKNOWN",
        }
    }

    /// The execution reached a terminal state.
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed
                | ExecutionStatus::Failed
                | ExecutionStatus::Stopped
                | ExecutionStatus::Abandoned
        )
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExecutionStatus::ALL
            .iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| format!("unknown execution status '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_labels_case_insensitively() {
        assert_eq!("completed".parse::<ExecutionStatus>(), Ok(ExecutionStatus::Completed));
        assert_eq!(" FAILED ".parse::<ExecutionStatus>(), Ok(ExecutionStatus::Failed));
        assert!("exploded".parse::<ExecutionStatus>().is_err());
    }

    #[test]
    fn serializes_as_upper_case_label() {
        let json = serde_json::to_string(&ExecutionStatus::Abandoned).unwrap();
        assert_eq!(json, "\"ABANDONED\"");
    }
}
