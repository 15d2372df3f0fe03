use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Identifier of a flowchart job. Issued once by the registry, never reused.
pub type JobId = Uuid;

/// Name given to the single result entry a job produces.
pub const FLOWCHART_RESULT_NAME: &str = "flowchart";

/// Message attached to a result whose diagram did not pass validation.
pub const VALIDATION_FAILED_MESSAGE: &str = "Mermaid validation failed";

/// Status of a flowchart job as it moves through the pipeline.
///
/// `Submitted -> Processing -> Generating -> Validating -> {Completed | Failed}`.
/// `Failed` is also reachable from every non-terminal state.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Submitted,
    Processing,
    #[serde(rename = "generating_flowchart")]
    #[strum(serialize = "generating_flowchart")]
    Generating,
    Validating,
    Completed,
    Failed,
}

impl JobStatus {
    /// Completed and Failed are terminal; nothing leaves them.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether the pipeline may move a job from `self` to `next`.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;

        match (self, next) {
            (Completed | Failed, _) => false,
            (_, Failed) => true,
            (Submitted, Processing) => true,
            (Processing, Generating) => true,
            (Generating, Validating) => true,
            (Validating, Completed) => true,
            (Submitted | Processing | Generating | Validating, _) => false,
        }
    }
}

/// Outcome of generating and validating one flowchart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionResult {
    pub name: String,
    pub mermaid: String,
    pub validated: bool,
    pub error: Option<String>,
}

impl FunctionResult {
    pub fn flowchart(mermaid: String, validated: bool) -> Self {
        Self {
            name: FLOWCHART_RESULT_NAME.to_string(),
            mermaid,
            validated,
            error: (!validated).then(|| VALIDATION_FAILED_MESSAGE.to_string()),
        }
    }
}

/// One submitted unit of work and its evolving status.
///
/// Owned by the registry; everything outside it only sees clones.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub input: String,
    pub status: JobStatus,
    pub total_units: u32,
    pub processed_units: u32,
    pub results: Vec<FunctionResult>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(input: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            input,
            status: JobStatus::Submitted,
            total_units: 0,
            processed_units: 0,
            results: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update and bump `updated_at`.
    ///
    /// The status change is checked before any field is touched, so a
    /// rejected update leaves the record as it was.
    pub fn apply(&mut self, update: JobUpdate) -> Result<(), JobError> {
        if let Some(next) = update.status {
            if !self.status.can_transition_to(next) {
                return Err(JobError::InvalidTransition {
                    id: self.id,
                    from: self.status,
                    to: next,
                });
            }
            self.status = next;
        }
        if let Some(total) = update.total_units {
            self.total_units = total;
        }
        if let Some(processed) = update.processed_units {
            self.processed_units = processed;
        }
        if let Some(result) = update.result {
            self.results.push(result);
        }
        if let Some(error) = update.error {
            self.error = Some(error);
        }
        self.touch();
        Ok(())
    }

    // Wall clocks can repeat a reading between two quick updates, so never
    // hand out a timestamp that is not later than the previous one.
    fn touch(&mut self) {
        let now = Utc::now();
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + TimeDelta::microseconds(1)
        };
    }
}

/// Partial set of field changes applied atomically by the registry.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub total_units: Option<u32>,
    pub processed_units: Option<u32>,
    /// Appended to `results`; results are never rewritten.
    pub result: Option<FunctionResult>,
    pub error: Option<String>,
}

impl JobUpdate {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn with_total_units(mut self, total: u32) -> Self {
        self.total_units = Some(total);
        self
    }

    pub fn with_processed_units(mut self, processed: u32) -> Self {
        self.processed_units = Some(processed);
        self
    }

    pub fn with_result(mut self, result: FunctionResult) -> Self {
        self.result = Some(result);
        self
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum JobError {
    #[error("Job {0} not found")]
    NotFound(JobId),

    #[error("Job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_pipeline_path_is_allowed() {
        use JobStatus::*;
        let path = [Submitted, Processing, Generating, Validating, Completed];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_failed_reachable_from_every_active_state() {
        use JobStatus::*;
        for from in [Submitted, Processing, Generating, Validating] {
            assert!(from.can_transition_to(Failed));
        }
    }

    #[test]
    fn test_terminal_states_are_final() {
        use JobStatus::*;
        for next in [Submitted, Processing, Generating, Validating, Completed, Failed] {
            assert!(!Completed.can_transition_to(next));
            assert!(!Failed.can_transition_to(next));
        }
        assert!(Completed.is_terminal());
        assert!(Failed.is_terminal());
        assert!(!Validating.is_terminal());
    }

    #[test]
    fn test_no_skipping_or_going_back() {
        use JobStatus::*;
        assert!(!Submitted.can_transition_to(Generating));
        assert!(!Processing.can_transition_to(Completed));
        assert!(!Validating.can_transition_to(Processing));
        assert!(!Generating.can_transition_to(Generating));
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(JobStatus::Generating.to_string(), "generating_flowchart");
        assert_eq!(
            serde_json::to_value(JobStatus::Generating).unwrap(),
            serde_json::json!("generating_flowchart")
        );
        assert_eq!(JobStatus::from_str("submitted").unwrap(), JobStatus::Submitted);
    }

    #[test]
    fn test_apply_rejects_invalid_transition_without_changes() {
        let mut job = Job::new("int main(){}".to_string());
        let before = job.clone();

        let err = job
            .apply(JobUpdate::status(JobStatus::Completed).with_processed_units(1))
            .unwrap_err();

        assert!(matches!(err, JobError::InvalidTransition { .. }));
        assert_eq!(job, before);
    }

    #[test]
    fn test_apply_advances_updated_at_strictly() {
        let mut job = Job::new("x".to_string());
        let mut last = job.updated_at;
        for status in [JobStatus::Processing, JobStatus::Generating, JobStatus::Validating] {
            job.apply(JobUpdate::status(status)).unwrap();
            assert!(job.updated_at > last);
            last = job.updated_at;
        }
    }

    #[test]
    fn test_flowchart_result_error_follows_validation() {
        let ok = FunctionResult::flowchart("flowchart TD".to_string(), true);
        assert_eq!(ok.name, "flowchart");
        assert!(ok.error.is_none());

        let bad = FunctionResult::flowchart("nope".to_string(), false);
        assert_eq!(bad.error.as_deref(), Some(VALIDATION_FAILED_MESSAGE));
    }
}
