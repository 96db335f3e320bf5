use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// One contact the driver could not deliver to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendFailure {
    pub name: String,
    pub reason: String,
    pub timestamp: String,
}

/// Outcome of a batch dispatch, or of a request rejected before any send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendReport {
    pub success: bool,
    pub sent_count: usize,
    pub total_count: usize,
    pub failed_count: usize,
    pub failures: Vec<SendFailure>,
    pub duration_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SendReport {
    /// Report for a request that never reached the driver.
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            sent_count: 0,
            total_count: 0,
            failed_count: 0,
            failures: Vec::new(),
            duration_seconds: 0.0,
            error: Some(error.into()),
        }
    }

    /// Report for a batch with nothing to do.
    pub fn empty() -> Self {
        Self {
            success: true,
            sent_count: 0,
            total_count: 0,
            failed_count: 0,
            failures: Vec::new(),
            duration_seconds: 0.0,
            error: None,
        }
    }

    pub fn from_statistics(stats: &SendStatistics) -> Self {
        Self {
            success: stats.failed_contacts.is_empty(),
            sent_count: stats.success,
            total_count: stats.total,
            failed_count: stats.failed,
            failures: stats.failed_contacts.clone(),
            duration_seconds: stats.duration_seconds(),
            error: None,
        }
    }
}

/// Per-run accounting kept by the dispatcher. Overwritten by the next run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendStatistics {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub start_time: Option<DateTime<Local>>,
    pub end_time: Option<DateTime<Local>>,
    pub failed_contacts: Vec<SendFailure>,
}

impl SendStatistics {
    pub fn start(total: usize) -> Self {
        Self {
            total,
            start_time: Some(Local::now()),
            ..Default::default()
        }
    }

    pub fn record_success(&mut self) {
        self.success += 1;
    }

    pub fn record_failure(&mut self, failure: SendFailure) {
        self.failed += 1;
        self.failed_contacts.push(failure);
    }

    pub fn finish(&mut self) {
        self.end_time = Some(Local::now());
    }

    pub fn duration_seconds(&self) -> f64 {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => {
                (end - start).num_milliseconds().max(0) as f64 / 1000.0
            }
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_report() {
        let report = SendReport::rejected("empty message");
        assert!(!report.success);
        assert_eq!(report.sent_count, 0);
        assert_eq!(report.total_count, 0);
        assert_eq!(report.error.as_deref(), Some("empty message"));
    }

    #[test]
    fn test_report_from_statistics() {
        let mut stats = SendStatistics::start(2);
        stats.record_success();
        stats.record_failure(SendFailure {
            name: "B".to_string(),
            reason: "driver reported failure".to_string(),
            timestamp: "t".to_string(),
        });
        stats.finish();

        let report = SendReport::from_statistics(&stats);
        assert!(!report.success);
        assert_eq!(report.sent_count, 1);
        assert_eq!(report.failed_count, 1);
        assert_eq!(report.total_count, 2);
        assert_eq!(report.failures[0].name, "B");
        assert!(report.duration_seconds >= 0.0);
    }

    #[test]
    fn test_error_field_omitted_when_absent() {
        let json = serde_json::to_value(SendReport::empty()).unwrap();
        assert!(json.get("error").is_none());
    }
}
