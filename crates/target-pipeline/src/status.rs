//! Per-target processing status and domain fault records

use feature_engine::Domain;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a domain's output is degraded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultReason {
    /// The domain panicked; all of its features are invalid
    Panicked,
    /// A bounded computation ran out of time; affected features are invalid
    Timeout,
}

/// A degraded domain, recorded as data on the target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainFault {
    pub domain: Domain,
    pub reason: FaultReason,
    pub message: String,
}

impl DomainFault {
    /// Fault for a panicked domain
    pub fn panicked(domain: Domain, message: impl Into<String>) -> Self {
        Self {
            domain,
            reason: FaultReason::Panicked,
            message: message.into(),
        }
    }

    /// Fault for a domain that hit its time budget
    pub fn timeout(domain: Domain) -> Self {
        Self {
            domain,
            reason: FaultReason::Timeout,
            message: format!("{} budget exhausted", domain),
        }
    }
}

/// Outcome code stored with every record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    /// Every domain completed
    Success,
    /// The periodic search ran out of budget
    SearchTimeout,
    /// The residual complexity measure ran out of budget
    ComplexityTimeout,
    /// More than one domain ran out of budget
    MultipleTimeouts,
    /// At least one domain panicked
    DomainFailure,
}

impl ProcessingStatus {
    /// Status summarizing a target's faults. A panic outranks timeouts.
    pub fn from_faults(faults: &[DomainFault]) -> Self {
        if faults.iter().any(|f| f.reason == FaultReason::Panicked) {
            return ProcessingStatus::DomainFailure;
        }
        let timeouts: Vec<Domain> = faults
            .iter()
            .filter(|f| f.reason == FaultReason::Timeout)
            .map(|f| f.domain)
            .collect();
        match timeouts.as_slice() {
            [] => ProcessingStatus::Success,
            [Domain::Search] => ProcessingStatus::SearchTimeout,
            [Domain::Residual] => ProcessingStatus::ComplexityTimeout,
            [_] => ProcessingStatus::DomainFailure,
            _ => ProcessingStatus::MultipleTimeouts,
        }
    }

    /// Snake-case name as stored
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Success => "success",
            ProcessingStatus::SearchTimeout => "search_timeout",
            ProcessingStatus::ComplexityTimeout => "complexity_timeout",
            ProcessingStatus::MultipleTimeouts => "multiple_timeouts",
            ProcessingStatus::DomainFailure => "domain_failure",
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_faults() {
        assert_eq!(ProcessingStatus::from_faults(&[]), ProcessingStatus::Success);
        assert_eq!(
            ProcessingStatus::from_faults(&[DomainFault::timeout(Domain::Search)]),
            ProcessingStatus::SearchTimeout
        );
        assert_eq!(
            ProcessingStatus::from_faults(&[DomainFault::timeout(Domain::Residual)]),
            ProcessingStatus::ComplexityTimeout
        );
        assert_eq!(
            ProcessingStatus::from_faults(&[
                DomainFault::timeout(Domain::Residual),
                DomainFault::timeout(Domain::Search)
            ]),
            ProcessingStatus::MultipleTimeouts
        );
        assert_eq!(
            ProcessingStatus::from_faults(&[
                DomainFault::timeout(Domain::Search),
                DomainFault::panicked(Domain::Shape, "boom")
            ]),
            ProcessingStatus::DomainFailure
        );
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ProcessingStatus::SearchTimeout).unwrap(),
            "\"search_timeout\""
        );
    }
}
