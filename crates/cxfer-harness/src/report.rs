//! Per-case outcomes of a conformance run.

use std::fmt;
use std::time::Duration;

/// Result of one case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Every assertion held.
    Passed,
    /// The first violated assertion.
    Failed(String),
}

/// Outcome of one executed case.
#[derive(Debug, Clone)]
pub struct CaseOutcome {
    /// Case description.
    pub label: String,
    /// Pass or failure reason.
    pub verdict: Verdict,
    /// Wall time spent in the case.
    pub elapsed: Duration,
}

impl CaseOutcome {
    /// Whether the case passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Passed
    }
}

/// Collected outcomes of a run.
#[derive(Debug, Clone, Default)]
pub struct Report {
    /// Outcomes of executed cases, in execution order.
    pub outcomes: Vec<CaseOutcome>,
    /// Cases not executed because the run stopped early.
    pub skipped: usize,
    /// Whether the run was interrupted.
    pub interrupted: bool,
    /// Teardown failure, if any. Does not affect the verdict.
    pub teardown_error: Option<String>,
}

impl Report {
    /// Number of passed cases.
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed()).count()
    }

    /// Outcomes that failed.
    pub fn failures(&self) -> impl Iterator<Item = &CaseOutcome> {
        self.outcomes.iter().filter(|o| !o.passed())
    }

    /// Whether every case ran and passed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        !self.interrupted && self.skipped == 0 && self.outcomes.iter().all(CaseOutcome::passed)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} cases passed",
            self.passed_count(),
            self.outcomes.len() + self.skipped
        )?;
        if self.skipped > 0 {
            write!(f, ", {} skipped", self.skipped)?;
        }
        if self.interrupted {
            write!(f, ", interrupted")?;
        }
        Ok(())
    }
}
