//! Sequential case execution.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use cxfer_common::config::FailurePolicy;
use cxfer_common::error::{CxferError, Result, TransferError, TransferErrorKind};
use cxfer_common::types::Sha256Hash;
use cxfer_runtime::container::Container;

use crate::case::{Case, MountClass, PREREQUISITE_CONTENT, Payload, Prerequisite};
use crate::report::{CaseOutcome, Report, Verdict};

/// Payload of writes that are expected to fail.
const PROBE_PAYLOAD: &[u8] = b"bla";

/// Progress of a run, delivered to the caller as it happens.
#[derive(Debug)]
pub enum Event<'a> {
    /// Cluster acquisition is starting.
    Provisioning {
        /// Cluster name.
        cluster: &'a str,
    },
    /// The container under test is ready.
    Provisioned {
        /// Container name.
        container: &'a str,
    },
    /// A case is about to run.
    CaseStarted(&'a Case),
    /// A case has finished.
    CaseFinished(&'a CaseOutcome),
    /// Cluster teardown is starting.
    TearingDown {
        /// Cluster name.
        cluster: &'a str,
    },
}

/// Runs `cases` in order against `container`.
///
/// Classified transfer failures and content mismatches are recorded as
/// failed cases. Under [`FailurePolicy::FailFast`] the run stops at the
/// first failed case and the remaining cases are counted as skipped. When
/// `interrupted` becomes set, no further case is started.
///
/// # Errors
///
/// Returns an error if the backend fails in a way that is not a classified
/// transfer failure; such errors abort the run.
pub fn run_cases(
    container: &Container,
    cases: &[Case],
    policy: FailurePolicy,
    interrupted: &AtomicBool,
    on_event: &mut dyn FnMut(&Event<'_>),
) -> Result<Report> {
    let mut report = Report::default();
    for (index, case) in cases.iter().enumerate() {
        if interrupted.load(Ordering::SeqCst) {
            tracing::warn!(remaining = cases.len() - index, "run interrupted");
            report.interrupted = true;
            report.skipped = cases.len() - index;
            break;
        }

        on_event(&Event::CaseStarted(case));
        let started = Instant::now();
        let verdict = execute_case(container, case)?;
        let outcome = CaseOutcome {
            label: case.label(),
            verdict,
            elapsed: started.elapsed(),
        };
        match &outcome.verdict {
            Verdict::Passed => tracing::info!(case = %outcome.label, "case passed"),
            Verdict::Failed(reason) => tracing::error!(case = %outcome.label, %reason, "case failed"),
        }
        on_event(&Event::CaseFinished(&outcome));

        let failed = !outcome.passed();
        report.outcomes.push(outcome);
        if failed && policy == FailurePolicy::FailFast {
            report.skipped = cases.len() - index - 1;
            break;
        }
    }
    Ok(report)
}

/// Executes one case and returns its verdict.
///
/// # Errors
///
/// Returns an error for backend failures that are not classified transfer
/// failures.
pub fn execute_case(container: &Container, case: &Case) -> Result<Verdict> {
    match case {
        Case::RoundTrip {
            path,
            payload,
            class,
        } => round_trip(container, path, *payload, *class),
        Case::WriteFails {
            path,
            expected,
            prerequisite,
        } => {
            if let Some(prerequisite) = prerequisite {
                if let Verdict::Failed(reason) = establish(container, prerequisite)? {
                    return Ok(Verdict::Failed(reason));
                }
            }
            write_fails(container, path, *expected)
        }
    }
}

fn round_trip(container: &Container, path: &str, payload: Payload, class: MountClass) -> Result<Verdict> {
    let written = payload.bytes();
    if let Err(e) = classified(container.write_file(path, &written))? {
        return Ok(Verdict::Failed(format!("write failed: {e}")));
    }
    let read = match classified(container.read_file(path))? {
        Ok(data) => data,
        Err(e) => return Ok(Verdict::Failed(format!("read failed: {e}"))),
    };
    if read != written {
        return Ok(Verdict::Failed(mismatch(path, &written, &read)));
    }

    if class == MountClass::SharedMount {
        let Some(host_path) = container.host_path_for(path) else {
            return Ok(Verdict::Failed(format!("{path} is not beneath a mount")));
        };
        let host_label = host_path.display().to_string();
        match std::fs::read(&host_path) {
            Ok(host) if host == written => {}
            Ok(host) => return Ok(Verdict::Failed(mismatch(&host_label, &written, &host))),
            Err(e) => {
                return Ok(Verdict::Failed(format!(
                    "host copy {host_label} unreadable: {e}"
                )));
            }
        }
    }
    Ok(Verdict::Passed)
}

fn write_fails(container: &Container, path: &str, expected: TransferErrorKind) -> Result<Verdict> {
    let err = match classified(container.write_file(path, PROBE_PAYLOAD))? {
        Ok(()) => return Ok(Verdict::Failed(format!("write {path} unexpectedly succeeded"))),
        Err(e) => e,
    };
    let suffix = expected.expected_suffix().unwrap_or_default();
    if err.kind == expected && err.message_ends_with(suffix) {
        tracing::debug!(path, kind = %err.kind, message = %err, "write failed as expected");
        return Ok(Verdict::Passed);
    }
    Ok(Verdict::Failed(format!(
        "expected {expected} ending in {suffix:?}, got {}: {err}",
        err.kind
    )))
}

/// Makes a prerequisite hold, creating missing state.
fn establish(container: &Container, prerequisite: &Prerequisite) -> Result<Verdict> {
    let Prerequisite::RegularFile(path) = prerequisite;
    match classified(container.read_file(path))? {
        Ok(_) => Ok(Verdict::Passed),
        Err(e) if e.kind == TransferErrorKind::NotFound => {
            tracing::info!(path = %path, "creating prerequisite file");
            Ok(match classified(container.write_file(path, PREREQUISITE_CONTENT))? {
                Ok(()) => Verdict::Passed,
                Err(e) => Verdict::Failed(format!("prerequisite {path}: {e}")),
            })
        }
        Err(e) => Ok(Verdict::Failed(format!(
            "prerequisite {path} is not a readable regular file: {e}"
        ))),
    }
}

/// Separates classified transfer failures from fatal backend errors.
fn classified<T>(result: Result<T>) -> Result<std::result::Result<T, TransferError>> {
    match result {
        Ok(value) => Ok(Ok(value)),
        Err(CxferError::Transfer(e)) => Ok(Err(e)),
        Err(e) => Err(e),
    }
}

fn mismatch(location: &str, expected: &[u8], actual: &[u8]) -> String {
    format!(
        "{location}: expected {} bytes ({}), got {} bytes ({})",
        expected.len(),
        Sha256Hash::of(expected),
        actual.len(),
        Sha256Hash::of(actual)
    )
}
