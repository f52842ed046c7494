//! Runs the conformance test and reports progress on stderr.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cxfer_common::config::HarnessConfig;
use cxfer_harness::case::Case;
use cxfer_harness::conformance;
use cxfer_harness::report::{Report, Verdict};
use cxfer_harness::runner::Event;
use cxfer_runtime::backend;

use crate::output::{BOLD, CYAN, DIM, GREEN, RED, RESET, YELLOW, format_bytes};

/// Executes one conformance run.
///
/// # Errors
///
/// Returns an error if the backend is unavailable, provisioning or a backend
/// call fails, or any case fails or is skipped.
pub fn execute(config: &HarnessConfig) -> anyhow::Result<()> {
    print_header(config);

    let backend = backend::backend_for(config)?;
    if !backend.is_available() {
        anyhow::bail!(
            "the {} backend is not available on this host (set CXFER_BACKEND=local to emulate)",
            backend.name()
        );
    }

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {e}"))?;

    let report = conformance::run(config, backend, &interrupted, &mut print_event)?;
    print_summary(&report);

    if report.all_passed() {
        Ok(())
    } else {
        Err(anyhow::anyhow!("conformance run failed: {report}"))
    }
}

fn print_header(config: &HarnessConfig) {
    eprintln!();
    eprintln!("  {BOLD}cxfer{RESET} {DIM}v{}{RESET}", env!("CARGO_PKG_VERSION"));
    eprintln!(
        "  {DIM}backend {} | image {} | shared dir {}{RESET}",
        config.backend,
        config.image,
        config.nfs_dir.display()
    );
    eprintln!();
}

fn print_event(event: &Event<'_>) {
    match event {
        Event::Provisioning { cluster } => {
            eprintln!("-- Getting/Creating cluster {BOLD}{cluster}{RESET} --");
        }
        Event::Provisioned { container } => {
            eprintln!("   container {CYAN}{container}{RESET} ready");
            eprintln!("-- Running tests --");
        }
        Event::CaseStarted(case) => eprint!("  {}", describe(case)),
        Event::CaseFinished(outcome) => match &outcome.verdict {
            Verdict::Passed => eprintln!(
                " {GREEN}OK{RESET} {DIM}({:.2}s){RESET}",
                outcome.elapsed.as_secs_f64()
            ),
            Verdict::Failed(reason) => {
                eprintln!(" {RED}{BOLD}FAILED{RESET}");
                eprintln!("      {reason}");
            }
        },
        Event::TearingDown { cluster } => {
            eprintln!("-- Tearing down cluster {BOLD}{cluster}{RESET} --");
        }
    }
}

fn describe(case: &Case) -> String {
    match case {
        Case::RoundTrip { path, payload, .. } => {
            format!("test writing {}, path: {path}", format_bytes(payload.len()))
        }
        Case::WriteFails { path, expected, .. } => {
            format!("test writing to {path} fails with {expected}")
        }
    }
}

fn print_summary(report: &Report) {
    eprintln!();
    if let Some(e) = &report.teardown_error {
        eprintln!("  {YELLOW}Warning:{RESET} teardown failed: {e}");
    }
    if report.interrupted {
        eprintln!("  {YELLOW}Interrupted.{RESET}");
    }
    if report.all_passed() {
        eprintln!("  {GREEN}{BOLD}{report}{RESET}");
    } else {
        eprintln!("  {RED}{BOLD}{report}{RESET}");
        for failure in report.failures() {
            eprintln!("    {RED}●{RESET} {}", failure.label);
        }
    }
}

#[cfg(test)]
mod tests {
    use cxfer_harness::case::standard_cases;

    use super::*;

    #[test]
    fn round_trip_progress_line_names_size_and_path() {
        let cases = standard_cases("/nfsdir");
        assert_eq!(describe(&cases[0]), "test writing 11 B, path: /tmp/file0");
        assert_eq!(describe(&cases[1]), "test writing 4 KiB, path: /tmp/file1");
        assert_eq!(describe(&cases[5]), "test writing 1 MiB, path: /nfsdir/file2");
    }

    #[test]
    fn error_case_progress_line_names_expectation() {
        let cases = standard_cases("/nfsdir");
        assert_eq!(
            describe(&cases[7]),
            "test writing to /tmp/file0/bla fails with parent not a directory"
        );
    }
}
