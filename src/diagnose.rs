//! Connectivity diagnostics for the data server and the chat API
//!
//! Three sequential checks, stopping at the first failure:
//! server status, sample entries, and a test message.

use crate::error::Result;
use crate::nightscout::NightscoutClient;
use crate::telegram::MessageSink;
use chrono::{DateTime, Utc};
use colored::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Display;
use std::io::Write;
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub const TEST_MESSAGE: &str = "Test: Nightscout/Telegram Verbindung ist aktiv.";

/// Entries requested for the access check
pub const SAMPLE_SIZE: usize = 3;

const STEP_COUNT: usize = 3;

/// Read-only reachability checks against the data server
pub trait ServerProbe {
    /// HTTP status of the unauthenticated status endpoint
    fn status(&self) -> Result<u16>;

    /// The newest `count` entries as returned by the server
    fn sample_entries(&self, count: usize) -> Result<Value>;
}

impl ServerProbe for NightscoutClient {
    fn status(&self) -> Result<u16> {
        NightscoutClient::status(self)
    }

    fn sample_entries(&self, count: usize) -> Result<Value> {
        NightscoutClient::sample_entries(self, count)
    }
}

/// Result of a single diagnostic step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub name: String,
    pub success: bool,
    pub detail: String,
}

/// Summary of a diagnostics run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticReport {
    /// When the run started
    pub timestamp: DateTime<Utc>,

    /// Steps in execution order; stops after the first failure
    pub steps: Vec<StepOutcome>,

    /// Non-fatal findings
    pub warnings: Vec<String>,

    /// Run duration
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

impl DiagnosticReport {
    fn new() -> Self {
        Self {
            timestamp: Utc::now(),
            steps: Vec::new(),
            warnings: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    /// True when every step ran and passed
    pub fn success(&self) -> bool {
        self.steps.len() == STEP_COUNT && self.steps.iter().all(|s| s.success)
    }

    /// Process exit code: 0 on full success, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        if self.success() {
            0
        } else {
            1
        }
    }

    /// First failing step, if any
    pub fn failure(&self) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| !s.success)
    }

    fn record(&mut self, name: &str, success: bool, detail: impl Into<String>) {
        self.steps.push(StepOutcome {
            name: name.to_string(),
            success,
            detail: detail.into(),
        });
    }
}

/// Print the final failure line
pub fn print_failure<W: Write>(out: &mut W, error: &dyn Display) {
    let _ = writeln!(out, "\n{} {}", "FEHLER:".red().bold(), error);
}

fn step<W: Write>(out: &mut W, index: usize, title: &str) {
    let _ = writeln!(out, "[{}/{}] {} ...", index, STEP_COUNT, title);
}

fn ok<W: Write>(out: &mut W, detail: &str) {
    let _ = writeln!(out, "  {} {}", "OK:".green(), detail);
}

/// Run all checks, printing progress to `out`.
pub fn run_diagnostics<P, N, W>(probe: &P, sink: &N, out: &mut W) -> DiagnosticReport
where
    P: ServerProbe + ?Sized,
    N: MessageSink + ?Sized,
    W: Write,
{
    let started = Instant::now();
    let mut report = DiagnosticReport::new();

    if let Err(err) = run_steps(probe, sink, out, &mut report) {
        warn!(error = %err, "Diagnostics failed");
        print_failure(out, &err);
    } else {
        info!("Diagnostics passed");
        let _ = writeln!(out, "\n{}", "Alles erfolgreich. Dein Stack ist bereit.".green().bold());
    }

    report.duration = started.elapsed();
    report
}

fn run_steps<P, N, W>(probe: &P, sink: &N, out: &mut W, report: &mut DiagnosticReport) -> Result<()>
where
    P: ServerProbe + ?Sized,
    N: MessageSink + ?Sized,
    W: Write,
{
    step(out, 1, "Pruefe Nightscout Status");
    let status = probe.status().inspect_err(|e| report.record("status", false, e.to_string()))?;
    let detail = format!("status.json erreichbar ({})", status);
    ok(out, &detail);
    report.record("status", true, detail);

    step(out, 2, "Pruefe SGV Zugriff");
    let entries = probe
        .sample_entries(SAMPLE_SIZE)
        .inspect_err(|e| report.record("entries", false, e.to_string()))?;
    let detail = match entries.as_array() {
        Some(records) => {
            let detail = format!("entries.json abrufbar, Datensaetze: {}", records.len());
            ok(out, &detail);
            detail
        }
        None => {
            let warning = "Unerwartetes Antwortformat in entries.json".to_string();
            let _ = writeln!(out, "  {} {}", "WARNUNG:".yellow(), warning);
            report.warnings.push(warning.clone());
            warning
        }
    };
    report.record("entries", true, detail);

    step(out, 3, "Sende Telegram Testnachricht");
    sink.send_message(TEST_MESSAGE)
        .inspect_err(|e| report.record("telegram", false, e.to_string()))?;
    ok(out, "Testnachricht gesendet");
    report.record("telegram", true, "Testnachricht gesendet");

    Ok(())
}

/// Run all checks for the command line.
///
/// Progress goes to `out`. With `json` set, progress goes to `log` instead
/// and `out` receives only the pretty-printed report, so it stays parseable.
pub fn run_and_report<P, N, O, L>(probe: &P, sink: &N, json: bool, out: &mut O, log: &mut L) -> DiagnosticReport
where
    P: ServerProbe + ?Sized,
    N: MessageSink + ?Sized,
    O: Write,
    L: Write,
{
    if !json {
        return run_diagnostics(probe, sink, out);
    }

    let report = run_diagnostics(probe, sink, log);
    match serde_json::to_string_pretty(&report) {
        Ok(text) => {
            let _ = writeln!(out, "{}", text);
        }
        Err(err) => warn!(error = %err, "Could not serialize diagnostic report"),
    }
    report
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
