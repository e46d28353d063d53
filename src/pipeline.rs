//! The daily report job: fetch, analyze, render, deliver
//!
//! Strictly sequential; the first failing step aborts the run.

use crate::analysis::analyze;
use crate::error::Result;
use crate::models::{DailyAnalysis, GlucoseSeries};
use crate::nightscout::GlucoseSource;
use crate::report::render_report;
use crate::telegram::MessageSink;
use crate::window::EvaluationWindow;
use chrono::NaiveDate;
use std::cell::RefCell;
use std::io::Write;
use tracing::{info, info_span, warn};

/// Outcome of one report run
#[derive(Debug, Clone)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub analysis: DailyAnalysis,
    pub text: String,
}

/// Run the report job for `window`, delivering the text to `sink`.
pub fn run_daily_report<S, N>(source: &S, sink: &N, window: &EvaluationWindow) -> Result<DailyReport>
where
    S: GlucoseSource + ?Sized,
    N: MessageSink + ?Sized,
{
    let date = window.report_date();
    let _span = info_span!("daily_report", %date).entered();
    info!(start = %window.start_iso(), end = %window.end_iso(), "Evaluating window");

    let readings = source.fetch_glucose(window)?;
    let series = GlucoseSeries::from_readings(readings);
    let treatments = source.fetch_treatments(window)?;
    info!(readings = series.len(), treatments = treatments.len(), "Fetched data");

    let analysis = analyze(&series, &treatments);
    if analysis.is_empty() {
        warn!("No glucose readings in window, sending reduced report");
    }

    let text = render_report(date, &analysis);
    sink.send_message(&text)?;

    Ok(DailyReport { date, analysis, text })
}

/// Writes messages to a stream instead of posting them (dry-run mode)
pub struct ConsoleSink<W: Write> {
    out: RefCell<W>,
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out: RefCell::new(out) }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write> MessageSink for ConsoleSink<W> {
    fn send_message(&self, text: &str) -> Result<()> {
        let mut out = self.out.borrow_mut();
        writeln!(out, "{}", text)?;
        out.flush()?;
        Ok(())
    }
}
