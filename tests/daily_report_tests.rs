//! End-to-end tests of the daily report job
//!
//! The data server and the chat API are replaced by in-memory fakes.

use chrono::NaiveDate;
use chrono_tz::Europe::Berlin;
use glucors::analysis::{DISCLAIMER, NO_DATA_MESSAGE, RULES};
use glucors::error::{Service, UpstreamError};
use glucors::{
    run_daily_report, EvaluationWindow, GlucoRsError, GlucoseReading, GlucoseSource, MessageSink,
    Result, Treatment,
};
use std::cell::RefCell;

/// Serves fixed data and records the windows it was asked for
#[derive(Default)]
struct FakeSource {
    readings: Vec<GlucoseReading>,
    treatments: Vec<Treatment>,
    fail_treatments: bool,
    requested: RefCell<Vec<(i64, i64)>>,
}

impl GlucoseSource for FakeSource {
    fn fetch_glucose(&self, window: &EvaluationWindow) -> Result<Vec<GlucoseReading>> {
        self.requested.borrow_mut().push((window.start_ms(), window.end_ms()));
        Ok(self.readings.clone())
    }

    fn fetch_treatments(&self, _window: &EvaluationWindow) -> Result<Vec<Treatment>> {
        if self.fail_treatments {
            return Err(UpstreamError::Status {
                service: Service::Nightscout,
                endpoint: "treatments.json".to_string(),
                status: 503,
            }
            .into());
        }
        Ok(self.treatments.clone())
    }
}

#[derive(Default)]
struct RecordingSink {
    sent: RefCell<Vec<String>>,
}

impl MessageSink for RecordingSink {
    fn send_message(&self, text: &str) -> Result<()> {
        self.sent.borrow_mut().push(text.to_string());
        Ok(())
    }
}

struct FailingSink;

impl MessageSink for FailingSink {
    fn send_message(&self, _text: &str) -> Result<()> {
        Err(UpstreamError::Status {
            service: Service::Telegram,
            endpoint: "sendMessage".to_string(),
            status: 400,
        }
        .into())
    }
}

fn window() -> EvaluationWindow {
    EvaluationWindow::for_date(NaiveDate::from_ymd_opt(2024, 6, 14).unwrap(), Berlin).unwrap()
}

/// Readings delivered newest-first, as Nightscout does
fn readings_newest_first(values: &[f64]) -> Vec<GlucoseReading> {
    let start = window().start_ms();
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| GlucoseReading::new(start + i as i64 * 300_000, v))
        .rev()
        .collect()
}

#[test]
fn test_full_day_report_is_sent() {
    let source = FakeSource {
        readings: readings_newest_first(&[65.0, 65.0, 75.0, 190.0, 260.0]),
        treatments: vec![
            Treatment::new(Some(40.0), Some(4.0)),
            Treatment::new(Some(20.0), None),
        ],
        ..Default::default()
    };
    let sink = RecordingSink::default();

    let report = run_daily_report(&source, &sink, &window()).unwrap();

    let sent = sink.sent.borrow();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0], report.text);
    assert!(report.text.starts_with("Diabetes Tagesreport (14.06.2024)"));
    assert!(report.text.contains("- TIR 70-180: 20.0%"));
    assert!(report.text.contains("- TBR <70: 40.0% (davon <54: 0.0%)"));
    assert!(report.text.contains("- TAR >180: 40.0% (davon >250: 20.0%)"));
    assert!(report.text.contains("- Hypo-/Hyper-Episoden: 1/1"));
    assert!(report.text.contains("- KH / Bolus (aus Treatments): 60 g / 4.0 U"));
    assert!(report.text.ends_with(&format!("- {}", DISCLAIMER)));

    let metrics = report.analysis.metrics.as_ref().unwrap();
    assert_eq!(metrics.count, 5);
    assert_eq!(report.analysis.recommendations[0], RULES[0].message);
}

#[test]
fn test_readings_are_sorted_before_episode_counting() {
    // Chronologically: low, high, low => two hypo episodes
    let start = window().start_ms();
    let source = FakeSource {
        readings: vec![
            GlucoseReading::new(start + 600_000, 60.0),
            GlucoseReading::new(start, 60.0),
            GlucoseReading::new(start + 300_000, 120.0),
        ],
        ..Default::default()
    };

    let report = run_daily_report(&source, &RecordingSink::default(), &window()).unwrap();
    assert_eq!(report.analysis.metrics.unwrap().hypo_episodes, 2);
}

#[test]
fn test_no_data_day() {
    let source = FakeSource::default();
    let sink = RecordingSink::default();

    let report = run_daily_report(&source, &sink, &window()).unwrap();

    assert!(report.analysis.is_empty());
    assert_eq!(report.analysis.recommendations, vec![NO_DATA_MESSAGE.to_string()]);
    assert_eq!(
        sink.sent.borrow()[0],
        "Diabetes Tagesreport (14.06.2024)\n\nKeine verwertbaren SGV-Daten gefunden."
    );
}

#[test]
fn test_window_is_passed_to_source() {
    let source = FakeSource::default();
    run_daily_report(&source, &RecordingSink::default(), &window()).unwrap();

    assert_eq!(
        source.requested.borrow().as_slice(),
        &[(1_718_316_000_000, 1_718_402_400_000)]
    );
}

#[test]
fn test_upstream_failure_aborts_before_sending() {
    let source = FakeSource {
        readings: readings_newest_first(&[120.0]),
        fail_treatments: true,
        ..Default::default()
    };
    let sink = RecordingSink::default();

    let err = run_daily_report(&source, &sink, &window()).unwrap_err();

    assert!(matches!(
        err,
        GlucoRsError::Upstream(UpstreamError::Status { status: 503, .. })
    ));
    assert!(sink.sent.borrow().is_empty());
}

#[test]
fn test_send_failure_propagates() {
    let source = FakeSource {
        readings: readings_newest_first(&[120.0, 130.0]),
        ..Default::default()
    };

    let err = run_daily_report(&source, &FailingSink, &window()).unwrap_err();
    match err {
        GlucoRsError::Upstream(upstream) => assert_eq!(upstream.service(), Service::Telegram),
        other => panic!("unexpected error: {other}"),
    }
}
