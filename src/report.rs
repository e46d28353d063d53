use crate::models::DailyAnalysis;
use chrono::NaiveDate;
use std::fmt::Write;

/// Format a value with fixed precision, rendering NaN as `nan`
fn fixed(value: f64, precision: usize) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else {
        format!("{:.*}", precision, value)
    }
}

/// Render the plain-text daily report for the chat message.
///
/// Layout and rounding are stable: percentages, mean, SD, CV and bolus use one
/// decimal; min/max, percentiles and carbs none.
pub fn render_report(date: NaiveDate, analysis: &DailyAnalysis) -> String {
    let title = format!("Diabetes Tagesreport ({})", date.format("%d.%m.%Y"));

    let Some(m) = &analysis.metrics else {
        return format!("{}\n\nKeine verwertbaren SGV-Daten gefunden.", title);
    };

    let mut out = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(out, "{}", title);
    let _ = writeln!(out);
    let _ = writeln!(out, "Kernmetriken:");
    let _ = writeln!(out, "- TIR 70-180: {}%", fixed(m.tir, 1));
    let _ = writeln!(
        out,
        "- TBR <70: {}% (davon <54: {}%)",
        fixed(m.tbr, 1),
        fixed(m.tbr54, 1)
    );
    let _ = writeln!(
        out,
        "- TAR >180: {}% (davon >250: {}%)",
        fixed(m.tar, 1),
        fixed(m.tar250, 1)
    );
    let _ = writeln!(out, "- Mittelwert: {} mg/dL", fixed(m.mean, 1));
    let _ = writeln!(out, "- SD/CV: {} / {}%", fixed(m.sd, 1), fixed(m.cv, 1));
    let _ = writeln!(out, "- Min/Max: {}/{} mg/dL", fixed(m.min, 0), fixed(m.max, 0));
    let _ = writeln!(out, "- P5/P95: {}/{} mg/dL", fixed(m.p5, 0), fixed(m.p95, 0));
    let _ = writeln!(
        out,
        "- Hypo-/Hyper-Episoden: {}/{}",
        m.hypo_episodes, m.hyper_episodes
    );
    let _ = writeln!(
        out,
        "- KH / Bolus (aus Treatments): {} g / {} U",
        fixed(m.carbs, 0),
        fixed(m.bolus, 1)
    );
    let _ = writeln!(out);
    let _ = write!(out, "Analyse & Empfehlungen:");

    for recommendation in &analysis.recommendations {
        let _ = write!(out, "\n- {}", recommendation);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{analyze, DISCLAIMER};
    use crate::models::{GlucoseSeries, Treatment};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
    }

    #[test]
    fn test_no_data_report() {
        let analysis = analyze(&GlucoseSeries::default(), &[]);
        assert_eq!(
            render_report(date(), &analysis),
            "Diabetes Tagesreport (09.03.2024)\n\nKeine verwertbaren SGV-Daten gefunden."
        );
    }

    #[test]
    fn test_full_report_layout() {
        let series = GlucoseSeries::from_chronological(vec![100.0, 120.0, 140.0]);
        let treatments = vec![Treatment::new(Some(42.4), Some(5.26))];
        let text = render_report(date(), &analyze(&series, &treatments));

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Diabetes Tagesreport (09.03.2024)");
        assert_eq!(lines[1], "");
        assert_eq!(lines[2], "Kernmetriken:");
        assert_eq!(lines[3], "- TIR 70-180: 100.0%");
        assert_eq!(lines[4], "- TBR <70: 0.0% (davon <54: 0.0%)");
        assert_eq!(lines[5], "- TAR >180: 0.0% (davon >250: 0.0%)");
        assert_eq!(lines[6], "- Mittelwert: 120.0 mg/dL");
        assert_eq!(lines[7], "- SD/CV: 16.3 / 13.6%");
        assert_eq!(lines[8], "- Min/Max: 100/140 mg/dL");
        assert_eq!(lines[9], "- P5/P95: 102/138 mg/dL");
        assert_eq!(lines[10], "- Hypo-/Hyper-Episoden: 0/0");
        assert_eq!(lines[11], "- KH / Bolus (aus Treatments): 42 g / 5.3 U");
        assert_eq!(lines[12], "");
        assert_eq!(lines[13], "Analyse & Empfehlungen:");
        assert_eq!(lines.last().copied(), Some(format!("- {}", DISCLAIMER).as_str()));
        assert!(!text.ends_with('\n'));
    }

    #[test]
    fn test_nan_renders_as_nan() {
        assert_eq!(fixed(f64::NAN, 1), "nan");
        assert_eq!(fixed(12.345, 1), "12.3");
        assert_eq!(fixed(99.6, 0), "100");
    }
}
