//! Glycemic analysis over one day of CGM readings
//!
//! Computes the standard consensus metrics (TIR/TBR/TAR, variability,
//! percentiles, episode counts) and evaluates a fixed table of threshold
//! rules into recommendations.

use crate::models::{DailyAnalysis, GlucoseSeries, GlycemicMetrics, Treatment};
use statrs::statistics::Statistics;
use tracing::debug;

/// Lower bound of the target range (mg/dL, inclusive)
pub const RANGE_LOW: f64 = 70.0;
/// Upper bound of the target range (mg/dL, inclusive)
pub const RANGE_HIGH: f64 = 180.0;
/// Level 2 hypoglycemia threshold (mg/dL)
pub const SEVERE_LOW: f64 = 54.0;
/// Level 2 hyperglycemia threshold (mg/dL)
pub const SEVERE_HIGH: f64 = 250.0;

pub const NO_DATA_MESSAGE: &str = "Keine SGV-Daten für den Auswertungstag gefunden.";

pub const STABLE_MESSAGE: &str =
    "Werte sind insgesamt stabil. Aktuelles Vorgehen beibehalten und auf konstante Routinen achten.";

pub const DISCLAIMER: &str = "Hinweis: Empfehlungen sind keine medizinische Anweisung und ersetzen nicht die Abstimmung mit deinem Diabetesteam.";

/// Direction of a threshold crossing for episode detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Excursion {
    /// Values strictly below the threshold
    Below,
    /// Values strictly above the threshold
    Above,
}

impl Excursion {
    fn matches(self, value: f64, threshold: f64) -> bool {
        match self {
            Excursion::Below => value < threshold,
            Excursion::Above => value > threshold,
        }
    }
}

/// A threshold rule over the metrics bundle
pub struct Rule {
    pub name: &'static str,
    pub fires: fn(&GlycemicMetrics) -> bool,
    pub message: &'static str,
}

/// Recommendation rules, evaluated in declaration order
pub const RULES: &[Rule] = &[
    Rule {
        name: "tbr",
        fires: |m| m.tbr > 4.0,
        message: "TBR ist erhöht (>4%). Muster für Unterzuckerungen prüfen (insb. Nacht/aktive Zeiten) und mit Diabetesteam Basal-/Korrekturstrategie besprechen.",
    },
    Rule {
        name: "tbr54",
        fires: |m| m.tbr54 > 1.0,
        message: "Zeit <54 mg/dL ist zu hoch (>1%). Sicherheitsfokus: Hypo-Prävention priorisieren und Alarme/Targets überprüfen.",
    },
    Rule {
        name: "cv",
        fires: |m| m.cv > 36.0,
        message: "Glukose-Variabilität ist erhöht (CV >36%). Fokus auf konsistentere Mahlzeiten-Bolus-Timings und Trigger (Sport, Stress, späte Mahlzeiten).",
    },
    Rule {
        name: "tir",
        fires: |m| m.tir < 70.0,
        message: "TIR liegt unter 70%. Wiederkehrende Tageszeiten mit Hyperglykämie identifizieren und Faktoren in CamAPS-Einstellungen mit dem Behandlungsteam reviewen.",
    },
    Rule {
        name: "tar250",
        fires: |m| m.tar250 > 5.0,
        message: "Zeit >250 mg/dL ist relevant. Prüfen, ob Mahlzeiten-Ankündigungen/Carb-Schätzungen oder Infusionsset-Wechsel optimiert werden müssen.",
    },
];

/// Percentile by linear interpolation between closest ranks.
///
/// `sorted` must be in ascending order and `p` in `[0, 1]`. Returns NaN for
/// an empty slice.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        len => {
            let rank = (len - 1) as f64 * p;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            if lo == hi {
                return sorted[lo];
            }
            let frac = rank - lo as f64;
            sorted[lo] * (1.0 - frac) + sorted[hi] * frac
        }
    }
}

/// Count maximal contiguous runs of values beyond `threshold`.
///
/// Two runs separated by a single non-qualifying value count as two.
pub fn count_episodes(series: &GlucoseSeries, threshold: f64, excursion: Excursion) -> usize {
    let mut episodes = 0;
    let mut in_episode = false;
    for &value in series.values() {
        let beyond = excursion.matches(value, threshold);
        if beyond && !in_episode {
            episodes += 1;
        }
        in_episode = beyond;
    }
    episodes
}

/// Sum carbohydrates and bolus insulin over all treatments.
///
/// Returns `(carbs_g, insulin_u)`; absent fields contribute zero.
pub fn treatment_totals(treatments: &[Treatment]) -> (f64, f64) {
    treatments.iter().fold((0.0, 0.0), |(carbs, insulin), t| {
        (
            carbs + t.carbs.unwrap_or(0.0),
            insulin + t.insulin.unwrap_or(0.0),
        )
    })
}

/// Percentage of `values` satisfying `pred`
fn share(values: &[f64], pred: impl Fn(f64) -> bool) -> f64 {
    values.iter().filter(|&&v| pred(v)).count() as f64 / values.len() as f64 * 100.0
}

/// Compute the metrics bundle for a non-empty series.
pub fn compute_metrics(series: &GlucoseSeries, treatments: &[Treatment]) -> Option<GlycemicMetrics> {
    if series.is_empty() {
        return None;
    }

    let values = series.values();

    let mean = values.iter().mean();
    let sd = values.iter().population_std_dev();
    let cv = if mean > 0.0 { sd / mean * 100.0 } else { f64::NAN };

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let (carbs, bolus) = treatment_totals(treatments);

    Some(GlycemicMetrics {
        count: values.len(),
        mean,
        sd,
        cv,
        tir: share(values, |v| (RANGE_LOW..=RANGE_HIGH).contains(&v)),
        tbr: share(values, |v| v < RANGE_LOW),
        tbr54: share(values, |v| v < SEVERE_LOW),
        tar: share(values, |v| v > RANGE_HIGH),
        tar250: share(values, |v| v > SEVERE_HIGH),
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        p5: percentile(&sorted, 0.05),
        p95: percentile(&sorted, 0.95),
        hypo_episodes: count_episodes(series, RANGE_LOW, Excursion::Below),
        hyper_episodes: count_episodes(series, RANGE_HIGH, Excursion::Above),
        carbs,
        bolus,
    })
}

/// Evaluate the rule table; always ends with the disclaimer.
pub fn recommend(metrics: &GlycemicMetrics) -> Vec<String> {
    let mut recommendations: Vec<String> = RULES
        .iter()
        .filter(|rule| (rule.fires)(metrics))
        .inspect(|rule| debug!(rule = rule.name, "Recommendation rule fired"))
        .map(|rule| rule.message.to_string())
        .collect();

    if recommendations.is_empty() {
        recommendations.push(STABLE_MESSAGE.to_string());
    }

    recommendations.push(DISCLAIMER.to_string());
    recommendations
}

/// Analyze one day of readings and treatments.
///
/// An empty series is not an error: the result carries no metrics and a
/// single no-data message.
pub fn analyze(series: &GlucoseSeries, treatments: &[Treatment]) -> DailyAnalysis {
    match compute_metrics(series, treatments) {
        Some(metrics) => {
            let recommendations = recommend(&metrics);
            DailyAnalysis {
                metrics: Some(metrics),
                recommendations,
            }
        }
        None => DailyAnalysis {
            metrics: None,
            recommendations: vec![NO_DATA_MESSAGE.to_string()],
        },
    }
}
