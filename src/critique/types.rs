use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct DimensionScore {
    pub score: f64,
    pub feedback: String,
}

/// Typed view of the critique the prompt asks for. Replies are returned to
/// callers as parsed, so this is only used to report deviations.
#[derive(Debug, Clone, Deserialize)]
pub struct CritiqueResult {
    pub overall_score: f64,
    pub brand_alignment: DimensionScore,
    pub visual_quality: DimensionScore,
    pub message_clarity: DimensionScore,
    pub safety_ethics: DimensionScore,
    pub strengths: Vec<String>,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
}

const MEAN_TOLERANCE: f64 = 1.0;

impl CritiqueResult {
    pub fn dimensions(&self) -> [(&'static str, &DimensionScore); 4] {
        [
            ("brand_alignment", &self.brand_alignment),
            ("visual_quality", &self.visual_quality),
            ("message_clarity", &self.message_clarity),
            ("safety_ethics", &self.safety_ethics),
        ]
    }

    pub fn dimension_mean(&self) -> f64 {
        self.dimensions()
            .iter()
            .map(|(_, dimension)| dimension.score)
            .sum::<f64>()
            / 4.0
    }
}

fn out_of_range(score: f64) -> bool {
    !(0.0..=100.0).contains(&score)
}

/// Lists the ways a parsed reply departs from the requested layout.
/// An empty list means the reply matches it.
pub fn review_reply(value: &Value) -> Vec<String> {
    let result = match CritiqueResult::deserialize(value) {
        Ok(result) => result,
        Err(err) => return vec![format!("reply does not match the critique layout: {err}")],
    };

    let mut findings = Vec::new();
    if out_of_range(result.overall_score) {
        findings.push(format!("overall_score {} outside 0-100", result.overall_score));
    }
    for (name, dimension) in result.dimensions() {
        if out_of_range(dimension.score) {
            findings.push(format!("{name}.score {} outside 0-100", dimension.score));
        }
        if dimension.feedback.trim().is_empty() {
            findings.push(format!("{name}.feedback is empty"));
        }
    }

    let mean = result.dimension_mean();
    if (result.overall_score - mean).abs() > MEAN_TOLERANCE {
        findings.push(format!(
            "overall_score {} differs from dimension mean {:.2}",
            result.overall_score, mean
        ));
    }

    for (name, items, expected) in [
        ("strengths", &result.strengths, 3),
        ("issues", &result.issues, 2),
        ("suggestions", &result.suggestions, 3),
    ] {
        if items.len() != expected {
            findings.push(format!("{name} has {} entries, expected {expected}", items.len()));
        }
    }

    findings
}
