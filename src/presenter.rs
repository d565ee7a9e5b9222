use crate::{
    prediction::{ErrorKind, Outcome, PredictError, PredictionResult},
    variant::Variant,
};

/// What the page shows for one interaction. Built fresh per request, so an
/// untriggered request can never show an earlier result.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
    Idle,
    Resulted(Outcome),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Presentation {
    Placeholder(String),
    Prediction {
        labels: Vec<String>,
        confidence: String,
    },
    Error(String),
}

impl Presentation {
    /// Text lines in display order.
    pub fn lines(&self) -> Vec<String> {
        match self {
            Presentation::Placeholder(text) | Presentation::Error(text) => vec![text.clone()],
            Presentation::Prediction { labels, confidence } => labels
                .iter()
                .cloned()
                .chain(std::iter::once(format!("Confidence: {}", confidence)))
                .collect(),
        }
    }
}

pub fn present(state: &ViewState, variant: Variant, label_delimiter: &str) -> Presentation {
    match state {
        ViewState::Idle => Presentation::Placeholder(variant.placeholder().to_string()),
        ViewState::Resulted(Ok(result)) => present_result(result, label_delimiter),
        ViewState::Resulted(Err(err)) => Presentation::Error(error_message(err)),
    }
}

fn present_result(result: &PredictionResult, label_delimiter: &str) -> Presentation {
    Presentation::Prediction {
        labels: split_labels(&result.label_text, label_delimiter),
        confidence: format_confidence(result.confidence),
    }
}

pub fn split_labels(label_text: &str, delimiter: &str) -> Vec<String> {
    if delimiter.is_empty() {
        return vec![label_text.to_string()];
    }

    label_text
        .split(delimiter)
        .map(str::to_string)
        .collect()
}

pub fn format_confidence(confidence: f64) -> String {
    format!("{:.2}%", confidence * 100.0)
}

pub fn error_message(err: &PredictError) -> String {
    match err.kind {
        ErrorKind::Unauthorized => "Unauthorized exception".to_string(),
        ErrorKind::NotFound => format!("Not found exception: {}", err.detail),
        ErrorKind::RateLimited => "Rate limit exceeded exception".to_string(),
        ErrorKind::Other => format!("Exception when calling model->predict: {}", err.detail),
    }
}
