/// Form value sent by the "Classify" button.
pub const CLASSIFY_ACTION: &str = "classify";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Classification,
    Detection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Button,
    OnUpload,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Classification => "classification",
            Variant::Detection => "detection",
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Variant::Classification => "/classify",
            Variant::Detection => "/detect",
        }
    }

    pub fn trigger(&self) -> Trigger {
        match self {
            Variant::Classification => Trigger::Button,
            Variant::Detection => Trigger::OnUpload,
        }
    }

    /// Whether a submission carrying `action` should reach the predictor.
    pub fn is_triggered(&self, action: Option<&str>) -> bool {
        match self.trigger() {
            Trigger::OnUpload => true,
            Trigger::Button => action.map(str::trim) == Some(CLASSIFY_ACTION),
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Variant::Classification => "Image Classification App",
            Variant::Detection => "Object Detection App",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Variant::Classification => {
                "Upload an image and let the EfficientNet model classify it. \
                 This model can identify a variety of objects and scenes."
            }
            Variant::Detection => {
                "Upload an image and the detection model will list the objects it finds."
            }
        }
    }

    pub fn placeholder(&self) -> &'static str {
        match self {
            Variant::Classification => {
                "Upload an image and click \"Classify\" to see the prediction."
            }
            Variant::Detection => "Upload an image to see the detected objects.",
        }
    }

    pub fn button_label(&self) -> Option<&'static str> {
        match self.trigger() {
            Trigger::Button => Some("🔍 Classify"),
            Trigger::OnUpload => None,
        }
    }

    pub fn all() -> [Variant; 2] {
        [Variant::Classification, Variant::Detection]
    }
}
