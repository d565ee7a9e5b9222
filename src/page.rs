use crate::{
    image_codec::{EncodedImage, IntakeError, ALLOWED_EXTENSIONS},
    presenter::Presentation,
    variant::{Trigger, Variant, CLASSIFY_ACTION},
};

const STYLE: &str = r#"
body { font-family: 'Roboto', sans-serif; background-color: #f5f5f5; margin: 0; padding: 2rem; }
nav { text-align: center; margin-bottom: 1rem; }
nav a { margin: 0 0.75rem; color: #4CAF50; }
.title { font-size: 2.5rem; color: #4CAF50; text-align: center; }
.description { font-size: 1.25rem; color: #555; text-align: center; margin-bottom: 2rem; }
form { text-align: center; margin-bottom: 2rem; }
form button { display: block; margin: 1rem auto; background-color: #4CAF50; color: white;
  padding: 10px 24px; font-size: 16px; cursor: pointer; border: none; border-radius: 8px; }
form button:hover { background-color: #45a049; }
.columns { display: flex; gap: 2rem; justify-content: center; }
.columns > div { flex: 1; max-width: 40rem; }
.uploaded-image { width: 100%; border: 2px solid #4CAF50; border-radius: 8px; }
.caption { text-align: center; color: #555; }
.prediction-container { text-align: center; margin-top: 20px; }
.prediction-title { font-size: 24px; color: #333; }
.prediction-class { font-size: 20px; color: #4CAF50; }
.confidence, .placeholder { font-size: 20px; color: #FF5733; }
.error, .rejection { background: #fdecea; color: #b71c1c; padding: 1rem; border-radius: 8px; }
.rejection { max-width: 40rem; margin: 0 auto 2rem auto; }
"#;

pub struct PageView<'a> {
    pub variant: Variant,
    pub preview: Option<&'a EncodedImage>,
    pub rejection: Option<&'a IntakeError>,
    pub presentation: &'a Presentation,
}

pub fn render_page(view: &PageView) -> String {
    let variant = view.variant;
    let mut html = String::with_capacity(4096);

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{}</title>\n", escape_html(variant.title())));
    html.push_str(&format!("<style>{}</style>\n</head>\n<body>\n", STYLE));

    html.push_str("<nav>");
    for other in Variant::all() {
        html.push_str(&format!(
            "<a href=\"{}\">{}</a>",
            other.path(),
            escape_html(other.title())
        ));
    }
    html.push_str("</nav>\n");

    html.push_str(&format!(
        "<div class=\"title\">{}</div>\n<div class=\"description\">{}</div>\n",
        escape_html(variant.title()),
        escape_html(variant.description())
    ));

    render_form(&mut html, view);

    if let Some(rejection) = view.rejection {
        html.push_str(&format!(
            "<div class=\"rejection\">{}</div>\n",
            escape_html(&rejection.to_string())
        ));
    }

    html.push_str("<div class=\"columns\">\n");
    if let Some(preview) = view.preview {
        html.push_str(&format!(
            "<div><img class=\"uploaded-image\" src=\"{}\" alt=\"Uploaded Image\">\
             <p class=\"caption\">Uploaded Image</p></div>\n",
            preview.data_uri()
        ));
    }
    render_presentation(&mut html, view.presentation);
    html.push_str("</div>\n</body>\n</html>\n");

    html
}

fn render_form(html: &mut String, view: &PageView) {
    let accept = ALLOWED_EXTENSIONS
        .iter()
        .map(|ext| format!(".{}", ext))
        .collect::<Vec<_>>()
        .join(",");

    html.push_str(&format!(
        "<form method=\"post\" action=\"{}\" enctype=\"multipart/form-data\">\n\
         <label for=\"image\">Choose an image...</label>\n\
         <input type=\"file\" id=\"image\" name=\"image\" accept=\"{}\" onchange=\"this.form.submit()\">\n",
        view.variant.path(),
        accept
    ));

    if view.variant.trigger() == Trigger::Button {
        // The file input is empty after a reload, so the last upload rides along.
        if let Some(preview) = view.preview {
            html.push_str(&format!(
                "<input type=\"hidden\" name=\"retained\" value=\"{}\">\n",
                preview.as_base64()
            ));
        }
    }

    if let Some(label) = view.variant.button_label() {
        html.push_str(&format!(
            "<button type=\"submit\" name=\"action\" value=\"{}\">{}</button>\n",
            CLASSIFY_ACTION,
            escape_html(label)
        ));
    }

    html.push_str("</form>\n");
}

fn render_presentation(html: &mut String, presentation: &Presentation) {
    html.push_str("<div class=\"prediction-container\">\n");

    match presentation {
        Presentation::Placeholder(text) => {
            html.push_str("<p class=\"prediction-title\"><strong>Prediction:</strong></p>\n");
            html.push_str(&format!("<p class=\"placeholder\">{}</p>\n", escape_html(text)));
        }
        Presentation::Prediction { labels, confidence } => {
            html.push_str("<p class=\"prediction-title\"><strong>Prediction:</strong></p>\n");
            for label in labels {
                html.push_str(&format!(
                    "<p class=\"prediction-class\">{}</p>\n",
                    escape_html(label)
                ));
            }
            html.push_str(&format!(
                "<p class=\"confidence\">Confidence: {}</p>\n",
                escape_html(confidence)
            ));
        }
        Presentation::Error(message) => {
            html.push_str(&format!("<div class=\"error\">{}</div>\n", escape_html(message)));
        }
    }

    html.push_str("</div>\n");
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        prediction::{ErrorKind, PredictError},
        presenter::{present, ViewState},
    };

    #[test]
    fn test_idle_page_has_placeholder_and_button() {
        let presentation = present(&ViewState::Idle, Variant::Classification, ", ");
        let html = render_page(&PageView {
            variant: Variant::Classification,
            preview: None,
            rejection: None,
            presentation: &presentation,
        });

        assert!(html.contains("Image Classification App"));
        assert!(html.contains("accept=\".jpg,.jpeg,.png\""));
        assert!(html.contains("value=\"classify\""));
        assert!(html.contains("to see the prediction."));
        assert!(!html.contains("name=\"retained\""));
    }

    #[test]
    fn test_detection_page_has_no_button() {
        let presentation = present(&ViewState::Idle, Variant::Detection, ", ");
        let html = render_page(&PageView {
            variant: Variant::Detection,
            preview: None,
            rejection: None,
            presentation: &presentation,
        });

        assert!(html.contains("action=\"/detect\""));
        assert!(!html.contains("<button"));
    }

    #[test]
    fn test_preview_is_retained_for_the_button_variant() {
        let preview = EncodedImage::from_jpeg(vec![0xFF, 0xD8, 0xFF]);
        let presentation = present(&ViewState::Idle, Variant::Classification, ", ");
        let html = render_page(&PageView {
            variant: Variant::Classification,
            preview: Some(&preview),
            rejection: None,
            presentation: &presentation,
        });

        assert!(html.contains("src=\"data:image/jpeg;base64,/9j/\""));
        assert!(html.contains("name=\"retained\" value=\"/9j/\""));
    }

    #[test]
    fn test_error_text_is_escaped() {
        let state = ViewState::Resulted(Err(PredictError::new(
            ErrorKind::Other,
            "<script>alert(1)</script>",
        )));
        let presentation = present(&state, Variant::Classification, ", ");
        let html = render_page(&PageView {
            variant: Variant::Classification,
            preview: None,
            rejection: None,
            presentation: &presentation,
        });

        assert!(html.contains("model-&gt;predict: &lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_rejection_banner() {
        let presentation = present(&ViewState::Idle, Variant::Detection, ", ");
        let rejection = IntakeError::MissingFile;
        let html = render_page(&PageView {
            variant: Variant::Detection,
            preview: None,
            rejection: Some(&rejection),
            presentation: &presentation,
        });

        assert!(html.contains("<div class=\"rejection\">No image file was uploaded.</div>"));
    }
}
