use crate::{
    image_codec::{EncodedImage, IntakeError, UploadedImage},
    page::{render_page, PageView},
    presenter::{present, ViewState},
    server::SharedState,
    variant::Variant,
};
use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum DemoError {
    #[error("Invalid upload form: {0}")]
    Multipart(#[from] MultipartError),
}

impl IntoResponse for DemoError {
    fn into_response(self) -> Response {
        let status = match &self {
            DemoError::Multipart(err) => err.status(),
        };
        (status, self.to_string()).into_response()
    }
}

/// Fields of the upload form. `retained` holds the base64 JPEG of an
/// earlier upload when the file input comes back empty.
#[derive(Default)]
struct UploadForm {
    file_name: Option<String>,
    file: Option<Bytes>,
    retained: Option<String>,
    action: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, DemoError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("image") => {
                form.file_name = field.file_name().map(str::to_string);
                form.file = Some(field.bytes().await?);
            }
            Some("retained") => form.retained = Some(field.text().await?),
            Some("action") => form.action = Some(field.text().await?),
            _ => {}
        }
    }

    Ok(form)
}

/// A fresh file wins over a retained one. The retained text is already the
/// transport encoding and goes out as-is.
fn intake(form: &UploadForm) -> Result<EncodedImage, IntakeError> {
    match (&form.file, &form.retained) {
        (Some(bytes), _) if !bytes.is_empty() => {
            let uploaded = UploadedImage::from_upload(form.file_name.as_deref(), bytes.clone())?;
            tracing::debug!(
                format = ?uploaded.format(),
                dimensions = ?uploaded.dimensions(),
                size_bytes = uploaded.size_bytes(),
                "Accepted upload"
            );
            uploaded.encode()
        }
        (_, Some(retained)) if !retained.trim().is_empty() => {
            EncodedImage::from_retained(retained)
        }
        _ => Err(IntakeError::MissingFile),
    }
}

fn idle_page(state: &SharedState, variant: Variant) -> Html<String> {
    let delimiter = &state.variant_config(variant).label_delimiter;
    let presentation = present(&ViewState::Idle, variant, delimiter);
    Html(render_page(&PageView {
        variant,
        preview: None,
        rejection: None,
        presentation: &presentation,
    }))
}

async fn submit(
    state: SharedState,
    variant: Variant,
    multipart: Multipart,
) -> Result<Response, DemoError> {
    state.metrics.record_request(variant.path());
    let form = read_form(multipart).await?;
    let delimiter = &state.variant_config(variant).label_delimiter;

    let encoded = match intake(&form) {
        Ok(encoded) => encoded,
        Err(err) => {
            tracing::info!("Rejected upload: {}", err);
            let presentation = present(&ViewState::Idle, variant, delimiter);
            let html = render_page(&PageView {
                variant,
                preview: None,
                rejection: Some(&err),
                presentation: &presentation,
            });
            return Ok((StatusCode::BAD_REQUEST, Html(html)).into_response());
        }
    };

    let view_state = if variant.is_triggered(form.action.as_deref()) {
        ViewState::Resulted(state.predict(variant, &encoded).await)
    } else {
        ViewState::Idle
    };

    let presentation = present(&view_state, variant, delimiter);
    tracing::debug!(lines = ?presentation.lines(), "Rendering {} page", variant.as_str());
    let html = render_page(&PageView {
        variant,
        preview: Some(&encoded),
        rejection: None,
        presentation: &presentation,
    });

    Ok(Html(html).into_response())
}

#[instrument(skip(state))]
pub async fn classify_page(State(state): State<SharedState>) -> Html<String> {
    state.metrics.record_request(Variant::Classification.path());
    idle_page(&state, Variant::Classification)
}

#[instrument(skip(state, multipart))]
pub async fn classify_submit(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> Result<Response, DemoError> {
    submit(state, Variant::Classification, multipart).await
}

#[instrument(skip(state))]
pub async fn detect_page(State(state): State<SharedState>) -> Html<String> {
    state.metrics.record_request(Variant::Detection.path());
    idle_page(&state, Variant::Detection)
}

#[instrument(skip(state, multipart))]
pub async fn detect_submit(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> Result<Response, DemoError> {
    submit(state, Variant::Detection, multipart).await
}
