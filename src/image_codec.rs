use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use std::{io::Cursor, path::Path};
use thiserror::Error;

pub const ALLOWED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("No image file was uploaded.")]
    MissingFile,
    #[error("The uploaded file has no name. Upload a jpg, jpeg or png image.")]
    MissingFileName,
    #[error("Unsupported file `{0}`. Upload a jpg, jpeg or png image.")]
    UnsupportedExtension(String),
    #[error("The uploaded file is not a JPEG or PNG image.")]
    UnsupportedFormat,
    #[error("Failed to decode image: {0}")]
    Decode(image::ImageError),
    #[error("Failed to encode image: {0}")]
    Encode(image::ImageError),
    #[error("Failed to read the previously uploaded image: {0}")]
    Retained(base64::DecodeError),
    #[error("The previously uploaded image is not a JPEG.")]
    RetainedNotJpeg,
}

/// An upload that decoded successfully as JPEG or PNG.
pub struct UploadedImage {
    bytes: Bytes,
    format: ImageFormat,
    image: DynamicImage,
}

impl UploadedImage {
    /// Checks the client-supplied file name before looking at the content.
    pub fn from_upload(file_name: Option<&str>, bytes: Bytes) -> Result<Self, IntakeError> {
        if bytes.is_empty() {
            return Err(IntakeError::MissingFile);
        }
        check_extension(file_name)?;
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: Bytes) -> Result<Self, IntakeError> {
        if bytes.is_empty() {
            return Err(IntakeError::MissingFile);
        }

        let reader = ImageReader::new(Cursor::new(&bytes[..]))
            .with_guessed_format()
            .map_err(|e| IntakeError::Decode(e.into()))?;

        let format = match reader.format() {
            Some(format @ (ImageFormat::Jpeg | ImageFormat::Png)) => format,
            _ => return Err(IntakeError::UnsupportedFormat),
        };

        let image = reader.decode().map_err(IntakeError::Decode)?;

        Ok(Self {
            bytes,
            format,
            image,
        })
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }

    /// Re-encodes as JPEG whatever the source format was. Alpha is dropped
    /// since the JPEG encoder only takes RGB input.
    pub fn to_jpeg(&self) -> Result<Vec<u8>, IntakeError> {
        let rgb = DynamicImage::ImageRgb8(self.image.to_rgb8());
        let mut buf = Vec::new();
        rgb.write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
            .map_err(IntakeError::Encode)?;
        Ok(buf)
    }

    pub fn encode(&self) -> Result<EncodedImage, IntakeError> {
        Ok(EncodedImage::from_jpeg(self.to_jpeg()?))
    }
}

/// JPEG bytes and their base64 text, the form sent to the model.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    jpeg: Vec<u8>,
    base64: String,
}

impl EncodedImage {
    pub fn from_jpeg(jpeg: Vec<u8>) -> Self {
        let base64 = STANDARD.encode(&jpeg);
        Self { jpeg, base64 }
    }

    /// Restores the encoding the page carried over from an earlier upload.
    /// The bytes are already the transport JPEG, so they are checked to
    /// decode but sent on untouched.
    pub fn from_retained(text: &str) -> Result<Self, IntakeError> {
        let jpeg = STANDARD.decode(text.trim()).map_err(IntakeError::Retained)?;
        let restored = UploadedImage::from_bytes(Bytes::from(jpeg.clone()))?;
        if restored.format() != ImageFormat::Jpeg {
            return Err(IntakeError::RetainedNotJpeg);
        }
        Ok(Self::from_jpeg(jpeg))
    }

    pub fn jpeg(&self) -> &[u8] {
        &self.jpeg
    }

    pub fn as_base64(&self) -> &str {
        &self.base64
    }

    pub fn data_uri(&self) -> String {
        format!("data:image/jpeg;base64,{}", self.base64)
    }
}

fn check_extension(file_name: Option<&str>) -> Result<(), IntakeError> {
    let name = file_name
        .filter(|name| !name.is_empty())
        .ok_or(IntakeError::MissingFileName)?;

    let extension = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    if ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        Ok(())
    } else {
        Err(IntakeError::UnsupportedExtension(name.to_string()))
    }
}
