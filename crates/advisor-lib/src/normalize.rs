//! Input normalization
//!
//! Converts raw request payloads into the exact shapes the models expect.
//! Tabular features pass through unchanged (see `SoilSample::feature_vector`);
//! uploaded images are validated, decoded, and turned into a `(1, S, S, 3)`
//! float tensor in `[0, 1]`.

use crate::error::ServiceError;
use crate::models::ImageUpload;
use image::imageops::FilterType;
use tract_onnx::prelude::*;

const WRONG_FILE_TYPE: &str = "Invalid file type. Please upload an image file (JPEG, PNG, etc.)";
const CORRUPT_IMAGE: &str = "Invalid image file. Please upload a valid image.";

/// Reject uploads whose declared content-type is not `image/*`. Cheap check
/// that runs before any model or decoder is touched.
pub fn validate_image_content_type(upload: &ImageUpload) -> Result<(), ServiceError> {
    match upload.content_type.as_deref() {
        Some(ct) if ct.starts_with("image/") => Ok(()),
        _ => Err(ServiceError::invalid_input(WRONG_FILE_TYPE)),
    }
}

/// Decode an uploaded image and normalize it for the disease model:
/// RGB, resized exactly to `input_size`, pixels scaled to `[0, 1]`, NHWC
/// layout with a leading batch dimension of 1.
pub fn image_tensor(upload: &ImageUpload, input_size: u32) -> Result<Tensor, ServiceError> {
    validate_image_content_type(upload)?;

    let decoded = image::load_from_memory(&upload.bytes)
        .map_err(|e| {
            tracing::warn!(error = %e, "Error decoding uploaded image");
            ServiceError::invalid_input(CORRUPT_IMAGE)
        })?
        .to_rgb8();

    let resized = image::imageops::resize(&decoded, input_size, input_size, FilterType::Triangle);

    let side = input_size as usize;
    let tensor = tract_ndarray::Array4::from_shape_fn((1, side, side, 3), |(_, y, x, c)| {
        resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
    });

    Ok(tensor.into())
}
