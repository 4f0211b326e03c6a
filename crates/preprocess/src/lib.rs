//! Image-to-tensor preprocessing
//!
//! Resize planning and resampling, color conversion, normalization, layout
//! transforms and the `get_pixel_data` pipeline that chains them. Every stage
//! takes an owned or borrowed buffer and returns a new one.

pub mod color;
pub mod crop;
pub mod geometry;
pub mod layout;
pub mod letterbox;
pub mod normalize;
pub mod pipeline;
pub mod resample;
pub mod stats;
pub mod tensor;

pub use crop::{center_crop, five_crop, random_crop, ten_crop};
pub use geometry::{
    plan, Padding, ResizeFilter, ResizeOptions, ResizePlan, ResizeStrategy, Scale, BLACK_FILL,
    LETTERBOX_FILL,
};
pub use layout::{chw_to_hwc, convert_layout, hwc_to_chw, permute};
pub use letterbox::{letterbox, LetterboxRecord};
pub use normalize::{NormalizationPreset, NormalizationSpec, Normalizer};
pub use pipeline::{get_pixel_data, PixelDataOptions, PixelDataResult};
pub use resample::apply_plan;
pub use stats::{
    image_metadata, image_statistics, validate_image, ImageConstraints, ImageMetadata,
    ImageStatistics, ValidationReport,
};
pub use tensor::{
    concatenate_to_batch, extract_channel, extract_patch, tensor_to_image, to_ndarray,
    BatchTensor, TensorDims, TensorToImageOptions,
};
