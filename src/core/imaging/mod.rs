pub mod helper_protocol;
pub mod imaging_models;
pub mod imaging_service;
pub mod intent;
pub mod jobs;

pub use imaging_models::{GeneratedImage, ImageData, ImageRequest, ImagingError, VisionTask};
pub use imaging_service::{ImageAnalyzer, ImageGenerator, ImagingService, OcrBackend, OcrEngine};
pub use intent::{detect_image_intent, ImageIntent};
