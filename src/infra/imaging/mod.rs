pub mod gemini_imaging;
pub mod helper_generator;
pub mod image_fetch;
pub mod ocr_preprocess;
pub mod tesseract_ocr;

pub use gemini_imaging::GeminiImaging;
pub use helper_generator::HelperProcessGenerator;
pub use tesseract_ocr::TesseractOcr;
