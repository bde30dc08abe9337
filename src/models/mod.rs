pub mod image;
pub mod response;

pub use self::image::{ImageKind, UploadedImage};
pub use self::response::{ErrorResponse, HealthResponse};
