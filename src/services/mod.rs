pub mod cleanup;
pub mod pdf_writer;
pub mod store;

pub use cleanup::CleanupGuard;
pub use pdf_writer::{DocumentWriter, PageGeometry};
pub use store::{sanitize_file_name, TransientStore};
