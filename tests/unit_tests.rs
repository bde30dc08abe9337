//! Unit tests for individual components

use std::io::Cursor;

use bindery::{
    config::Config,
    error::AppError,
    models::{ImageKind, UploadedImage},
    services::{pdf_writer::fit_rect, sanitize_file_name, CleanupGuard, DocumentWriter, TransientStore},
};
use lopdf::{Document, Object, ObjectId};

#[test]
fn test_sanitize_file_name() {
    assert_eq!(sanitize_file_name("holiday-photo_1"), "holiday-photo_1");
    assert_eq!(sanitize_file_name("my photo (1)"), "my_photo__1_");
    assert_eq!(sanitize_file_name("été.jpg"), "_t__jpg");
    assert_eq!(sanitize_file_name("a/b\\c"), "a_b_c");
    assert_eq!(sanitize_file_name(""), "");
}

#[test]
fn test_image_kind_from_mime() {
    assert_eq!(ImageKind::from_mime("image/jpeg"), Some(ImageKind::Jpeg));
    assert_eq!(ImageKind::from_mime("image/png"), Some(ImageKind::Png));
    assert_eq!(
        ImageKind::from_mime("image/png; charset=binary"),
        Some(ImageKind::Png)
    );
    assert_eq!(ImageKind::from_mime("image/gif"), None);
    assert_eq!(ImageKind::from_mime("application/pdf"), None);
    assert_eq!(ImageKind::from_mime(""), None);
}

#[test]
fn test_error_codes() {
    assert_eq!(AppError::NoFilesProvided.error_code(), "NO_FILES_PROVIDED");
    assert_eq!(
        AppError::TooManyFiles { limit: 50 }.error_code(),
        "TOO_MANY_FILES"
    );
    assert_eq!(
        AppError::PayloadTooLarge { limit_mb: 10 }.error_code(),
        "PAYLOAD_TOO_LARGE"
    );
    assert_eq!(
        AppError::conversion("boom").error_code(),
        "CONVERSION_FAILED"
    );
    assert_eq!(AppError::internal("boom").error_code(), "INTERNAL_ERROR");
}

#[test]
fn test_error_status_codes() {
    use axum::http::StatusCode;

    assert_eq!(AppError::NoFilesProvided.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(
        AppError::UnsupportedMediaType {
            content_type: "image/gif".to_string()
        }
        .status_code(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        AppError::PayloadTooLarge { limit_mb: 10 }.status_code(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        AppError::TooManyFiles { limit: 50 }.status_code(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        AppError::UnexpectedField {
            field: "files".to_string()
        }
        .status_code(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        AppError::conversion("decode").status_code(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn test_error_messages_are_stable() {
    assert_eq!(AppError::NoFilesProvided.to_string(), "No images uploaded");
    assert_eq!(
        AppError::UnsupportedMediaType {
            content_type: "image/gif".to_string()
        }
        .to_string(),
        "Only .jpg, .jpeg, .png files are allowed"
    );
    assert_eq!(
        AppError::PayloadTooLarge { limit_mb: 10 }.to_string(),
        "File too large. Max 10MB per file"
    );
    assert_eq!(
        AppError::TooManyFiles { limit: 50 }.to_string(),
        "Too many files. Max 50"
    );
    assert_eq!(
        AppError::UnexpectedField {
            field: "files".to_string()
        }
        .to_string(),
        "Unexpected file field"
    );
    assert_eq!(
        AppError::conversion("internal detail").to_string(),
        "Failed to generate PDF"
    );
}

#[test]
fn test_fit_rect_exact_ratio_fills_page() {
    let (x, y, w, h) = fit_rect(100, 200, 50.0, 100.0);
    assert_eq!((x, y), (0.0, 0.0));
    assert_eq!((w, h), (50.0, 100.0));
}

#[test]
fn test_fit_rect_letterboxes_symmetrically() {
    // square image on a tall page: vertical letterbox, split evenly
    let (x, y, w, h) = fit_rect(100, 100, 50.0, 100.0);
    assert_eq!((w, h), (50.0, 50.0));
    assert_eq!(x, 0.0);
    assert_eq!(y, 25.0);

    // wide image on a square page: horizontal placement is full width
    let (x, y, w, h) = fit_rect(200, 100, 100.0, 100.0);
    assert_eq!((w, h), (100.0, 50.0));
    assert_eq!(x, 0.0);
    assert_eq!(y, 25.0);
}

#[test]
fn test_fit_rect_scales_up_small_images() {
    let (x, y, w, h) = fit_rect(10, 10, 100.0, 50.0);
    assert_eq!((w, h), (50.0, 50.0));
    assert_eq!((x, y), (25.0, 0.0));
}

#[test]
fn test_fit_rect_preserves_aspect_ratio() {
    let (_, _, w, h) = fit_rect(300, 200, 595.28, 841.89);
    let original = 300.0 / 200.0;
    let placed = w / h;
    assert!((original - placed).abs() < 1e-4);
}

#[test]
fn test_config_from_env() {
    use std::env;

    env::set_var("SERVER_HOST", "127.0.0.1");
    env::set_var("SERVER_PORT", "8099");
    env::set_var("MAX_FILE_SIZE_MB", "5");
    env::set_var("MAX_FILES", "12");

    let config = Config::from_env().unwrap();
    assert_eq!(config.server_host, "127.0.0.1");
    assert_eq!(config.server_port, 8099);
    assert_eq!(config.max_file_size_mb, 5);
    assert_eq!(config.max_files, 12);
    assert_eq!(config.max_file_bytes(), 5 * 1024 * 1024);
    assert!(config.max_body_bytes() > 12 * config.max_file_bytes());

    env::remove_var("SERVER_HOST");
    env::remove_var("SERVER_PORT");
    env::remove_var("MAX_FILE_SIZE_MB");
    env::remove_var("MAX_FILES");
}

#[test]
fn test_config_defaults() {
    let config = Config::default();
    assert_eq!(config.max_file_size_mb, 10);
    assert_eq!(config.max_files, 50);
    assert_eq!(config.server_port, 5000);
}

#[tokio::test]
async fn test_store_persist_sanitizes_and_uniquifies() {
    let tmp = tempfile::tempdir().unwrap();
    let store = TransientStore::new(&tmp.path().join("up"), &tmp.path().join("gen")).unwrap();

    let first = store
        .persist("my photo.png", ImageKind::Png, vec![1u8, 2, 3].into())
        .await
        .unwrap();
    let second = store
        .persist("my photo.png", ImageKind::Png, vec![4u8, 5].into())
        .await
        .unwrap();

    assert!(first.stored_name.ends_with("_my_photo.png"));
    assert_ne!(first.stored_name, second.stored_name);
    assert!(first.path.exists());
    assert!(second.path.exists());
    assert_eq!(first.size, 3);
}

#[tokio::test]
async fn test_store_neutralizes_path_segments() {
    let tmp = tempfile::tempdir().unwrap();
    let upload_dir = tmp.path().join("up");
    let store = TransientStore::new(&upload_dir, &tmp.path().join("gen")).unwrap();

    let image = store
        .persist("../../etc/passwd.png", ImageKind::Png, vec![0u8].into())
        .await
        .unwrap();

    assert_eq!(image.path.parent().unwrap(), upload_dir);
    assert!(image.path.exists());
}

#[test]
fn test_output_paths_are_unique() {
    let tmp = tempfile::tempdir().unwrap();
    let store = TransientStore::new(&tmp.path().join("up"), &tmp.path().join("gen")).unwrap();

    let mut paths: Vec<_> = (0..64).map(|_| store.allocate_output_path()).collect();
    let total = paths.len();
    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), total);

    let name = store.allocate_output_path();
    let name = name.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("output_") && name.ends_with(".pdf"));
}

#[test]
fn test_cleanup_guard_removes_tracked_files_once() {
    let tmp = tempfile::tempdir().unwrap();
    let store = TransientStore::new(&tmp.path().join("up"), &tmp.path().join("gen")).unwrap();

    let a = tmp.path().join("a.bin");
    let b = tmp.path().join("b.bin");
    std::fs::write(&a, b"a").unwrap();
    std::fs::write(&b, b"b").unwrap();

    let mut guard = CleanupGuard::new(store);
    guard.track(&a);
    guard.track(&b);
    assert_eq!(guard.tracked(), 2);

    guard.run();
    assert!(!a.exists());
    assert!(!b.exists());

    // second run (and the implicit run on drop) must be a no-op
    guard.run();
}

#[test]
fn test_cleanup_guard_fires_on_drop_and_tolerates_missing_files() {
    let tmp = tempfile::tempdir().unwrap();
    let store = TransientStore::new(&tmp.path().join("up"), &tmp.path().join("gen")).unwrap();

    let kept = tmp.path().join("kept.bin");
    std::fs::write(&kept, b"x").unwrap();

    {
        let mut guard = CleanupGuard::new(store);
        guard.track(&kept);
        guard.track(tmp.path().join("never-existed.bin"));
    }
    assert!(!kept.exists());
}

// -- document writer ---------------------------------------------------------

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageOutputFormat::Png)
        .unwrap();
    buf
}

fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([20, 90, 160]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageOutputFormat::Jpeg(85))
        .unwrap();
    buf
}

fn rgba_png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 128]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageOutputFormat::Png)
        .unwrap();
    buf
}

fn staged_image(dir: &std::path::Path, name: &str, kind: ImageKind, bytes: &[u8]) -> UploadedImage {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    UploadedImage {
        original_name: name.to_string(),
        stored_name: name.to_string(),
        path,
        kind,
        size: bytes.len(),
    }
}

fn page_image_info(doc: &Document, page_id: ObjectId) -> (i64, i64, String) {
    let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
    let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
    let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
    let (_, reference) = xobjects.iter().next().unwrap();
    let stream = match doc.get_object(reference.as_reference().unwrap()).unwrap() {
        Object::Stream(s) => s,
        other => panic!("expected image stream, got {:?}", other),
    };
    let width = stream.dict.get(b"Width").unwrap().as_i64().unwrap();
    let height = stream.dict.get(b"Height").unwrap().as_i64().unwrap();
    let filter = stream
        .dict
        .get(b"Filter")
        .unwrap()
        .as_name_str()
        .unwrap()
        .to_string();
    (width, height, filter)
}

#[test]
fn test_write_document_one_page_per_image_in_order() {
    let tmp = tempfile::tempdir().unwrap();
    let images = vec![
        staged_image(tmp.path(), "first.png", ImageKind::Png, &png_bytes(30, 40)),
        staged_image(tmp.path(), "second.jpg", ImageKind::Jpeg, &jpeg_bytes(60, 20)),
        staged_image(tmp.path(), "third.png", ImageKind::Png, &png_bytes(45, 45)),
    ];
    let out = tmp.path().join("out.pdf");

    let pages = DocumentWriter::new().write_document(&images, &out).unwrap();
    assert_eq!(pages, 3);

    let doc = Document::load(&out).unwrap();
    let page_ids: Vec<_> = doc.get_pages().into_values().collect();
    assert_eq!(page_ids.len(), 3);

    let widths: Vec<i64> = page_ids
        .iter()
        .map(|id| page_image_info(&doc, *id).0)
        .collect();
    assert_eq!(widths, vec![30, 60, 45]);
}

#[test]
fn test_write_document_uses_a4_media_box() {
    let tmp = tempfile::tempdir().unwrap();
    let images = vec![staged_image(
        tmp.path(),
        "only.png",
        ImageKind::Png,
        &png_bytes(10, 10),
    )];
    let out = tmp.path().join("out.pdf");
    DocumentWriter::new().write_document(&images, &out).unwrap();

    let doc = Document::load(&out).unwrap();
    let (_, page_id) = doc.get_pages().into_iter().next().unwrap();
    let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
    let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
    assert_eq!(media_box.len(), 4);
    match (&media_box[2], &media_box[3]) {
        (Object::Real(w), Object::Real(h)) => {
            assert!((w - 595.28).abs() < 0.01);
            assert!((h - 841.89).abs() < 0.01);
        }
        other => panic!("unexpected media box entries: {:?}", other),
    }
}

#[test]
fn test_write_document_passes_jpeg_bytes_through() {
    let tmp = tempfile::tempdir().unwrap();
    let images = vec![staged_image(
        tmp.path(),
        "photo.jpg",
        ImageKind::Jpeg,
        &jpeg_bytes(24, 24),
    )];
    let out = tmp.path().join("out.pdf");
    DocumentWriter::new().write_document(&images, &out).unwrap();

    let doc = Document::load(&out).unwrap();
    let (_, page_id) = doc.get_pages().into_iter().next().unwrap();
    let (_, _, filter) = page_image_info(&doc, page_id);
    assert_eq!(filter, "DCTDecode");
}

#[test]
fn test_write_document_preserves_png_alpha_as_soft_mask() {
    let tmp = tempfile::tempdir().unwrap();
    let images = vec![staged_image(
        tmp.path(),
        "overlay.png",
        ImageKind::Png,
        &rgba_png_bytes(16, 16),
    )];
    let out = tmp.path().join("out.pdf");
    DocumentWriter::new().write_document(&images, &out).unwrap();

    let doc = Document::load(&out).unwrap();
    let (_, page_id) = doc.get_pages().into_iter().next().unwrap();
    let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
    let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
    let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
    let (_, reference) = xobjects.iter().next().unwrap();
    let stream = match doc.get_object(reference.as_reference().unwrap()).unwrap() {
        Object::Stream(s) => s,
        other => panic!("expected image stream, got {:?}", other),
    };
    assert!(stream.dict.get(b"SMask").is_ok());
}

#[test]
fn test_write_document_rejects_undecodable_bytes() {
    let tmp = tempfile::tempdir().unwrap();
    let images = vec![staged_image(
        tmp.path(),
        "fake.png",
        ImageKind::Png,
        b"definitely not image data",
    )];
    let out = tmp.path().join("out.pdf");

    let err = DocumentWriter::new()
        .write_document(&images, &out)
        .unwrap_err();
    assert_eq!(err.error_code(), "CONVERSION_FAILED");
    assert_eq!(err.to_string(), "Failed to generate PDF");
    assert!(!out.exists());
}
