//! Uploaded image storage
//!
//! Images live under `upload_dir/<folder>/<uuid>.<ext>`; the database keeps the
//! relative part and `/uploads` serves it.

use axum::extract::multipart::{Multipart, MultipartError};
use axum::http::StatusCode;
use axum::body::Bytes;
use std::collections::HashMap;
use std::path::{Component, Path};

use crate::error::{AppError, AppResult};

pub const PHOTO_FOLDER: &str = "photos";
pub const TEMPLATE_FOLDER: &str = "templates";

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// A file part of a multipart form
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Text fields and files of a multipart form
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("upload exceeds the size limit".to_string())
    } else {
        AppError::BadRequest(format!("invalid multipart body: {}", e.body_text()))
    }
}

impl FormData {
    /// Drain the whole form; empty file parts are ignored
    pub async fn read(multipart: &mut Multipart) -> AppResult<Self> {
        let mut form = FormData::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or("").to_string();
            if name.is_empty() {
                continue;
            }
            tracing::debug!("Parsing field: {}", name);

            match field.file_name().map(|s| s.to_string()) {
                Some(file_name) => {
                    let content_type = field.content_type().map(|s| s.to_string());
                    let bytes = field.bytes().await.map_err(multipart_error)?;
                    if bytes.is_empty() {
                        continue;
                    }
                    form.files.insert(
                        name,
                        UploadedFile {
                            file_name,
                            content_type,
                            bytes,
                        },
                    );
                }
                None => {
                    let text = field.text().await.map_err(multipart_error)?;
                    form.fields.insert(name, text);
                }
            }
        }

        Ok(form)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|s| s.as_str())
    }

    /// Text field parsed into `T`, 400 on malformed input
    pub fn parse<T: std::str::FromStr>(&self, name: &str) -> AppResult<Option<T>> {
        match self.text(name).map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => raw
                .parse::<T>()
                .map(Some)
                .map_err(|_| AppError::Validation(format!("{} is malformed", name))),
            None => Ok(None),
        }
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }
}

/// File extension for an accepted image, from its name or content type
pub fn image_extension(file: &UploadedFile) -> AppResult<&'static str> {
    let from_name = Path::new(&file.file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    if let Some(ext) = from_name {
        if let Some(known) = IMAGE_EXTENSIONS.iter().find(|k| **k == ext) {
            return Ok(*known);
        }
    }

    match file.content_type.as_deref() {
        Some("image/png") => Ok("png"),
        Some("image/jpeg") => Ok("jpg"),
        Some("image/webp") => Ok("webp"),
        _ => Err(AppError::Validation(
            "only png, jpg, jpeg and webp images are accepted".to_string(),
        )),
    }
}

/// Write an image under `folder` and return its relative path
pub async fn save_image(upload_dir: &Path, folder: &str, file: &UploadedFile) -> AppResult<String> {
    let ext = image_extension(file)?;
    let dir = upload_dir.join(folder);
    tokio::fs::create_dir_all(&dir).await.map_err(|e| {
        tracing::error!("Failed to create upload directory {:?}: {}", dir, e);
        AppError::Io(e)
    })?;

    let name = format!("{}.{}", uuid::Uuid::new_v4(), ext);
    tokio::fs::write(dir.join(&name), &file.bytes).await?;
    tracing::debug!("Saved {} bytes to {}/{}", file.bytes.len(), folder, name);

    Ok(format!("{}/{}", folder, name))
}

fn is_safe_relative(relative: &str) -> bool {
    let path = Path::new(relative);
    !relative.is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)))
}

/// Best-effort removal of a previously stored upload
pub async fn remove_file(upload_dir: &Path, relative: &str) {
    if !is_safe_relative(relative) {
        tracing::warn!("Refusing to remove unsafe upload path: {}", relative);
        return;
    }
    match tokio::fs::remove_file(upload_dir.join(relative)).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove upload {}: {}", relative, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: &str, content_type: Option<&str>) -> UploadedFile {
        UploadedFile {
            file_name: name.to_string(),
            content_type: content_type.map(|s| s.to_string()),
            bytes: Bytes::from_static(b"\x89PNG"),
        }
    }

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension(&upload("Front.PNG", None)).unwrap(), "png");
        assert_eq!(image_extension(&upload("blob", Some("image/jpeg"))).unwrap(), "jpg");
        assert!(image_extension(&upload("doc.pdf", Some("application/pdf"))).is_err());
    }

    #[test]
    fn test_safe_relative() {
        assert!(is_safe_relative("photos/a.png"));
        assert!(!is_safe_relative("../etc/passwd"));
        assert!(!is_safe_relative("/etc/passwd"));
        assert!(!is_safe_relative(""));
    }

    #[tokio::test]
    async fn test_save_and_remove() {
        let dir = std::env::temp_dir().join(format!("idcard-hub-storage-{}", uuid::Uuid::new_v4()));
        let relative = save_image(&dir, PHOTO_FOLDER, &upload("me.webp", None)).await.unwrap();
        assert!(relative.starts_with("photos/"));
        assert!(relative.ends_with(".webp"));
        assert!(dir.join(&relative).exists());

        remove_file(&dir, &relative).await;
        assert!(!dir.join(&relative).exists());
        // second removal is a no-op
        remove_file(&dir, &relative).await;

        let _ = std::fs::remove_dir_all(&dir);
    }
}
