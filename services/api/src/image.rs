//! Base64 image uploads and media storage
//!
//! Clients send images as data URIs (`data:image/png;base64,...`). They are
//! decoded here and written under the media root with a random file name.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use tracing::{debug, warn};
use uuid::Uuid;

/// Subdirectory for recipe images
pub const RECIPE_IMAGE_DIR: &str = "recipes/images";
/// Subdirectory for user avatars
pub const AVATAR_DIR: &str = "users";

/// Image decoded from a data URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    /// File extension matching the MIME subtype
    pub extension: &'static str,
    pub bytes: Vec<u8>,
}

/// Why a data URI was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImageError {
    #[error("Expected a data URI of the form data:image/<type>;base64,<payload>.")]
    Malformed,
    #[error("Unsupported image type: {0}.")]
    UnsupportedType(String),
    #[error("Image payload is not valid base64.")]
    InvalidBase64,
    #[error("Image is empty.")]
    Empty,
}

fn extension_for(subtype: &str) -> Option<&'static str> {
    match subtype.to_ascii_lowercase().as_str() {
        "png" => Some("png"),
        "jpeg" | "jpg" => Some("jpg"),
        "gif" => Some("gif"),
        "webp" => Some("webp"),
        _ => None,
    }
}

/// Decode a `data:image/<type>;base64,<payload>` string
pub fn decode_data_uri(value: &str) -> Result<DecodedImage, ImageError> {
    let rest = value
        .trim()
        .strip_prefix("data:")
        .ok_or(ImageError::Malformed)?;
    let (header, payload) = rest.split_once(',').ok_or(ImageError::Malformed)?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or(ImageError::Malformed)?;
    let subtype = mime
        .strip_prefix("image/")
        .ok_or_else(|| ImageError::UnsupportedType(mime.to_string()))?;
    let extension =
        extension_for(subtype).ok_or_else(|| ImageError::UnsupportedType(mime.to_string()))?;

    let bytes = BASE64
        .decode(payload.trim())
        .map_err(|_| ImageError::InvalidBase64)?;
    if bytes.is_empty() {
        return Err(ImageError::Empty);
    }

    Ok(DecodedImage { extension, bytes })
}

/// Writes uploaded files under the media root and builds their public URLs
#[derive(Debug, Clone)]
pub struct MediaStore {
    inner: Arc<MediaStoreInner>,
}

#[derive(Debug)]
struct MediaStoreInner {
    root: PathBuf,
    base_url: String,
}

impl MediaStore {
    /// `public_url` is the site origin; files are served below `/media/`
    pub fn new(root: impl Into<PathBuf>, public_url: &str) -> Self {
        Self {
            inner: Arc::new(MediaStoreInner {
                root: root.into(),
                base_url: format!("{}/media", public_url.trim_end_matches('/')),
            }),
        }
    }

    /// Absolute URL for a stored relative path
    pub fn url(&self, relative: &str) -> String {
        format!("{}/{}", self.inner.base_url, relative.trim_start_matches('/'))
    }

    /// Store an image in `dir` and return its path relative to the media root
    pub async fn save(&self, dir: &str, image: &DecodedImage) -> Result<String> {
        let relative = format!("{}/{}.{}", dir, Uuid::new_v4(), image.extension);
        let path = self.inner.root.join(&relative);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&path, &image.bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        debug!("Stored {} bytes at {}", image.bytes.len(), relative);
        Ok(relative)
    }

    /// Remove a stored file; failures are logged, not returned
    pub async fn remove(&self, relative: &str) {
        // never follow paths outside the media root
        if relative.contains("..") || Path::new(relative).is_absolute() {
            warn!("Refusing to remove suspicious media path {}", relative);
            return;
        }
        let path = self.inner.root.join(relative);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!("Failed to remove media file {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1x1 transparent PNG
    const PIXEL: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    #[test]
    fn test_decode_png() {
        let image = decode_data_uri(&format!("data:image/png;base64,{}", PIXEL)).unwrap();
        assert_eq!(image.extension, "png");
        assert_eq!(&image.bytes[1..4], b"PNG");
    }

    #[test]
    fn test_jpeg_maps_to_jpg() {
        let image = decode_data_uri(&format!("data:image/jpeg;base64,{}", PIXEL)).unwrap();
        assert_eq!(image.extension, "jpg");
    }

    #[test]
    fn test_rejects_non_image_mime() {
        assert_eq!(
            decode_data_uri("data:text/plain;base64,aGVsbG8="),
            Err(ImageError::UnsupportedType("text/plain".to_string()))
        );
        assert!(matches!(
            decode_data_uri("data:image/tiff;base64,aGVsbG8="),
            Err(ImageError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_rejects_malformed_input() {
        assert_eq!(decode_data_uri(PIXEL), Err(ImageError::Malformed));
        assert_eq!(
            decode_data_uri("data:image/png,raw"),
            Err(ImageError::Malformed)
        );
        assert_eq!(
            decode_data_uri("data:image/png;base64,@@@"),
            Err(ImageError::InvalidBase64)
        );
        assert_eq!(
            decode_data_uri("data:image/png;base64,"),
            Err(ImageError::Empty)
        );
    }

    #[test]
    fn test_url_building() {
        let store = MediaStore::new("media", "https://foodgram.example/");
        assert_eq!(
            store.url("recipes/images/a.png"),
            "https://foodgram.example/media/recipes/images/a.png"
        );
    }

    #[tokio::test]
    async fn test_save_and_remove() {
        let root = std::env::temp_dir().join(format!("foodgram-media-{}", Uuid::new_v4()));
        let store = MediaStore::new(&root, "http://localhost");
        let image = decode_data_uri(&format!("data:image/png;base64,{}", PIXEL)).unwrap();

        let relative = store.save(AVATAR_DIR, &image).await.unwrap();
        assert!(relative.starts_with("users/"));
        assert!(relative.ends_with(".png"));
        let written = tokio::fs::read(root.join(&relative)).await.unwrap();
        assert_eq!(written, image.bytes);

        store.remove(&relative).await;
        assert!(!root.join(&relative).exists());

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }
}
