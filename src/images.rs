use anyhow::Context;
use base64ct::{Base64, Encoding};
use bytes::Bytes;
use uuid::Uuid;

use crate::state::AppState;

/// Lifetime of presigned image URLs handed out in recipe responses.
pub const IMAGE_URL_TTL_SECS: u64 = 30 * 60;

const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// A decoded `data:image/...;base64,` upload.
#[derive(Debug, PartialEq, Eq)]
pub struct ImageUpload {
    pub body: Bytes,
    pub content_type: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ImageError {
    #[error("image must be a base64 data URL")]
    NotDataUrl,
    #[error("unsupported image type {0}")]
    UnsupportedType(String),
    #[error("image is not valid base64")]
    BadEncoding,
    #[error("image is empty or larger than {MAX_IMAGE_BYTES} bytes")]
    BadSize,
}

/// Parses `data:image/png;base64,iVBOR...`.
pub fn parse_data_url(data_url: &str) -> Result<ImageUpload, ImageError> {
    let rest = data_url.strip_prefix("data:").ok_or(ImageError::NotDataUrl)?;
    let (meta, payload) = rest.split_once(',').ok_or(ImageError::NotDataUrl)?;
    let content_type = meta
        .strip_suffix(";base64")
        .ok_or(ImageError::NotDataUrl)?
        .to_ascii_lowercase();
    if ext_from_mime(&content_type).is_none() {
        return Err(ImageError::UnsupportedType(content_type));
    }

    let payload: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let body = Base64::decode_vec(&payload).map_err(|_| ImageError::BadEncoding)?;
    if body.is_empty() || body.len() > MAX_IMAGE_BYTES {
        return Err(ImageError::BadSize);
    }
    Ok(ImageUpload {
        body: Bytes::from(body),
        content_type,
    })
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

/// Stores the image under a fresh key and returns that key.
pub async fn upload_recipe_image(
    st: &AppState,
    author_id: Uuid,
    image: ImageUpload,
) -> anyhow::Result<String> {
    let ext = ext_from_mime(&image.content_type).unwrap_or("bin");
    let key = format!("recipes/{}/{}.{}", author_id, Uuid::new_v4(), ext);
    st.storage
        .put_object(&key, image.body, &image.content_type)
        .await
        .with_context(|| format!("upload recipe image {key}"))?;
    Ok(key)
}

pub async fn presign(st: &AppState, key: &str) -> anyhow::Result<String> {
    st.storage
        .presign_get(key, IMAGE_URL_TTL_SECS)
        .await
        .with_context(|| format!("presign url for {key}"))
}

/// Best effort: a leftover object is not worth failing the request over.
pub async fn remove(st: &AppState, key: &str) {
    if let Err(e) = st.storage.delete_object(key).await {
        tracing::warn!(error = %e, key, "failed to delete recipe image");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
    }

    #[test]
    fn parses_png_data_url() {
        // "hello" in base64
        let img = parse_data_url("data:image/PNG;base64,aGVs\nbG8=").unwrap();
        assert_eq!(img.content_type, "image/png");
        assert_eq!(&img.body[..], b"hello");
    }

    #[test]
    fn rejects_malformed_data_urls() {
        assert_eq!(parse_data_url("aGVsbG8="), Err(ImageError::NotDataUrl));
        assert_eq!(parse_data_url("data:image/png,aGVsbG8="), Err(ImageError::NotDataUrl));
        assert_eq!(
            parse_data_url("data:text/html;base64,aGVsbG8="),
            Err(ImageError::UnsupportedType("text/html".into()))
        );
        assert_eq!(parse_data_url("data:image/png;base64,!!!"), Err(ImageError::BadEncoding));
        assert_eq!(parse_data_url("data:image/png;base64,"), Err(ImageError::BadSize));
    }

    #[tokio::test]
    async fn upload_and_presign_use_object_store() {
        let state = AppState::fake();
        let author = Uuid::new_v4();
        let key = upload_recipe_image(&state, author, parse_data_url("data:image/jpeg;base64,aGVsbG8=").unwrap())
            .await
            .unwrap();
        assert!(key.starts_with(&format!("recipes/{author}/")));
        assert!(key.ends_with(".jpg"));

        let url = presign(&state, &key).await.unwrap();
        assert!(url.contains(&key));
        remove(&state, &key).await;
    }
}
