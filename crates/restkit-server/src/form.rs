//! Request body decoding
//!
//! Bodies are decoded according to their `Content-Type`:
//!
//! - `application/json` through serde_json
//! - `application/x-www-form-urlencoded` through serde_urlencoded
//! - `multipart/form-data` through multer, with text fields decoded like
//!   urlencoded pairs and file fields exposed through [`form_file`]
//!
//! Anything else is rejected with [`FormError::InvalidContentType`].

use axum::body::Bytes;
use axum::http::{header, HeaderMap};
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormError {
    #[error("Invalid content type")]
    InvalidContentType,

    #[error("Missing multipart boundary")]
    MissingBoundary,

    #[error("Invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid form body: {0}")]
    Urlencoded(#[from] serde_urlencoded::de::Error),

    #[error("Invalid multipart body: {0}")]
    Multipart(#[from] multer::Error),

    #[error("Multipart field '{field}' is not valid UTF-8")]
    InvalidUtf8 { field: String },
}

/// File part of a multipart body
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    pub field: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl UploadedFile {
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    Urlencoded,
    Multipart,
}

fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::CONTENT_TYPE)?.to_str().ok()
}

fn body_kind(headers: &HeaderMap) -> Result<BodyKind, FormError> {
    let raw = content_type(headers).ok_or(FormError::InvalidContentType)?;
    let essence = raw.split(';').next().unwrap_or_default().trim();

    if essence.eq_ignore_ascii_case("application/json") {
        Ok(BodyKind::Json)
    } else if essence.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
        Ok(BodyKind::Urlencoded)
    } else if essence.eq_ignore_ascii_case("multipart/form-data") {
        Ok(BodyKind::Multipart)
    } else {
        Err(FormError::InvalidContentType)
    }
}

/// Decode the body into `T`
pub async fn form<T: DeserializeOwned>(headers: &HeaderMap, body: &Bytes) -> Result<T, FormError> {
    match body_kind(headers)? {
        BodyKind::Json => Ok(serde_json::from_slice(body)?),
        BodyKind::Urlencoded => Ok(serde_urlencoded::from_bytes(body)?),
        BodyKind::Multipart => {
            let parts = MultipartBody::read(headers, body.clone()).await?;
            // Text fields go through the urlencoded deserializer so numbers and
            // booleans parse the same way as in a plain form post.
            let encoded = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(parts.fields.iter())
                .finish();
            Ok(serde_urlencoded::from_str(&encoded)?)
        },
    }
}

/// All values posted under `key`, in body order
pub async fn post_form_values(
    headers: &HeaderMap,
    body: &Bytes,
    key: &str,
) -> Result<Vec<String>, FormError> {
    let pairs = match body_kind(headers)? {
        BodyKind::Urlencoded => url::form_urlencoded::parse(body)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect::<Vec<_>>(),
        BodyKind::Multipart => MultipartBody::read(headers, body.clone()).await?.fields,
        BodyKind::Json => return Err(FormError::InvalidContentType),
    };

    Ok(pairs
        .into_iter()
        .filter(|(k, _)| k == key)
        .map(|(_, v)| v)
        .collect())
}

/// First value posted under `key`
pub async fn post_form_value(
    headers: &HeaderMap,
    body: &Bytes,
    key: &str,
) -> Result<Option<String>, FormError> {
    Ok(post_form_values(headers, body, key).await?.into_iter().next())
}

/// First file uploaded under `field`
pub async fn form_file(
    headers: &HeaderMap,
    body: &Bytes,
    field: &str,
) -> Result<Option<UploadedFile>, FormError> {
    if body_kind(headers)? != BodyKind::Multipart {
        return Err(FormError::InvalidContentType);
    }
    let parts = MultipartBody::read(headers, body.clone()).await?;
    Ok(parts.files.into_iter().find(|f| f.field == field))
}

struct MultipartBody {
    fields: Vec<(String, String)>,
    files: Vec<UploadedFile>,
}

impl MultipartBody {
    async fn read(headers: &HeaderMap, body: Bytes) -> Result<Self, FormError> {
        let content_type = content_type(headers).ok_or(FormError::InvalidContentType)?;
        let boundary =
            multer::parse_boundary(content_type).map_err(|_| FormError::MissingBoundary)?;

        let stream = futures::stream::once(async move { Ok::<_, std::io::Error>(body) });
        let mut multipart = multer::Multipart::new(stream, boundary);

        let mut fields = Vec::new();
        let mut files = Vec::new();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(str::to_owned);
            let part_type = field.content_type().map(|m| m.to_string());
            let data = field.bytes().await?;

            match file_name {
                Some(file_name) => files.push(UploadedFile {
                    field: name,
                    file_name,
                    content_type: part_type,
                    data,
                }),
                None => match String::from_utf8(data.to_vec()) {
                    Ok(text) => fields.push((name, text)),
                    Err(_) => return Err(FormError::InvalidUtf8 { field: name }),
                },
            }
        }

        Ok(Self { fields, files })
    }
}
