//! Best-effort request body parsing for HTTP triggers.
//!
//! Bodies never fail an invocation: multipart that cannot be decoded and
//! JSON that does not parse both fall back to the raw bytes, leaving
//! validation to the handler.

use std::collections::BTreeMap;
use std::convert::Infallible;

use bytes::Bytes;
use http::header;
use serde_json::Value;

use crate::host::HostRequest;

/// Decoded body of an HTTP trigger.
#[derive(Debug, Clone, PartialEq)]
pub enum HttpInput {
    /// The request had no body
    Empty,
    /// The body parsed as JSON
    Json(Value),
    /// The body was `multipart/form-data`
    Form(FormData),
    /// The body could not be parsed; raw bytes are kept
    Raw(Bytes),
}

impl HttpInput {
    /// Returns the JSON value, if the body was JSON.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            HttpInput::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the form fields, if the body was multipart.
    pub fn as_form(&self) -> Option<&FormData> {
        match self {
            HttpInput::Form(form) => Some(form),
            _ => None,
        }
    }

    /// Returns the raw bytes, if the body could not be parsed.
    pub fn as_raw(&self) -> Option<&Bytes> {
        match self {
            HttpInput::Raw(raw) => Some(raw),
            _ => None,
        }
    }

    /// Returns true if the request carried no body.
    pub fn is_empty(&self) -> bool {
        matches!(self, HttpInput::Empty)
    }
}

/// Named fields of a multipart form.
///
/// When a name repeats, the last part wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormData {
    fields: BTreeMap<String, FormField>,
}

impl FormData {
    /// Creates an empty form.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a field, replacing any previous field with the same name.
    pub fn insert(&mut self, name: impl Into<String>, field: FormField) {
        self.fields.insert(name.into(), field);
    }

    /// Returns the field named `name`.
    pub fn get(&self, name: &str) -> Option<&FormField> {
        self.fields.get(name)
    }

    /// Returns the text value of `name`, if it is a text field.
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.fields.get(name)? {
            FormField::Text(text) => Some(text),
            FormField::File(_) => None,
        }
    }

    /// Returns the file part named `name`, if it is a file field.
    pub fn file(&self, name: &str) -> Option<&FilePart> {
        match self.fields.get(name)? {
            FormField::File(file) => Some(file),
            FormField::Text(_) => None,
        }
    }

    /// Iterates over all fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FormField)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the form has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// One part of a multipart form.
#[derive(Debug, Clone, PartialEq)]
pub enum FormField {
    /// A plain text field
    Text(String),
    /// An uploaded file
    File(FilePart),
}

/// An uploaded file with its retained metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct FilePart {
    /// Original file name sent by the client
    pub file_name: String,
    /// Declared content type of the part
    pub content_type: Option<String>,
    /// File contents
    pub data: Bytes,
}

#[derive(Debug, thiserror::Error)]
enum MultipartFailure {
    #[error("multipart body without a readable content type")]
    MissingContentType,
    #[error("malformed multipart body: {0}")]
    Malformed(#[from] multer::Error),
}

/// Parses the body of `req` into an [`HttpInput`].
///
/// `multipart/form-data` bodies are split into named fields, anything else
/// is tried as JSON. Failures fall back to [`HttpInput::Raw`].
pub async fn parse_body(req: &HostRequest) -> HttpInput {
    parse_body_with(req, true).await
}

/// Parses the body of `req`, decoding multipart forms only if `multipart`.
///
/// With `multipart` off, form bodies are kept as [`HttpInput::Raw`].
pub async fn parse_body_with(req: &HostRequest, multipart: bool) -> HttpInput {
    if req.body.is_empty() {
        return HttpInput::Empty;
    }

    let is_multipart = req
        .content_type()
        .is_some_and(|ct| ct.type_() == mime::MULTIPART && ct.subtype() == mime::FORM_DATA);

    if is_multipart && !multipart {
        return HttpInput::Raw(req.body.clone());
    }

    if is_multipart {
        return match parse_multipart(req).await {
            Ok(form) => HttpInput::Form(form),
            Err(e) => {
                tracing::debug!(error = %e, "multipart body could not be decoded, keeping raw body");
                HttpInput::Raw(req.body.clone())
            }
        };
    }

    match serde_json::from_slice(&req.body) {
        Ok(value) => HttpInput::Json(value),
        Err(e) => {
            tracing::debug!(error = %e, "body is not JSON, keeping raw body");
            HttpInput::Raw(req.body.clone())
        }
    }
}

async fn parse_multipart(req: &HostRequest) -> Result<FormData, MultipartFailure> {
    let content_type = req
        .header_str(header::CONTENT_TYPE)
        .ok_or(MultipartFailure::MissingContentType)?;
    let boundary = multer::parse_boundary(content_type)?;

    // The host hands over a fully buffered body, so no size constraint applies
    let body = req.body.clone();
    let stream = futures_util::stream::once(async move { Ok::<_, Infallible>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);
    let mut form = FormData::new();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(ToOwned::to_owned) else {
            continue;
        };

        match field.file_name().map(ToOwned::to_owned) {
            Some(file_name) => {
                let content_type = field.content_type().map(ToString::to_string);
                let data = field.bytes().await?;
                form.insert(
                    name,
                    FormField::File(FilePart {
                        file_name,
                        content_type,
                        data,
                    }),
                );
            }
            None => {
                let text = field.text().await?;
                form.insert(name, FormField::Text(text));
            }
        }
    }

    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{header, HeaderValue, Method};
    use serde_json::json;

    const BOUNDARY: &str = "X-BOUNDARY";

    fn multipart_request(body: &str) -> HostRequest {
        HostRequest::new(Method::POST, "/upload".parse().unwrap())
            .with_header(
                header::CONTENT_TYPE,
                HeaderValue::from_str(&format!("multipart/form-data; boundary={BOUNDARY}")).unwrap(),
            )
            .with_body(body.replace('\n', "\r\n"))
    }

    #[tokio::test]
    async fn empty_body_is_empty_input() {
        let input = parse_body(&HostRequest::default()).await;
        assert!(input.is_empty());
    }

    #[tokio::test]
    async fn json_body_is_parsed() {
        let req = HostRequest::default().with_json(&json!({"name": "foo", "count": 2}));
        let input = parse_body(&req).await;
        assert_eq!(input.as_json(), Some(&json!({"name": "foo", "count": 2})));
    }

    #[tokio::test]
    async fn json_without_content_type_is_still_parsed() {
        let req = HostRequest::default().with_body("[1,2,3]");
        assert_eq!(parse_body(&req).await, HttpInput::Json(json!([1, 2, 3])));
    }

    #[tokio::test]
    async fn invalid_json_falls_back_to_raw() {
        let req = HostRequest::default()
            .with_header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body("{not json");
        let input = parse_body(&req).await;
        assert_eq!(input.as_raw().map(|b| &b[..]), Some(&b"{not json"[..]));
    }

    #[tokio::test]
    async fn multipart_text_and_file_fields() {
        let body = format!(
            "--{BOUNDARY}\n\
Content-Disposition: form-data; name=\"name\"\n\
\n\
foo\n\
--{BOUNDARY}\n\
Content-Disposition: form-data; name=\"avatar\"; filename=\"me.png\"\n\
Content-Type: image/png\n\
\n\
PNGDATA\n\
--{BOUNDARY}--\n"
        );

        let input = parse_body(&multipart_request(&body)).await;
        let form = input.as_form().expect("multipart body");

        assert_eq!(form.len(), 2);
        assert_eq!(form.text("name"), Some("foo"));

        let file = form.file("avatar").expect("file field");
        assert_eq!(file.file_name, "me.png");
        assert_eq!(file.content_type.as_deref(), Some("image/png"));
        assert_eq!(&file.data[..], b"PNGDATA");
    }

    #[tokio::test]
    async fn repeated_field_keeps_last_value() {
        let body = format!(
            "--{BOUNDARY}\n\
Content-Disposition: form-data; name=\"tag\"\n\
\n\
first\n\
--{BOUNDARY}\n\
Content-Disposition: form-data; name=\"tag\"\n\
\n\
second\n\
--{BOUNDARY}--\n"
        );

        let input = parse_body(&multipart_request(&body)).await;
        assert_eq!(input.as_form().unwrap().text("tag"), Some("second"));
    }

    #[tokio::test]
    async fn multipart_disabled_keeps_raw_body() {
        let body = format!(
            "--{BOUNDARY}\n\
Content-Disposition: form-data; name=\"name\"\n\
\n\
foo\n\
--{BOUNDARY}--\n"
        );

        let input = parse_body_with(&multipart_request(&body), false).await;
        assert!(input.as_raw().is_some());
    }

    #[tokio::test]
    async fn large_file_part_is_decoded() {
        let payload = vec![b'x'; 3 * 1024 * 1024];
        let mut body = format!(
            "--{BOUNDARY}\r\n\
Content-Disposition: form-data; name=\"name\"\r\n\
\r\n\
foo\r\n\
--{BOUNDARY}\r\n\
Content-Disposition: form-data; name=\"blob\"; filename=\"big.bin\"\r\n\
Content-Type: application/octet-stream\r\n\
\r\n"
        )
        .into_bytes();
        body.extend_from_slice(&payload);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        let req = HostRequest::new(Method::POST, "/upload".parse().unwrap())
            .with_header(
                header::CONTENT_TYPE,
                HeaderValue::from_str(&format!("multipart/form-data; boundary={BOUNDARY}")).unwrap(),
            )
            .with_body(body);

        let input = parse_body(&req).await;
        let form = input.as_form().expect("large upload decoded as form");

        assert_eq!(form.text("name"), Some("foo"));
        let file = form.file("blob").expect("file field");
        assert_eq!(file.file_name, "big.bin");
        assert_eq!(file.data.len(), payload.len());
    }

    #[tokio::test]
    async fn malformed_multipart_falls_back_to_raw() {
        let req = HostRequest::default()
            .with_header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("multipart/form-data"),
            )
            .with_body("garbage");

        let input = parse_body(&req).await;
        assert!(input.as_raw().is_some());
    }
}
