//! Decoding of `multipart/form-data` request bodies.
//!
//! Every part of the form is collected into a field map keyed by field name.
//! A repeated field name appends to the field's part list, it never
//! overwrites. The resolved map rides on the request [`Context`] so the
//! execution engine can reach uploaded files.
//!
//! [`Context`]: crate::Context

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::HeaderMap;
use mediatype::names::BOUNDARY;
use mediatype::names::FORM_DATA;
use mediatype::names::MULTIPART;
use mediatype::MediaType;
use mediatype::ReadParams;
use multer::Multipart;
use multimap::MultiMap;

use crate::services::endpoint::Body;

/// All parts of one multipart request, keyed by field name in arrival order.
pub type FileMap = MultiMap<String, UploadedPart>;

/// One decoded part of a `multipart/form-data` request.
#[derive(Clone, Debug)]
pub struct UploadedPart {
    name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    data: Bytes,
}

impl UploadedPart {
    /// The form field name this part was sent under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The client-supplied file name, if any.
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// The part's declared content type, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// The part's content.
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    #[cfg(test)]
    pub(crate) fn for_tests(name: &str, data: &'static [u8]) -> Self {
        Self {
            name: name.to_string(),
            file_name: None,
            content_type: None,
            data: Bytes::from_static(data),
        }
    }
}

/// Extract the multipart boundary if the headers declare a
/// `multipart/form-data` content type.
pub(crate) fn form_data_boundary(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CONTENT_TYPE)
        .and_then(|header| header.to_str().ok())
        .and_then(|value| MediaType::parse(value).ok())
        .filter(|mime| mime.ty == MULTIPART && mime.subty == FORM_DATA)
        .and_then(|mime| mime.get_param(BOUNDARY).map(|b| b.to_string()))
}

/// Read every part of the body into a [`FileMap`].
///
/// Unnamed parts cannot be addressed by any resolution rule and are dropped.
pub(crate) async fn collect_parts(body: Body, boundary: String) -> Result<FileMap, multer::Error> {
    let mut multipart = Multipart::new(body.into_data_stream(), boundary);
    let mut parts = FileMap::new();

    while let Some(field) = multipart.next_field().await? {
        let name = match field.name() {
            Some(name) => name.to_string(),
            None => {
                tracing::debug!("dropping multipart part with no field name");
                continue;
            }
        };
        let file_name = field.file_name().map(|f| f.to_string());
        let content_type = field.content_type().map(|mime| mime.to_string());
        let data = field.bytes().await?;
        parts.insert(
            name.clone(),
            UploadedPart {
                name,
                file_name,
                content_type,
                data,
            },
        );
    }

    Ok(parts)
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;

    fn multipart_body(boundary: &str, fields: &[(&str, &str)]) -> Body {
        let mut body = String::new();
        for (name, value) in fields {
            body.push_str(&format!(
                "--{boundary}\r\ncontent-disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        body.push_str(&format!("--{boundary}--\r\n"));
        Body::from(body)
    }

    #[test]
    fn boundary_is_extracted_from_form_data() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("multipart/form-data; boundary=----abc123"),
        );
        assert_eq!(form_data_boundary(&headers).as_deref(), Some("----abc123"));
    }

    #[test]
    fn non_multipart_content_types_have_no_boundary() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        assert_eq!(form_data_boundary(&headers), None);
        assert_eq!(form_data_boundary(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn parts_are_collected_by_field_name() {
        let body = multipart_body(
            "xyz",
            &[("query", "{ping}"), ("operationName", "Ping")],
        );
        let parts = collect_parts(body, "xyz".to_string()).await.unwrap();

        assert_eq!(parts.get("query").unwrap().bytes().as_ref(), b"{ping}");
        assert_eq!(parts.get("operationName").unwrap().bytes().as_ref(), b"Ping");
    }

    #[tokio::test]
    async fn file_parts_keep_their_metadata() {
        let boundary = "xyz";
        let payload = format!(
            "--{boundary}\r\n\
             content-disposition: form-data; name=\"file1\"; filename=\"notes.txt\"\r\n\
             content-type: text/plain\r\n\r\n\
             hello\r\n\
             --{boundary}--\r\n"
        );
        let parts = collect_parts(Body::from(payload), boundary.to_string())
            .await
            .unwrap();

        let part = parts.get("file1").unwrap();
        assert_eq!(part.name(), "file1");
        assert_eq!(part.file_name(), Some("notes.txt"));
        assert_eq!(part.content_type(), Some("text/plain"));
        assert_eq!(part.bytes().as_ref(), b"hello");
    }

    #[tokio::test]
    async fn repeated_fields_append_in_order() {
        let body = multipart_body("xyz", &[("file", "first"), ("file", "second")]);
        let parts = collect_parts(body, "xyz".to_string()).await.unwrap();

        let files = parts.get_vec("file").unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].bytes().as_ref(), b"first");
        assert_eq!(files[1].bytes().as_ref(), b"second");
        // single-value lookup reads the first part
        assert_eq!(parts.get("file").unwrap().bytes().as_ref(), b"first");
    }
}
