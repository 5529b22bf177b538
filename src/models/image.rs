//! An image received through a multipart form.

use bytes::Bytes;

/// Uploaded image content held in memory for the duration of one request.
#[derive(Clone, Debug)]
pub struct ImageUpload {
    /// File name as sent by the client. Used verbatim as the blob name.
    pub file_name: String,

    /// MIME type from the multipart part headers, if any.
    pub content_type: Option<String>,

    /// Raw file bytes.
    pub data: Bytes,
}

impl ImageUpload {
    /// MIME type to use when the client did not send one.
    pub fn content_type_or_default(&self) -> &str {
        self.content_type
            .as_deref()
            .unwrap_or("application/octet-stream")
    }
}
