//! `multipart/form-data` bodies for multipart POST requests.

use uuid::Uuid;

/// One field of a multipart body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Part {
    name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    data: Vec<u8>,
}

impl Part {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// A multipart body under construction.
///
/// Handed to the body-construction callback of a multipart POST after the
/// request parameters were appended as text fields.
#[derive(Clone, Debug)]
pub struct MultipartFormData {
    boundary: String,
    parts: Vec<Part>,
}

impl Default for MultipartFormData {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartFormData {
    pub fn new() -> Self {
        Self::with_boundary(format!("Boundary+{}", Uuid::new_v4().simple()))
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            parts: Vec::new(),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn append_text(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.append(name.into(), None, None, value.into().into_bytes())
    }

    pub fn append_bytes(&mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> &mut Self {
        self.append(name.into(), None, None, data.into())
    }

    pub fn append_file(
        &mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> &mut Self {
        self.append(
            name.into(),
            Some(file_name.into()),
            Some(content_type.into()),
            data.into(),
        )
    }

    fn append(
        &mut self,
        name: String,
        file_name: Option<String>,
        content_type: Option<String>,
        data: Vec<u8>,
    ) -> &mut Self {
        self.parts.push(Part {
            name,
            file_name,
            content_type,
            data,
        });
        self
    }

    /// Value of the `Content-Type` header matching [`encode`](Self::encode).
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();

        for part in &self.parts {
            body.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());

            let mut disposition = format!("form-data; name=\"{}\"", escape(&part.name));
            if let Some(file_name) = &part.file_name {
                disposition.push_str(&format!("; filename=\"{}\"", escape(file_name)));
            }
            body.extend_from_slice(format!("Content-Disposition: {disposition}\r\n").as_bytes());

            if let Some(content_type) = &part.content_type {
                body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
            }

            body.extend_from_slice(b"\r\n");
            body.extend_from_slice(&part.data);
            body.extend_from_slice(b"\r\n");
        }

        body.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        body
    }
}

// Quoted-string values in Content-Disposition.
fn escape(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
