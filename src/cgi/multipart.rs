//! `multipart/form-data` bodies for requests carrying uploads

use crate::cgi::RequestBody;

use uuid::Uuid;

/// Builds a `multipart/form-data` body one part at a time
pub struct Multipart {
    boundary: String,
    data: Vec<u8>,
}

impl Multipart {
    /// Starts a body with a fresh random boundary.
    pub fn new() -> Multipart {
        Multipart::with_boundary(format!("------------------------{}", Uuid::new_v4().simple()))
    }

    pub fn with_boundary<B: Into<String>>(boundary: B) -> Multipart {
        Multipart {
            boundary: boundary.into(),
            data: Vec::new(),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Adds a plain form field.
    pub fn field(&mut self, name: &str, value: &str) {
        self.open_part();
        self.line(&format!("Content-Disposition: form-data; name=\"{}\"", quote(name)));
        self.line("");
        self.data.extend_from_slice(value.as_bytes());
        self.line("");
    }

    /// Adds a file part.
    pub fn file(&mut self, field: &str, filename: &str, content_type: &str, contents: &[u8]) {
        self.open_part();
        self.line(&format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"",
            quote(field),
            quote(filename)
        ));
        self.line(&format!("Content-Type: {}", content_type));
        self.line("");
        self.data.extend_from_slice(contents);
        self.line("");
    }

    /// Writes the closing delimiter.
    pub fn finish(mut self) -> RequestBody {
        let closing = format!("--{}--", self.boundary);
        self.line(&closing);

        RequestBody::Multipart {
            boundary: self.boundary,
            data: self.data,
        }
    }

    fn open_part(&mut self) {
        let delimiter = format!("--{}", self.boundary);
        self.line(&delimiter);
    }

    fn line(&mut self, line: &str) {
        self.data.extend_from_slice(line.as_bytes());
        self.data.extend_from_slice(b"\r\n");
    }
}

impl Default for Multipart {
    fn default() -> Multipart {
        Multipart::new()
    }
}

/// Escapes a name for use inside a quoted header parameter, the way browsers
/// do.
fn quote(name: &str) -> String {
    name.replace('"', "%22").replace('\r', "%0D").replace('\n', "%0A")
}
