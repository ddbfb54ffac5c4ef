//! Fixtures shared by the unit tests

use uuid::Uuid;

use std::fs;
use std::path::{Path, PathBuf};

/// A throwaway document root under the system temp directory, removed on
/// drop.
pub struct DocumentRoot {
    path: PathBuf,
}

impl DocumentRoot {
    /// Creates the root with an empty file for each of `scripts`.
    pub fn with_scripts(scripts: &[&str]) -> DocumentRoot {
        let path = std::env::temp_dir().join(format!("fcgi-http-kernel-{}", Uuid::new_v4().simple()));
        fs::create_dir_all(&path).unwrap();

        for script in scripts {
            let file = path.join(script);
            if let Some(parent) = file.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(file, b"<?php\n").unwrap();
        }

        DocumentRoot { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DocumentRoot {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

/// Splits a multipart body into (headers, content) pairs
pub fn parts<'a>(body: &'a [u8], boundary: &str) -> Vec<(String, &'a [u8])> {
    let delimiter = format!("--{}\r\n", boundary);
    let mut found = Vec::new();
    let mut rest = body;

    while rest.starts_with(delimiter.as_bytes()) {
        rest = &rest[delimiter.len()..];
        let head_end = rest.windows(4).position(|w| w == b"\r\n\r\n").unwrap();
        let head = String::from_utf8(rest[..head_end].to_vec()).unwrap();
        rest = &rest[head_end + 4..];

        let next = format!("\r\n--{}", boundary);
        let content_end = rest.windows(next.len()).position(|w| w == next.as_bytes()).unwrap();
        found.push((head, &rest[..content_end]));
        rest = &rest[content_end + 2..];
    }

    assert_eq!(rest, format!("--{}--\r\n", boundary).as_bytes());
    found
}
