use serde::Deserialize;

use crate::transport::Payload;

/// Extension handling for files written by the output cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum ExtensionPolicy {
    /// Infer from content (binary) or use `.xml` (documents).
    #[default]
    Auto,
    None,
    /// Always this extension, without the leading dot.
    Fixed(String),
}

impl From<String> for ExtensionPolicy {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => ExtensionPolicy::Auto,
            "none" => ExtensionPolicy::None,
            _ => ExtensionPolicy::Fixed(value.trim().trim_start_matches('.').to_string()),
        }
    }
}

/// Leading byte signatures and the extension they imply.
const MAGIC_NUMBERS: &[(&[u8], &str)] = &[
    (b"%PDF", "pdf"),
    (b"\x89PNG\r\n\x1a\n", "png"),
    (b"\xFF\xD8\xFF", "jpg"),
    (b"GIF87a", "gif"),
    (b"GIF89a", "gif"),
    (b"II*\x00", "tif"),
    (b"MM\x00*", "tif"),
    (b"PK\x03\x04", "zip"),
    (b"<?xml", "xml"),
    (b"BM", "bmp"),
];

pub fn sniff_extension(data: &[u8]) -> Option<&'static str> {
    MAGIC_NUMBERS
        .iter()
        .find(|(magic, _)| data.starts_with(magic))
        .map(|(_, ext)| *ext)
}

/// Keeps a service-supplied name inside the destination folder.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect();

    match cleaned.trim_start_matches('.') {
        "" => "message".to_string(),
        rest => rest.to_string(),
    }
}

fn with_extension(stem: String, ext: Option<&str>) -> String {
    match ext {
        Some(ext) if !ext.is_empty() => {
            let suffix = format!(".{}", ext);
            if stem.to_ascii_lowercase().ends_with(&suffix.to_ascii_lowercase()) {
                stem
            } else {
                stem + &suffix
            }
        }
        _ => stem,
    }
}

/// File name the output cycle writes `payload` under.
pub fn target_name(payload: &Payload, policy: &ExtensionPolicy) -> String {
    match payload {
        Payload::Binary { name, data } => {
            let ext = match policy {
                ExtensionPolicy::Auto => sniff_extension(data),
                ExtensionPolicy::None => None,
                ExtensionPolicy::Fixed(ext) => Some(ext.as_str()),
            };
            with_extension(sanitize(name), ext)
        }
        Payload::Document {
            identification,
            version,
            ..
        } => {
            let mut stem = sanitize(identification);
            if let Some(version) = version.as_deref().filter(|v| !v.is_empty()) {
                stem.push('.');
                stem.push_str(&sanitize(version));
            }
            let ext = match policy {
                ExtensionPolicy::Auto => Some("xml"),
                ExtensionPolicy::None => None,
                ExtensionPolicy::Fixed(ext) => Some(ext.as_str()),
            };
            // Versions look like extensions, so always append for documents
            match ext {
                Some(ext) if !ext.is_empty() => format!("{}.{}", stem, ext),
                _ => stem,
            }
        }
    }
}
