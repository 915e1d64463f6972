// Design records, checklist items, attachments and the errors raised on them

pub mod errors;
pub mod types;

pub use errors::{ReasonCode, StoreError, WorkflowError};
pub use types::*;

/// Serialize binary attachment content as standard base64
pub mod content_base64 {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

/// Guess a MIME type from leading magic bytes, then from the file extension
pub fn sniff_mimetype(name: &str, content: &[u8]) -> String {
    const SIGNATURES: &[(&[u8], &str)] = &[
        (b"\x89PNG\r\n\x1a\n", "image/png"),
        (b"\xff\xd8\xff", "image/jpeg"),
        (b"GIF87a", "image/gif"),
        (b"GIF89a", "image/gif"),
        (b"%PDF-", "application/pdf"),
        (b"PK\x03\x04", "application/zip"),
    ];

    for (magic, mimetype) in SIGNATURES {
        if content.starts_with(magic) {
            return (*mimetype).to_string();
        }
    }
    if content.len() >= 12 && &content[0..4] == b"RIFF" && &content[8..12] == b"WEBP" {
        return "image/webp".to_string();
    }

    let extension = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "pdf" => "application/pdf",
        "ai" | "eps" => "application/postscript",
        "psd" => "image/vnd.adobe.photoshop",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
    .to_string()
}
