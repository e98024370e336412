//! Sample payloads.

pub const PDF: &str = "application/pdf";
pub const TEXT: &str = "text/plain";
pub const DOC: &str = "application/msword";
pub const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const PNG: &str = "image/png";

pub const MIB: usize = 1024 * 1024;

/// `size` bytes that start like a PDF.
pub fn pdf_bytes(size: usize) -> Vec<u8> {
    let mut bytes = b"%PDF-1.7\n".to_vec();
    bytes.resize(size.max(bytes.len()), b'0');
    bytes.truncate(size);
    bytes
}

pub fn text_bytes(text: &str) -> Vec<u8> {
    text.as_bytes().to_vec()
}

/// Google-style userinfo body.
pub fn profile_json(email: &str) -> String {
    serde_json::json!({
        "email": email,
        "name": "Test Analyst",
        "picture": "https://example.com/avatar.png",
    })
    .to_string()
}
