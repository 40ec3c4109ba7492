use super::normalize_mime;
use crate::report::MetadataFinding;

const SIGNATURES: &[(&str, &str)] = &[
    ("ffd8ffe0", "JPEG/JFIF"),
    ("ffd8ffe1", "JPEG/EXIF"),
    ("89504e47", "PNG"),
    ("47494638", "GIF"),
    ("25504446", "PDF"),
    ("504b0304", "ZIP/Office"),
];

/// Hex prefix the content must start with for a declared MIME type, if the
/// type is one we know a signature for.
fn expected_prefix(mime: &str) -> Option<&'static str> {
    let m = normalize_mime(mime);
    let prefix = match m.as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => "ffd8",
        "image/png" => "89504e47",
        "image/gif" => "47494638",
        "application/pdf" => "25504446",
        "application/zip" | "application/x-zip-compressed" => "504b0304",
        _ if m.starts_with("application/vnd.openxmlformats-officedocument.") => "504b0304",
        _ => return None,
    };
    Some(prefix)
}

pub fn detect_type(magic_hex: &str) -> &'static str {
    SIGNATURES
        .iter()
        .find(|(sig, _)| *sig == magic_hex)
        .map(|(_, label)| *label)
        .unwrap_or("Unknown")
}

/// Compares the leading bytes against the signature the declared type implies.
pub fn metadata(bytes: &[u8], mime: &str) -> MetadataFinding {
    let magic_bytes = hex::encode(&bytes[..bytes.len().min(4)]);
    let detected_type = detect_type(&magic_bytes).to_string();

    let reason = match expected_prefix(mime) {
        Some(prefix) if !magic_bytes.starts_with(prefix) => Some(format!(
            "declared MIME type {} does not match file signature ({detected_type})",
            normalize_mime(mime)
        )),
        _ => None,
    };

    MetadataFinding {
        magic_bytes,
        detected_type,
        suspicious: reason.is_some(),
        reason,
    }
}
