//! Independent statistical tests over an untrusted byte buffer.
//!
//! Nothing here assumes the buffer is a well-formed file of its declared
//! type; every test is total over arbitrary bytes, including the empty slice.

pub mod chi_square;
pub mod correlation;
pub mod entropy;
pub mod lsb;
pub mod magic;
pub mod patterns;

pub use chi_square::chi_square;
pub use correlation::pixel_correlation;
pub use entropy::entropy;
pub use lsb::lsb;
pub use magic::metadata;
pub use patterns::patterns;

/// Byte-value frequencies over the whole buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    pub counts: [u64; 256],
    pub total: u64,
}

impl Histogram {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut counts = [0u64; 256];
        for &b in bytes {
            counts[b as usize] += 1;
        }
        Self {
            counts,
            total: bytes.len() as u64,
        }
    }
}

/// Lowercased MIME essence with any `;` parameters removed.
pub fn normalize_mime(mime: &str) -> String {
    mime.split(';')
        .next()
        .unwrap_or(mime)
        .trim()
        .to_ascii_lowercase()
}

pub fn is_png(mime: &str) -> bool {
    normalize_mime(mime).contains("png")
}

/// PNG and JPEG are compressed and therefore naturally high-entropy.
pub fn is_compressed_image(mime: &str) -> bool {
    let m = normalize_mime(mime);
    m.contains("png") || m.contains("jpeg") || m.contains("jpg")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_parameters_are_stripped() {
        assert_eq!(normalize_mime(" Image/PNG; charset=binary"), "image/png");
        assert!(is_compressed_image("image/jpg"));
        assert!(!is_compressed_image("application/pdf"));
    }

    #[test]
    fn histogram_counts_every_byte() {
        let h = Histogram::from_bytes(&[0, 0, 255]);
        assert_eq!(h.counts[0], 2);
        assert_eq!(h.counts[255], 1);
        assert_eq!(h.total, 3);
    }
}
