//! Upload validation: MIME allowlist, magic-byte sniffing, and size limit.
//! Spec §4.1 `upload` and §8 boundary behaviour.

use lore_anchor_shared::error::CoreError;

pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

const PNG_SIGNATURE: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_SIGNATURE: &[u8] = &[0xFF, 0xD8, 0xFF];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclaredMime {
    Png,
    Jpeg,
    WebP,
}

impl DeclaredMime {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "image/png" => Some(Self::Png),
            "image/jpeg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
        }
    }

    /// Whether `bytes` begins with this MIME's magic signature. Spec §4.1:
    /// PNG `89 50 4E 47 0D 0A 1A 0A`, JPEG `FF D8 FF`, WebP `RIFF????WEBP`.
    fn magic_bytes_match(self, bytes: &[u8]) -> bool {
        match self {
            Self::Png => bytes.starts_with(PNG_SIGNATURE),
            Self::Jpeg => bytes.starts_with(JPEG_SIGNATURE),
            Self::WebP => {
                bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP"
            }
        }
    }
}

pub const MAX_PAGE_SIZE: u32 = 100;

/// Clamp `page` to `>= 1` and `page_size` to `[1, 100]`, per spec §8
/// boundary behaviour ("page_size = 200 is clamped to 100; page = 0 is
/// clamped to 1").
pub fn clamp_pagination(page: u32, page_size: u32) -> (u32, u32) {
    let page = page.max(1);
    let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
    (page, page_size)
}

/// Validate an upload against the allowlist, size limit, and declared-MIME
/// magic bytes, in the order spec §4.1 lists its failure conditions.
pub fn validate_upload(bytes: &[u8], declared_mime: &str) -> Result<DeclaredMime, CoreError> {
    let mime = DeclaredMime::parse(declared_mime)
        .ok_or_else(|| CoreError::UnsupportedType(declared_mime.to_string()))?;

    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(CoreError::TooLarge);
    }

    if !mime.magic_bytes_match(bytes) {
        return Err(CoreError::ContentMismatch);
    }

    Ok(mime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_png() {
        let mut bytes = PNG_SIGNATURE.to_vec();
        bytes.extend_from_slice(b"rest of file");
        assert_eq!(validate_upload(&bytes, "image/png").unwrap(), DeclaredMime::Png);
    }

    #[test]
    fn rejects_unsupported_mime() {
        let bytes = PNG_SIGNATURE.to_vec();
        assert!(matches!(
            validate_upload(&bytes, "image/gif"),
            Err(CoreError::UnsupportedType(_))
        ));
    }

    #[test]
    fn rejects_content_mismatch() {
        let bytes = b"hello world".to_vec();
        assert!(matches!(
            validate_upload(&bytes, "image/png"),
            Err(CoreError::ContentMismatch)
        ));
    }

    #[test]
    fn rejects_too_large() {
        let mut bytes = PNG_SIGNATURE.to_vec();
        bytes.extend(std::iter::repeat(0u8).take(MAX_UPLOAD_BYTES + 1));
        assert!(matches!(validate_upload(&bytes, "image/png"), Err(CoreError::TooLarge)));
    }

    #[test]
    fn pagination_clamps_page_and_page_size() {
        assert_eq!(clamp_pagination(0, 10), (1, 10));
        assert_eq!(clamp_pagination(1, 200), (1, 100));
        assert_eq!(clamp_pagination(1, 0), (1, 1));
        assert_eq!(clamp_pagination(3, 50), (3, 50));
    }

    #[test]
    fn webp_signature_checks_riff_and_webp_markers() {
        let mut bytes = b"RIFF".to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes.extend_from_slice(b"WEBP");
        assert_eq!(validate_upload(&bytes, "image/webp").unwrap(), DeclaredMime::WebP);
    }
}
