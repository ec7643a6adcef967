/// Detects MIME type from file extension string
pub fn from_extension(ext: &str) -> Option<MimeType> {
    let ext_lower = ext.to_lowercase();
    match ext_lower.as_str() {
        "jpg" | "jpeg" => Some(MimeType::new("image", "jpeg")),
        "png" => Some(MimeType::new("image", "png")),
        "gif" => Some(MimeType::new("image", "gif")),
        "webp" => Some(MimeType::new("image", "webp")),
        "bmp" => Some(MimeType::new("image", "bmp")),
        "tiff" | "tif" => Some(MimeType::new("image", "tiff")),
        "qoi" => Some(MimeType::new("image", "qoi")),
        "tga" => Some(MimeType::new("image", "x-tga")),
        "pnm" | "pbm" | "pgm" | "ppm" => Some(MimeType::new("image", "x-portable-anymap")),

        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeType {
    type_: String,
    subtype: String,
}

impl MimeType {
    fn new(type_: &str, subtype: &str) -> Self {
        Self {
            type_: type_.to_string(),
            subtype: subtype.to_string(),
        }
    }
}

impl std::fmt::Display for MimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.type_, self.subtype)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_types() {
        assert_eq!(from_extension("jpg").unwrap().to_string(), "image/jpeg");
        assert_eq!(from_extension("JPG").unwrap().to_string(), "image/jpeg");
        assert_eq!(from_extension("png").unwrap().to_string(), "image/png");
        assert_eq!(from_extension("webp").unwrap().to_string(), "image/webp");
        assert_eq!(from_extension("tif").unwrap().to_string(), "image/tiff");
    }

    #[test]
    fn test_non_image_types_rejected() {
        assert!(from_extension("mp4").is_none());
        assert!(from_extension("txt").is_none());
        assert!(from_extension("xyz").is_none());
        assert!(from_extension("").is_none());
    }
}
