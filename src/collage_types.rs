use std::fmt;
use std::str::FromStr;

use image::Rgb;
use serde::{Deserialize, Serialize};

/// Parameters for a single collage render.
///
/// Built once per request and never mutated afterwards: two renders with
/// equal settings and equal inputs produce identical output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub rows: u32,
    pub cols: u32,
    pub spacing: u32,
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub sharpness: f32,
    pub circular_crop: bool,
}

impl Default for RenderSettings {
    /// A4 at 300 DPI, 3x3 grid, identity enhancement.
    fn default() -> Self {
        RenderSettings {
            canvas_width: 2480,
            canvas_height: 3508,
            rows: 3,
            cols: 3,
            spacing: 50,
            brightness: 1.0,
            contrast: 1.0,
            saturation: 1.0,
            sharpness: 1.0,
            circular_crop: true,
        }
    }
}

impl RenderSettings {
    pub fn validate(&self) -> CollageResult<()> {
        if self.canvas_width == 0 || self.canvas_height == 0 {
            return Err(CollageError::InvalidLayout(format!(
                "canvas must be non-empty, got {}x{}",
                self.canvas_width, self.canvas_height
            )));
        }

        if self.rows == 0 || self.cols == 0 {
            return Err(CollageError::InvalidLayout(format!(
                "grid needs at least one row and one column, got {}x{}",
                self.rows, self.cols
            )));
        }

        let factors = [
            ("brightness", self.brightness),
            ("contrast", self.contrast),
            ("saturation", self.saturation),
            ("sharpness", self.sharpness),
        ];
        for (name, value) in factors {
            if !value.is_finite() || value <= 0.0 {
                return Err(CollageError::InvalidEnhancement(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Png,
    Jpeg,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpeg",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
        }
    }

    pub fn image_format(&self) -> image::ImageFormat {
        match self {
            OutputFormat::Png => image::ImageFormat::Png,
            OutputFormat::Jpeg => image::ImageFormat::Jpeg,
        }
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::Png
    }
}

impl FromStr for OutputFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "png" => Ok(OutputFormat::Png),
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            _ => Err(()),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parses a background fill color: `#RRGGBB`, `#RGB` (leading `#` optional)
/// or the named colors `white` and `black`.
pub fn parse_color(value: &str) -> CollageResult<Rgb<u8>> {
    match value.trim().to_lowercase().as_str() {
        "white" => return Ok(Rgb([255, 255, 255])),
        "black" => return Ok(Rgb([0, 0, 0])),
        _ => {}
    }

    let hex = value.trim().trim_start_matches('#');
    let invalid = || CollageError::InvalidColor(value.to_string());

    // The slices below index bytes, so only ASCII hex digits may reach
    // them; this also shuts out the signs from_str_radix would accept.
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    match hex.len() {
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).map_err(|_| invalid())?;
            let g = u8::from_str_radix(&hex[2..4], 16).map_err(|_| invalid())?;
            let b = u8::from_str_radix(&hex[4..6], 16).map_err(|_| invalid())?;
            Ok(Rgb([r, g, b]))
        }
        3 => {
            let r = u8::from_str_radix(&hex[0..1], 16).map_err(|_| invalid())?;
            let g = u8::from_str_radix(&hex[1..2], 16).map_err(|_| invalid())?;
            let b = u8::from_str_radix(&hex[2..3], 16).map_err(|_| invalid())?;
            Ok(Rgb([r * 17, g * 17, b * 17]))
        }
        _ => Err(invalid()),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CollageError {
    #[error("Image processing error: {0}")]
    ImageError(#[from] image::ImageError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("No source images provided")]
    NoSourceImages,
    #[error("Invalid layout: {0}")]
    InvalidLayout(String),
    #[error("Invalid enhancement factor: {0}")]
    InvalidEnhancement(String),
    #[error("Invalid background color: {0}")]
    InvalidColor(String),
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),
}

impl CollageError {
    /// True for errors caused by the caller's input rather than by the
    /// render itself; the HTTP layer maps these to 400 instead of 500.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            CollageError::NoSourceImages
                | CollageError::InvalidLayout(_)
                | CollageError::InvalidEnhancement(_)
                | CollageError::InvalidColor(_)
                | CollageError::InvalidUpload(_)
        )
    }
}

pub type CollageResult<T> = Result<T, CollageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("png".parse::<OutputFormat>(), Ok(OutputFormat::Png));
        assert_eq!("jpeg".parse::<OutputFormat>(), Ok(OutputFormat::Jpeg));
        assert_eq!("jpg".parse::<OutputFormat>(), Ok(OutputFormat::Jpeg));
        assert_eq!("gif".parse::<OutputFormat>(), Err(()));

        assert_eq!(OutputFormat::default(), OutputFormat::Png);
        assert_eq!(format!("{}", OutputFormat::Jpeg), "jpeg");
        assert_eq!(OutputFormat::Png.content_type(), "image/png");
        assert_eq!(OutputFormat::Jpeg.extension(), "jpg");
    }

    #[test]
    fn test_parse_color_named_and_hex() {
        assert_eq!(parse_color("white").unwrap(), Rgb([255, 255, 255]));
        assert_eq!(parse_color("Black").unwrap(), Rgb([0, 0, 0]));
        assert_eq!(parse_color("#ff8000").unwrap(), Rgb([255, 128, 0]));
        assert_eq!(parse_color("ff8000").unwrap(), Rgb([255, 128, 0]));
        assert_eq!(parse_color("#fff").unwrap(), Rgb([255, 255, 255]));
        assert_eq!(parse_color("#f80").unwrap(), Rgb([255, 136, 0]));
    }

    #[test]
    fn test_parse_color_rejects_garbage() {
        assert!(parse_color("chartreuse").is_err());
        assert!(parse_color("#12345").is_err());
        assert!(parse_color("#zzzzzz").is_err());
        assert!(parse_color("").is_err());
        // Signs are not hex digits even though from_str_radix takes them.
        assert!(parse_color("#+f+f+f").is_err());
        assert!(parse_color("-ff8000").is_err());
    }

    #[test]
    fn test_parse_color_rejects_multibyte_input() {
        // Must return the error, not panic slicing mid-character.
        for value in ["\u{20ac}", "#\u{20ac}\u{20ac}", "wei\u{df}", "#ffx\u{fc}"] {
            assert!(matches!(
                parse_color(value),
                Err(CollageError::InvalidColor(_))
            ));
        }
    }

    #[test]
    fn test_default_settings_are_a4() {
        let settings = RenderSettings::default();
        assert_eq!(settings.canvas_width, 2480);
        assert_eq!(settings.canvas_height, 3508);
        assert_eq!(settings.rows, 3);
        assert_eq!(settings.cols, 3);
        assert_eq!(settings.spacing, 50);
        assert!(settings.circular_crop);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_degenerate_grid() {
        let settings = RenderSettings {
            rows: 0,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(CollageError::InvalidLayout(_))
        ));
    }

    #[test]
    fn test_validate_rejects_non_positive_factors() {
        for factor in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let settings = RenderSettings {
                contrast: factor,
                ..Default::default()
            };
            assert!(
                matches!(
                    settings.validate(),
                    Err(CollageError::InvalidEnhancement(_))
                ),
                "contrast {} should be rejected",
                factor
            );
        }
    }
}
