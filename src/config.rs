use std::env;

use crate::collage_types::RenderSettings;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub upload_path: String,
    pub output_path: String,
    pub max_upload_size_mb: u64,
    pub defaults: RenderSettings,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Config {
            port: env::var("COLLAGE_PRESS_PORT")
                .unwrap_or_else(|_| "18530".to_string())
                .parse()?,
            host: env::var("COLLAGE_PRESS_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            upload_path: env::var("COLLAGE_PRESS_UPLOAD_PATH")
                .unwrap_or_else(|_| "./data/uploads".to_string()),
            output_path: env::var("COLLAGE_PRESS_OUTPUT_PATH")
                .unwrap_or_else(|_| "./data/collages".to_string()),
            max_upload_size_mb: env::var("COLLAGE_PRESS_MAX_UPLOAD_SIZE_MB")
                .unwrap_or_else(|_| "50".to_string())
                .parse()?,
            defaults: RenderSettings {
                canvas_width: env::var("COLLAGE_PRESS_CANVAS_WIDTH")
                    .unwrap_or_else(|_| "2480".to_string())
                    .parse()?,
                canvas_height: env::var("COLLAGE_PRESS_CANVAS_HEIGHT")
                    .unwrap_or_else(|_| "3508".to_string())
                    .parse()?,
                rows: env::var("COLLAGE_PRESS_ROWS")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()?,
                cols: env::var("COLLAGE_PRESS_COLS")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()?,
                spacing: env::var("COLLAGE_PRESS_SPACING")
                    .unwrap_or_else(|_| "50".to_string())
                    .parse()?,
                circular_crop: env::var("COLLAGE_PRESS_CIRCULAR_CROP")
                    .unwrap_or_else(|_| "true".to_string())
                    .parse()?,
                ..RenderSettings::default()
            },
        })
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_size_mb * 1024 * 1024
    }
}
