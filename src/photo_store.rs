use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Local;
use image::{DynamicImage, ImageBuffer};
use log::{debug, info};
use sha2::{Digest, Sha256};
use tokio::fs;

use crate::collage_types::{
    parse_color, CollageError, CollageResult, OutputFormat, RenderSettings,
};
use crate::config::Config;
use crate::mimetype_detector;

/// Currently uploaded photo set. A photo upload replaces the whole set;
/// the background is tracked separately and survives photo uploads.
#[derive(Debug, Default)]
struct StoreState {
    photo_paths: Vec<PathBuf>,
    background_path: Option<PathBuf>,
}

/// Disk-backed store for uploaded sources and rendered collages, shared
/// across request handlers.
#[derive(Clone)]
pub struct PhotoStore {
    upload_dir: PathBuf,
    output_dir: PathBuf,
    state: Arc<Mutex<StoreState>>,
}

impl PhotoStore {
    pub fn new(config: &Config) -> std::io::Result<Self> {
        let upload_dir = PathBuf::from(&config.upload_path);
        let output_dir = PathBuf::from(&config.output_path);
        std::fs::create_dir_all(&upload_dir)?;
        std::fs::create_dir_all(&output_dir)?;

        info!(
            "Photo store ready: uploads in {}, collages in {}",
            upload_dir.display(),
            output_dir.display()
        );

        Ok(PhotoStore {
            upload_dir,
            output_dir,
            state: Arc::new(Mutex::new(StoreState::default())),
        })
    }

    /// Persists uploaded photos and makes them the current source set,
    /// replacing any previous one. Returns the stored file names.
    pub async fn store_photos(&self, files: Vec<(String, Vec<u8>)>) -> CollageResult<Vec<String>> {
        if files.is_empty() {
            return Err(CollageError::InvalidUpload(
                "no photo files in request".to_string(),
            ));
        }

        let mut paths = Vec::with_capacity(files.len());
        for (filename, data) in &files {
            paths.push(self.persist(filename, data).await?);
        }
        let names: Vec<String> = paths.iter().map(|path| file_name_of(path)).collect();

        let mut state = self.lock_state()?;
        state.photo_paths = paths;
        info!("Stored {} source photos", names.len());
        Ok(names)
    }

    /// Persists an uploaded background image and makes it the current one.
    pub async fn store_background(&self, filename: &str, data: &[u8]) -> CollageResult<String> {
        let path = self.persist(filename, data).await?;
        let name = file_name_of(&path);

        let mut state = self.lock_state()?;
        state.background_path = Some(path);
        info!("Stored background image {}", name);
        Ok(name)
    }

    /// Writes one upload, named by content hash so re-uploading the same
    /// bytes is idempotent on disk.
    async fn persist(&self, filename: &str, data: &[u8]) -> CollageResult<PathBuf> {
        if data.is_empty() {
            return Err(CollageError::InvalidUpload(format!("{} is empty", filename)));
        }

        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .filter(|ext| mimetype_detector::from_extension(ext).is_some())
            .ok_or_else(|| {
                CollageError::InvalidUpload(format!(
                    "{} is not a supported image type",
                    filename
                ))
            })?;

        let digest = Sha256::digest(data);
        let hash: String = digest.iter().map(|byte| format!("{:02x}", byte)).collect();
        let path = self.upload_dir.join(format!("{}.{}", &hash[..16], extension));
        fs::write(&path, data).await?;
        debug!("Wrote {} ({} bytes)", path.display(), data.len());
        Ok(path)
    }

    /// Decodes the current source set in upload order.
    pub fn load_sources(&self) -> CollageResult<Vec<DynamicImage>> {
        let paths = self.lock_state()?.photo_paths.clone();
        if paths.is_empty() {
            return Err(CollageError::NoSourceImages);
        }
        paths.iter().map(|path| Ok(image::open(path)?)).collect()
    }

    /// Decoded background upload if one exists, otherwise a solid canvas
    /// in the requested color (white when unspecified).
    pub fn load_background(
        &self,
        settings: &RenderSettings,
        color: Option<&str>,
    ) -> CollageResult<DynamicImage> {
        let background = self.lock_state()?.background_path.clone();
        if let Some(path) = background {
            return Ok(image::open(path)?);
        }

        let rgb = parse_color(color.unwrap_or("white"))?;
        let canvas = ImageBuffer::from_pixel(settings.canvas_width, settings.canvas_height, rgb);
        Ok(DynamicImage::ImageRgb8(canvas))
    }

    /// Writes an encoded collage under a timestamped name and returns its
    /// path.
    pub async fn save_collage(&self, data: &[u8], format: OutputFormat) -> CollageResult<PathBuf> {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = self
            .output_dir
            .join(format!("collage_{}.{}", timestamp, format.extension()));
        fs::write(&path, data).await?;
        info!("Saved collage to {}", path.display());
        Ok(path)
    }

    pub fn photo_count(&self) -> usize {
        if let Ok(state) = self.state.lock() {
            state.photo_paths.len()
        } else {
            0
        }
    }

    pub fn has_background(&self) -> bool {
        if let Ok(state) = self.state.lock() {
            state.background_path.is_some()
        } else {
            false
        }
    }

    pub fn directories_available(&self) -> bool {
        self.upload_dir.is_dir() && self.output_dir.is_dir()
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, StoreState>, std::io::Error> {
        self.state
            .lock()
            .map_err(|_| std::io::Error::other("photo store lock poisoned"))
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string()
}
