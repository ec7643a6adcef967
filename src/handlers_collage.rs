use log::info;
use serde::Deserialize;
use std::convert::Infallible;
use warp::{Filter, Rejection, Reply};

use crate::collage_generator;
use crate::collage_types::{OutputFormat, RenderSettings};
use crate::photo_store::PhotoStore;
use crate::warp_helpers::{reject_for, with_defaults, with_store, ValidationError};

/// Per-request overrides for the configured render defaults.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RenderRequest {
    pub canvas_width: Option<u32>,
    pub canvas_height: Option<u32>,
    pub rows: Option<u32>,
    pub cols: Option<u32>,
    pub spacing: Option<u32>,
    pub brightness: Option<f32>,
    pub contrast: Option<f32>,
    pub saturation: Option<f32>,
    pub sharpness: Option<f32>,
    pub circular_crop: Option<bool>,
    pub background_color: Option<String>,
    pub format: Option<String>,
}

impl RenderRequest {
    /// Applies the overrides onto the configured defaults. Every render
    /// works from the resulting value; the defaults themselves never
    /// change.
    fn settings(&self, defaults: &RenderSettings) -> RenderSettings {
        RenderSettings {
            canvas_width: self.canvas_width.unwrap_or(defaults.canvas_width),
            canvas_height: self.canvas_height.unwrap_or(defaults.canvas_height),
            rows: self.rows.unwrap_or(defaults.rows),
            cols: self.cols.unwrap_or(defaults.cols),
            spacing: self.spacing.unwrap_or(defaults.spacing),
            brightness: self.brightness.unwrap_or(defaults.brightness),
            contrast: self.contrast.unwrap_or(defaults.contrast),
            saturation: self.saturation.unwrap_or(defaults.saturation),
            sharpness: self.sharpness.unwrap_or(defaults.sharpness),
            circular_crop: self.circular_crop.unwrap_or(defaults.circular_crop),
        }
    }

    fn output_format(&self) -> Result<OutputFormat, Rejection> {
        match &self.format {
            Some(name) => name.parse().map_err(|_| {
                warp::reject::custom(ValidationError {
                    message: format!("Unknown output format: {}", name),
                })
            }),
            None => Ok(OutputFormat::default()),
        }
    }
}

/// GET /api/collage/settings: configured defaults plus upload state.
pub async fn get_settings(
    defaults: RenderSettings,
    store: PhotoStore,
) -> Result<impl Reply, Infallible> {
    Ok(warp::reply::json(&serde_json::json!({
        "defaults": defaults,
        "photo_count": store.photo_count(),
        "has_background": store.has_background(),
    })))
}

fn render_bytes(
    store: &PhotoStore,
    defaults: &RenderSettings,
    request: &RenderRequest,
) -> Result<(Vec<u8>, OutputFormat, RenderSettings), Rejection> {
    let settings = request.settings(defaults);
    let format = request.output_format()?;

    let sources = store.load_sources().map_err(reject_for)?;
    let background = store
        .load_background(&settings, request.background_color.as_deref())
        .map_err(reject_for)?;
    let canvas =
        collage_generator::render_collage(&sources, &background, &settings).map_err(reject_for)?;
    let bytes = collage_generator::encode_collage(&canvas, format).map_err(reject_for)?;
    Ok((bytes, format, settings))
}

/// POST /api/collage/preview: renders and streams the result without
/// persisting it.
pub async fn preview_collage(
    request: RenderRequest,
    defaults: RenderSettings,
    store: PhotoStore,
) -> Result<impl Reply, Rejection> {
    let (bytes, format, settings) = render_bytes(&store, &defaults, &request)?;
    info!(
        "Preview rendered: {}x{}, {} bytes",
        settings.canvas_width,
        settings.canvas_height,
        bytes.len()
    );

    let reply = warp::reply::with_header(bytes, "content-type", format.content_type());
    let reply = warp::reply::with_header(reply, "cache-control", "no-store");
    Ok(reply)
}

/// POST /api/collage/render: renders, saves under a timestamped name in
/// the output directory, and streams the result as a download.
pub async fn render_collage_to_disk(
    request: RenderRequest,
    defaults: RenderSettings,
    store: PhotoStore,
) -> Result<impl Reply, Rejection> {
    let (bytes, format, settings) = render_bytes(&store, &defaults, &request)?;
    let path = store
        .save_collage(&bytes, format)
        .await
        .map_err(reject_for)?;
    info!(
        "Collage rendered: {}x{}, saved to {}",
        settings.canvas_width,
        settings.canvas_height,
        path.display()
    );

    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("collage")
        .to_string();
    let reply = warp::reply::with_header(bytes, "content-type", format.content_type());
    let reply = warp::reply::with_header(
        reply,
        "content-disposition",
        format!("attachment; filename=\"{}\"", filename),
    );
    Ok(reply)
}

/// Build collage routes
pub fn build_collage_routes(
    store: PhotoStore,
    defaults: RenderSettings,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let settings = warp::path!("api" / "collage" / "settings")
        .and(warp::get())
        .and(with_defaults(defaults.clone()))
        .and(with_store(store.clone()))
        .and_then(get_settings);

    let preview = warp::path!("api" / "collage" / "preview")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_defaults(defaults.clone()))
        .and(with_store(store.clone()))
        .and_then(preview_collage);

    let render = warp::path!("api" / "collage" / "render")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_defaults(defaults))
        .and(with_store(store))
        .and_then(render_collage_to_disk);

    settings.or(preview).or(render)
}
