use bytes::BufMut;
use futures_util::TryStreamExt;
use log::{debug, info, warn};
use serde_json::json;
use warp::multipart::{FormData, Part};
use warp::{Filter, Rejection, Reply};

use crate::config::Config;
use crate::photo_store::PhotoStore;
use crate::warp_helpers::{reject_for, with_store, ValidationError};

/// Drains a multipart form into (field name, file name, bytes) triples.
async fn collect_parts(form: FormData) -> Result<Vec<(String, String, Vec<u8>)>, Rejection> {
    form.and_then(|mut part: Part| async move {
        let name = part.name().to_string();
        let filename = part.filename().unwrap_or_default().to_string();

        // data() yields the content one chunk at a time
        let mut bytes: Vec<u8> = Vec::new();
        while let Some(content) = part.data().await {
            bytes.put(content?);
        }
        Ok((name, filename, bytes))
    })
    .try_collect::<Vec<_>>()
    .await
    .map_err(|e| {
        warn!("Multipart read failed: {}", e);
        warp::reject::custom(ValidationError {
            message: "Malformed multipart payload".to_string(),
        })
    })
}

/// POST /api/uploads: accepts repeated "photos" parts and an optional
/// "background" part. Photos replace the current source set.
pub async fn upload_files(form: FormData, store: PhotoStore) -> Result<impl Reply, Rejection> {
    let parts = collect_parts(form).await?;

    let mut photos: Vec<(String, Vec<u8>)> = Vec::new();
    let mut background: Option<(String, Vec<u8>)> = None;
    for (name, filename, data) in parts {
        // Browsers send an empty part for file inputs left blank
        if filename.is_empty() && data.is_empty() {
            continue;
        }
        match name.as_str() {
            "photos" => photos.push((filename, data)),
            "background" => background = Some((filename, data)),
            other => debug!("Ignoring unexpected form field {}", other),
        }
    }

    if photos.is_empty() && background.is_none() {
        return Err(warp::reject::custom(ValidationError {
            message: "No files in request".to_string(),
        }));
    }

    let photo_names = if photos.is_empty() {
        Vec::new()
    } else {
        store.store_photos(photos).await.map_err(reject_for)?
    };
    let background_name = match background {
        Some((filename, data)) => Some(
            store
                .store_background(&filename, &data)
                .await
                .map_err(reject_for)?,
        ),
        None => None,
    };

    info!(
        "Upload complete: {} photos, background: {}",
        photo_names.len(),
        background_name.is_some()
    );

    Ok(warp::reply::json(&json!({
        "photos": photo_names,
        "background": background_name,
        "photo_count": store.photo_count(),
    })))
}

pub fn build_upload_routes(
    store: PhotoStore,
    config: &Config,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "uploads")
        .and(warp::post())
        .and(warp::multipart::form().max_length(config.max_upload_bytes()))
        .and(with_store(store))
        .and_then(upload_files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collage_types::RenderSettings;
    use crate::warp_helpers::handle_rejection;
    use image::{ImageBuffer, Rgb};
    use tempfile::TempDir;

    const BOUNDARY: &str = "ab1234cd";

    fn create_test_config(temp_dir: &TempDir) -> Config {
        Config {
            port: 18530,
            host: "127.0.0.1".to_string(),
            upload_path: temp_dir
                .path()
                .join("uploads")
                .to_string_lossy()
                .to_string(),
            output_path: temp_dir
                .path()
                .join("collages")
                .to_string_lossy()
                .to_string(),
            max_upload_size_mb: 50,
            defaults: RenderSettings::default(),
        }
    }

    fn encoded_test_image(rgb: [u8; 3]) -> Vec<u8> {
        let img: image::RgbImage = ImageBuffer::from_pixel(10, 10, Rgb(rgb));
        let mut buffer = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buffer, image::ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    fn multipart_body(parts: &[(&str, &str, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, filename, data) in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    name, filename
                )
                .as_bytes(),
            );
            body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn multipart_request(path: &str, body: Vec<u8>) -> warp::test::RequestBuilder {
        warp::test::request()
            .method("POST")
            .path(path)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(body)
    }

    #[tokio::test]
    async fn test_upload_photos_and_background() {
        let temp_dir = TempDir::new().unwrap();
        let config = create_test_config(&temp_dir);
        let store = PhotoStore::new(&config).unwrap();
        let routes = build_upload_routes(store.clone(), &config).recover(handle_rejection);

        let red = encoded_test_image([255, 0, 0]);
        let green = encoded_test_image([0, 255, 0]);
        let blue = encoded_test_image([0, 0, 255]);
        let body = multipart_body(&[
            ("photos", "one.png", &red),
            ("photos", "two.png", &green),
            ("background", "bg.png", &blue),
        ]);

        let response = multipart_request("/api/uploads", body).reply(&routes).await;
        assert_eq!(response.status(), 200);

        let json: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(json["photo_count"], 2);
        assert_eq!(json["photos"].as_array().unwrap().len(), 2);
        assert!(json["background"].is_string());

        assert_eq!(store.photo_count(), 2);
        assert!(store.has_background());
    }

    #[tokio::test]
    async fn test_upload_rejects_unsupported_file() {
        let temp_dir = TempDir::new().unwrap();
        let config = create_test_config(&temp_dir);
        let store = PhotoStore::new(&config).unwrap();
        let routes = build_upload_routes(store.clone(), &config).recover(handle_rejection);

        let body = multipart_body(&[("photos", "notes.txt", b"not an image")]);
        let response = multipart_request("/api/uploads", body).reply(&routes).await;
        assert_eq!(response.status(), 400);
        assert_eq!(store.photo_count(), 0);
    }

    #[tokio::test]
    async fn test_upload_without_files_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config = create_test_config(&temp_dir);
        let store = PhotoStore::new(&config).unwrap();
        let routes = build_upload_routes(store, &config).recover(handle_rejection);

        let body = multipart_body(&[("photos", "", b"")]);
        let response = multipart_request("/api/uploads", body).reply(&routes).await;
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn test_upload_size_limit() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            max_upload_size_mb: 0,
            ..create_test_config(&temp_dir)
        };
        let store = PhotoStore::new(&config).unwrap();
        let routes = build_upload_routes(store, &config).recover(handle_rejection);

        let red = encoded_test_image([255, 0, 0]);
        let body = multipart_body(&[("photos", "one.png", &red)]);
        let response = multipart_request("/api/uploads", body).reply(&routes).await;
        assert_eq!(response.status(), 413);
    }
}
