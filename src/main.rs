mod collage_generator;
mod collage_types;
mod config;
mod handlers_collage;
mod handlers_health;
mod handlers_static;
mod handlers_upload;
mod image_enhancer;
mod mimetype_detector;
mod photo_store;
mod warp_helpers;

use log::{error, info};
use std::net::{SocketAddr, TcpListener};
use warp::Filter;

use handlers_collage::build_collage_routes;
use handlers_health::build_health_routes;
use handlers_static::build_static_routes;
use handlers_upload::build_upload_routes;
use photo_store::PhotoStore;
use warp_helpers::{cors, handle_rejection};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = config::Config::from_env()?;
    let port = config.port;

    info!("Starting CollagePress server on port {}", port);
    info!("Upload path: {}", config.upload_path);
    info!("Output path: {}", config.output_path);
    info!(
        "Default canvas: {}x{}, grid {}x{}, spacing {}",
        config.defaults.canvas_width,
        config.defaults.canvas_height,
        config.defaults.rows,
        config.defaults.cols,
        config.defaults.spacing
    );

    // Check if port is available BEFORE initializing services
    if !is_port_available(&config.host, port) {
        error!(
            "Port {} is already in use. Stop the running CollagePress instance or use a different port.",
            port
        );
        return Err(format!("Port {} is already in use", port).into());
    }

    let store = PhotoStore::new(&config)?;

    let health_routes = build_health_routes(store.clone());
    let upload_routes = build_upload_routes(store.clone(), &config);
    let collage_routes = build_collage_routes(store, config.defaults.clone());
    let static_routes = build_static_routes();

    let routes = health_routes
        .or(upload_routes)
        .or(collage_routes)
        .or(static_routes)
        .with(cors())
        .with(warp::log("collage_press"))
        .recover(handle_rejection);

    let addr: SocketAddr = format!("{}:{}", config.host, port).parse()?;
    info!(
        "Server started successfully, listening on http://localhost:{}",
        port
    );

    warp::serve(routes).run(addr).await;

    Ok(())
}

fn is_port_available(host: &str, port: u16) -> bool {
    TcpListener::bind((host, port)).is_ok()
}
