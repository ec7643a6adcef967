use warp::Filter;

macro_rules! include_static {
    ($($path:expr),* $(,)?) => {
        &[
            $(($path, include_str!(concat!("../static/", $path)))),*
        ]
    };
}

const STATIC_FILES: &[(&str, &str)] = include_static!["css/main.css", "js/app.js"];

fn content_type_from_path(path: &str) -> &'static str {
    match path.rsplit('.').next() {
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("html") => "text/html",
        _ => "text/plain",
    }
}

pub fn build_static_routes(
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let index_route = warp::path::end().and(warp::get()).map(|| {
        warp::reply::with_header(
            include_str!("../static/index.html"),
            "content-type",
            "text/html",
        )
    });

    let file_route = warp::path::full().and(warp::get()).and_then(
        |full_path: warp::path::FullPath| async move {
            let path = full_path.as_str().trim_start_matches('/');

            for (file_path, content) in STATIC_FILES {
                if *file_path == path {
                    let content_type = content_type_from_path(path);
                    return Ok::<_, warp::Rejection>(warp::reply::with_header(
                        *content,
                        "content-type",
                        content_type,
                    ));
                }
            }

            Err(warp::reject::not_found())
        },
    );

    index_route.or(file_route)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_index_served_at_root() {
        let routes = build_static_routes();
        let response = warp::test::request()
            .method("GET")
            .path("/")
            .reply(&routes)
            .await;
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()["content-type"], "text/html");
    }

    #[tokio::test]
    async fn test_bundled_assets_served_with_content_type() {
        let routes = build_static_routes();

        let css = warp::test::request()
            .method("GET")
            .path("/css/main.css")
            .reply(&routes)
            .await;
        assert_eq!(css.status(), 200);
        assert_eq!(css.headers()["content-type"], "text/css");

        let js = warp::test::request()
            .method("GET")
            .path("/js/app.js")
            .reply(&routes)
            .await;
        assert_eq!(js.status(), 200);
        assert_eq!(js.headers()["content-type"], "application/javascript");
    }

    #[tokio::test]
    async fn test_unknown_asset_is_not_found() {
        let routes = build_static_routes();
        let response = warp::test::request()
            .method("GET")
            .path("/js/missing.js")
            .reply(&routes)
            .await;
        assert_eq!(response.status(), 404);
    }
}
