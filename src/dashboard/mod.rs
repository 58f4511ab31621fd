use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use rust_embed::Embed;

/// Static dashboard page, script and stylesheet compiled into the binary.
#[derive(Embed)]
#[folder = "src/dashboard/assets/"]
struct Assets;

/// GET /{*path}: Serve an embedded dashboard file.
pub async fn serve_asset(axum::extract::Path(path): axum::extract::Path<String>) -> Response {
    serve_file(&path)
}

/// GET /: Serve the dashboard page.
pub async fn serve_index() -> Response {
    serve_file("index.html")
}

fn serve_file(path: &str) -> Response {
    let Some(content) = Assets::get(path) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, mime.as_ref().to_string())],
        content.data.into_owned(),
    )
        .into_response()
}
