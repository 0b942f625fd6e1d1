//! Response bodies shared by the handlers: errors, PNGs and galleries.

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;

use crate::error::SynopticError;
use crate::gallery::{Gallery, MissingPanel};
use crate::logging::log_request_error;

/// Header carrying the chart title next to a PNG body
pub const TITLE_HEADER: &str = "x-chart-title";

/// A failed request, rendered as `{error, request_id}`
#[derive(Debug)]
pub struct ApiError {
    pub error: SynopticError,
    pub request_id: String,
}

impl ApiError {
    /// Log the failure and wrap it for the response
    pub fn logged(error: SynopticError, endpoint: &str, request_id: &str, params: Option<&str>) -> Self {
        log_request_error(&error, endpoint, request_id, params);
        Self {
            error,
            request_id: request_id.to_string(),
        }
    }
}

/// HTTP status for an error
pub fn status_for(error: &SynopticError) -> StatusCode {
    match error {
        e if e.is_validation() => StatusCode::BAD_REQUEST,
        SynopticError::DataUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            status_for(&self.error),
            Json(serde_json::json!({
                "error": self.error.to_string(),
                "request_id": self.request_id,
            })),
        )
            .into_response()
    }
}

/// How a gallery is returned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GalleryFormat {
    #[default]
    Html,
    Json,
}

impl GalleryFormat {
    pub fn parse(text: Option<&str>) -> Result<Self, SynopticError> {
        match text.map(|t| t.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("html") => Ok(GalleryFormat::Html),
            Some("json") => Ok(GalleryFormat::Json),
            Some(other) => Err(SynopticError::InvalidParameter {
                param: "format".to_string(),
                message: format!("Unsupported format: {}. Must be one of: html, json", other),
            }),
        }
    }
}

/// A PNG body with its title in a header
pub fn png_response(png: Vec<u8>, title: &str) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
    // titles are ASCII; the composite title has a line break
    if let Ok(value) = HeaderValue::from_str(&title.replace('\n', " ")) {
        headers.insert(TITLE_HEADER, value);
    }
    (StatusCode::OK, headers, png).into_response()
}

#[derive(Serialize)]
struct GalleryBody<'a> {
    heading: &'a str,
    images: Vec<ImageBody<'a>>,
    missing: &'a [MissingPanel],
}

#[derive(Serialize)]
struct ImageBody<'a> {
    label: &'a str,
    title: &'a str,
    png_base64: String,
}

/// The gallery as an HTML page or a JSON document
pub fn gallery_response(gallery: &Gallery, heading: &str, format: GalleryFormat) -> Response {
    match format {
        GalleryFormat::Json => {
            let body = GalleryBody {
                heading,
                images: gallery
                    .images()
                    .map(|(label, image)| ImageBody {
                        label,
                        title: &image.title,
                        png_base64: STANDARD.encode(&image.png),
                    })
                    .collect(),
                missing: gallery.missing(),
            };
            Json(body).into_response()
        }
        GalleryFormat::Html => Html(gallery_html(gallery, heading)).into_response(),
    }
}

fn gallery_html(gallery: &Gallery, heading: &str) -> String {
    let mut page = String::with_capacity(gallery.len() * 64 * 1024);
    page.push_str("<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>");
    page.push_str(&escape_html(heading));
    page.push_str("</title><style>figure{display:inline-block;margin:8px}img{max-width:100%}</style></head><body>\n");
    page.push_str(&format!("<h2>{}</h2>\n", escape_html(heading)));

    for (label, image) in gallery.images() {
        page.push_str(&format!(
            "<figure id=\"{}\"><figcaption>{}</figcaption><img alt=\"{}\" src=\"data:image/png;base64,{}\"></figure>\n",
            escape_html(label),
            escape_html(&image.title).replace('\n', "<br>"),
            escape_html(label),
            STANDARD.encode(&image.png)
        ));
    }

    if !gallery.missing().is_empty() {
        page.push_str("<h3>Not rendered</h3>\n<ul>\n");
        for missing in gallery.missing() {
            page.push_str(&format!(
                "<li><b>{}</b>: {}</li>\n",
                escape_html(&missing.label),
                escape_html(&missing.reason)
            ));
        }
        page.push_str("</ul>\n");
    }

    page.push_str("</body></html>\n");
    page
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
