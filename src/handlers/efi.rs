//! Extreme forecast index endpoints.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use super::reanalysis::DEFAULT_REGION;
use super::response::{gallery_response, ApiError, GalleryFormat};
use crate::efi::{find_variable, EfiVariable, EFI_VARIABLES};
use crate::error::{Result, SynopticError};
use crate::logging::{generate_request_id, log_timed_operation};
use crate::state::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EfiQuery {
    /// `YYYYMMDDHH`; the newest archived run when absent
    pub init: Option<String>,
    /// Short name (`tpi`) or label (`Total precipitation`)
    pub variable: Option<String>,
    pub region: Option<String>,
    pub format: Option<String>,
}

impl EfiQuery {
    fn describe(&self) -> String {
        format!(
            "init={}, variable={}, region={}",
            self.init.as_deref().unwrap_or("latest"),
            self.variable.as_deref().unwrap_or("none"),
            self.region.as_deref().unwrap_or(DEFAULT_REGION)
        )
    }
}

#[derive(Debug, Serialize)]
pub struct InitTimesResponse {
    pub init_times: Vec<String>,
}

/// Handle GET /efi/variables requests
pub async fn variables_handler() -> Json<&'static [EfiVariable]> {
    Json(EFI_VARIABLES)
}

/// Handle GET /efi/init_times requests
pub async fn init_times_handler(State(state): State<Arc<AppState>>) -> Response {
    let request_id = generate_request_id();
    match log_timed_operation("list_efi_init_times", || state.efi.init_times()) {
        Ok(init_times) => Json(InitTimesResponse { init_times }).into_response(),
        Err(e) => ApiError::logged(e, "/efi/init_times", &request_id, None).into_response(),
    }
}

fn newest_init(state: &AppState) -> Result<String> {
    state
        .efi
        .init_times()?
        .into_iter()
        .next()
        .ok_or_else(|| SynopticError::unavailable("efi", "any", "the EFI archive holds no initialisation times"))
}

/// Handle GET /efi/gallery requests
pub async fn gallery_handler(State(state): State<Arc<AppState>>, Query(query): Query<EfiQuery>) -> Response {
    let request_id = generate_request_id();
    let start = Instant::now();

    let result = async {
        let format = GalleryFormat::parse(query.format.as_deref())?;
        let name = query.variable.as_deref().ok_or_else(|| SynopticError::InvalidParameter {
            param: "variable".to_string(),
            message: "an EFI variable is required".to_string(),
        })?;
        let init = match query.init.as_deref() {
            Some(init) => init.to_string(),
            None => newest_init(&state)?,
        };
        let region = query.region.as_deref().unwrap_or(DEFAULT_REGION);
        let now = chrono::Utc::now().naive_utc();

        let request = state.efi.request(&init, name, region, now)?;
        let gallery = state.efi.gallery(&request).await?;
        let label = find_variable(name).map(|v| v.label).unwrap_or(name);
        let heading = format!("ECMWF EFI | {} | init {}UTC", label, request.time.format("%Y-%m-%d %H"));
        Ok::<_, SynopticError>((gallery, heading, format))
    }
    .await;

    match result {
        Ok((gallery, heading, format)) => {
            info!(
                endpoint = "/efi/gallery",
                request_id = %request_id,
                steps = gallery.len(),
                duration_ms = start.elapsed().as_millis() as u64,
                "EFI gallery served"
            );
            gallery_response(&gallery, &heading, format)
        }
        Err(e) => ApiError::logged(e, "/efi/gallery", &request_id, Some(&query.describe())).into_response(),
    }
}
