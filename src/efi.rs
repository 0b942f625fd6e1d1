//! The extreme forecast index dashboard.
//!
//! Each initialisation time is a directory `{data_dir}/{YYYYMMDDHH}` holding
//! `{YYYYMMDDHH}.EFI.240.nc`. Variables are laid out `(step, lat, lon)` as
//! `efi_<short>` and `sot_<short>`, with `step_start` and `step_end` giving
//! each step range in hours. The file is staged into a temp directory
//! before reading.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::dashboard::{join_error, RenderStats};
use crate::error::{Result, SynopticError};
use crate::fields::{FieldKey, FieldSet, Level};
use crate::gallery::{self, Gallery, PanelSpec, RenderRequest};
use crate::loader::{decode, FieldCache};
use crate::region::{parse_init_time, resolve_region, BoundingBox, RegionPresets, TimeRange};
use crate::render::panels::{efi_alias, sot_alias};
use crate::render::{MapRenderer, PanelKind, RenderScope};

/// Initialisation times offered to the form
pub const MAX_INIT_TIMES: usize = 20;

/// Staged files older than this are removed
pub const DEFAULT_STAGE_RETENTION: Duration = Duration::from_secs(7 * 86_400);

/// An EFI variable: form label and the short name used in the file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EfiVariable {
    pub label: &'static str,
    pub short_name: &'static str,
}

const fn var(label: &'static str, short_name: &'static str) -> EfiVariable {
    EfiVariable { label, short_name }
}

pub const EFI_VARIABLES: &[EfiVariable] = &[
    var("Total precipitation", "tpi"),
    var("Mean 2m temperature", "2ti"),
    var("Maximum 2m temperature", "mx2ti"),
    var("Minimum 2m temperature", "mn2ti"),
    var("10m wind speed", "10wsi"),
    var("Maximum wind gust", "10fgi"),
    var("CAPE-shear", "capesi"),
    var("CAPE", "capei"),
    var("Snowfall", "sfi"),
];

/// Look up a variable by short name or label, ignoring case
pub fn find_variable(name: &str) -> Option<&'static EfiVariable> {
    let name = name.trim();
    EFI_VARIABLES
        .iter()
        .find(|v| v.short_name.eq_ignore_ascii_case(name) || v.label.eq_ignore_ascii_case(name))
}

/// File name of the EFI archive for an initialisation time
pub fn file_name(init: &str) -> String {
    format!("{}.EFI.240.nc", init)
}

/// Panel title head for a variable and step range
fn panel_head(variable: &EfiVariable, start: i64, end: i64) -> String {
    format!(
        "Extreme forecast index and Shift of Tails (black contours 0,1,2,4,8) for {} | T+{}-{}h",
        variable.label, start, end
    )
}

/// EFI galleries from a local archive of converted ECMWF files
#[derive(Clone)]
pub struct EfiDashboard {
    data_dir: PathBuf,
    temp_dir: PathBuf,
    retention: Duration,
    renderer: Arc<dyn MapRenderer>,
    presets: RegionPresets,
    range: TimeRange,
    stats: Arc<RenderStats>,
}

impl EfiDashboard {
    pub fn new(
        data_dir: impl Into<PathBuf>,
        temp_dir: impl Into<PathBuf>,
        renderer: Arc<dyn MapRenderer>,
        presets: RegionPresets,
        stats: Arc<RenderStats>,
    ) -> Self {
        Self {
            data_dir: data_dir.into(),
            temp_dir: temp_dir.into(),
            retention: DEFAULT_STAGE_RETENTION,
            renderer,
            presets,
            range: TimeRange::efi(),
            stats,
        }
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn presets(&self) -> &RegionPresets {
        &self.presets
    }

    /// The newest initialisation directories, newest first
    pub fn init_times(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.data_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(dir = %self.data_dir.display(), "EFI data directory does not exist");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.len() == 10 && name.bytes().all(|b| b.is_ascii_digit()))
            .collect();
        names.sort_unstable_by(|a, b| b.cmp(a));
        names.truncate(MAX_INIT_TIMES);
        Ok(names)
    }

    /// Validate form input into a request
    pub fn request(&self, init: &str, variable: &str, region: &str, now: NaiveDateTime) -> Result<RenderRequest> {
        let time = parse_init_time(init, &self.range, now)?;
        let variable = find_variable(variable).ok_or_else(|| SynopticError::InvalidParameter {
            param: "variable".to_string(),
            message: format!("Unknown EFI variable: {}", variable),
        })?;
        let bbox = resolve_region(&self.presets, region)?;
        Ok(RenderRequest::new(time, bbox)
            .with_variable(variable.short_name)
            .with_source("ECMWF"))
    }

    /// One panel per forecast step range, in file order
    pub async fn gallery(&self, request: &RenderRequest) -> Result<Gallery> {
        let variable = request
            .variable
            .as_deref()
            .and_then(find_variable)
            .ok_or_else(|| SynopticError::InvalidParameter {
                param: "variable".to_string(),
                message: "an EFI variable is required".to_string(),
            })?;

        let scope = self.renderer.render_lock().acquire().await;
        let start = Instant::now();
        let result = self.gallery_locked(scope, request, variable).await;
        match &result {
            Ok(gallery) => {
                self.stats.record_success(gallery.len(), gallery.missing().len());
                info!(
                    init = %request.time,
                    variable = variable.short_name,
                    steps = gallery.len(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "EFI gallery assembled"
                );
            }
            Err(e) => {
                warn!(error = %e, variable = variable.short_name, "EFI render failed");
                self.stats.record_failure();
            }
        }
        result
    }

    /// Stage, read and draw in one blocking task that owns the lock scope
    async fn gallery_locked(
        &self,
        scope: RenderScope,
        request: &RenderRequest,
        variable: &'static EfiVariable,
    ) -> Result<Gallery> {
        let init = request.time.format("%Y%m%d%H").to_string();
        let (data_dir, temp_dir, retention) = (self.data_dir.clone(), self.temp_dir.clone(), self.retention);
        let renderer = Arc::clone(&self.renderer);
        let request = request.clone();
        tokio::task::spawn_blocking(move || {
            let _scope = scope;
            let staged = stage(&data_dir, &temp_dir, retention, &init)?;
            let (fields, panels) = read_steps(&staged, variable, &request.bbox, request.time)?;
            gallery::assemble(&panels, &fields, renderer.as_ref(), &request)
        })
        .await
        .map_err(join_error)?
    }
}

/// Copy the archive file for `init` into `temp_dir` unless it is already
/// there, after removing staged files older than `retention`.
///
/// The copy lands under a `.part` name and is renamed into place, so an
/// interrupted copy is never mistaken for a staged file.
pub fn stage(data_dir: &Path, temp_dir: &Path, retention: Duration, init: &str) -> Result<PathBuf> {
    let cache = FieldCache::new(temp_dir, retention);
    cache.ensure_dir()?;
    let removed = cache.prune()?;
    if removed > 0 {
        info!(dir = %temp_dir.display(), removed = removed, "Pruned staged EFI files");
    }

    let name = file_name(init);
    let staged = cache.file_path(&name);
    if staged.is_file() {
        return Ok(staged);
    }

    let source = data_dir.join(init).join(&name);
    if !source.is_file() {
        return Err(SynopticError::unavailable(
            "efi",
            init,
            format!("data file not found: {}", source.display()),
        ));
    }
    let partial = cache.file_path(&format!("{}.part", name));
    fs::copy(&source, &partial)?;
    fs::rename(&partial, &staged)?;
    info!(from = %source.display(), to = %staged.display(), "Staged EFI file");
    Ok(staged)
}

/// Read every step of a variable; SOT is optional
fn read_steps(
    path: &Path,
    variable: &EfiVariable,
    bbox: &BoundingBox,
    init: NaiveDateTime,
) -> Result<(FieldSet, Vec<PanelSpec>)> {
    let efi_name = format!("efi_{}", variable.short_name);
    let sot_name = format!("sot_{}", variable.short_name);

    let efi = decode::read_steps(path, &efi_name, bbox)?;
    let sot = match decode::read_steps(path, &sot_name, bbox) {
        Ok(sot) if sot.len() == efi.len() => sot,
        Ok(sot) => {
            warn!(variable = %sot_name, steps = sot.len(), expected = efi.len(), "Ignoring SOT with mismatched steps");
            Vec::new()
        }
        Err(e) => {
            warn!(variable = %sot_name, error = %e, "Drawing EFI without SOT contours");
            Vec::new()
        }
    };

    let starts = decode::read_axis(path, "step_start")?;
    let ends = decode::read_axis(path, "step_end")?;
    if starts.len() != efi.len() || ends.len() != efi.len() {
        return Err(SynopticError::unavailable(
            efi_name,
            "all steps",
            format!(
                "{} grids but {} step starts and {} step ends",
                efi.len(),
                starts.len(),
                ends.len()
            ),
        ));
    }

    let mut fields = FieldSet::new();
    let mut panels = Vec::with_capacity(efi.len());
    let mut sot = sot.into_iter();
    for (step, efi_field) in efi.into_iter().enumerate() {
        let (start, end) = (starts[step].round() as i64, ends[step].round() as i64);
        let key = |name: &str| FieldKey {
            variable: name.to_string(),
            level: Level::Surface,
            time: init,
        };
        fields.insert(efi_alias(step), key(&efi_name), efi_field);
        if let Some(sot_field) = sot.next() {
            fields.insert(sot_alias(step), key(&sot_name), sot_field);
        }
        panels.push(PanelSpec::new(
            format!("{}-{}", start, end),
            panel_head(variable, start, end),
            PanelKind::ExtremeForecastIndex { step },
        ));
    }

    Ok((fields, panels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::global_regions;
    use crate::render::{Projection, RasterRenderer};
    use chrono::NaiveDate;
    use std::fs::File;
    use std::time::SystemTime;
    use tempfile::tempdir;

    fn write_efi(path: &Path, with_sot: bool) {
        let mut file = netcdf::create(path).unwrap();
        file.add_dimension("step", 3).unwrap();
        file.add_dimension("lat", 5).unwrap();
        file.add_dimension("lon", 6).unwrap();

        let mut lat = file.add_variable::<f64>("lat", &["lat"]).unwrap();
        lat.put_values(&[60.0, 45.0, 30.0, 15.0, 0.0], ..).unwrap();
        let mut lon = file.add_variable::<f64>("lon", &["lon"]).unwrap();
        lon.put_values(&[60.0, 80.0, 100.0, 120.0, 140.0, 160.0], ..).unwrap();
        let mut start = file.add_variable::<f64>("step_start", &["step"]).unwrap();
        start.put_values(&[0.0, 24.0, 48.0], ..).unwrap();
        let mut end = file.add_variable::<f64>("step_end", &["step"]).unwrap();
        end.put_values(&[24.0, 48.0, 72.0], ..).unwrap();

        let values: Vec<f32> = (0..90).map(|i| ((i % 30) as f32 / 15.0) - 1.0).collect();
        let mut efi = file.add_variable::<f32>("efi_tpi", &["step", "lat", "lon"]).unwrap();
        efi.put_values(&values, ..).unwrap();
        if with_sot {
            let sot_values: Vec<f32> = (0..90).map(|i| (i % 30) as f32 / 3.0).collect();
            let mut sot = file.add_variable::<f32>("sot_tpi", &["step", "lat", "lon"]).unwrap();
            sot.put_values(&sot_values, ..).unwrap();
        }
    }

    fn dashboard(data: &Path, temp: &Path) -> EfiDashboard {
        let renderer = Arc::new(RasterRenderer::new(120, 90, Projection::PlateCarree));
        EfiDashboard::new(data, temp, renderer, global_regions(), Arc::new(RenderStats::default()))
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap()
    }

    #[test]
    fn test_find_variable() {
        assert_eq!(find_variable("tpi").map(|v| v.label), Some("Total precipitation"));
        assert_eq!(find_variable("cape").map(|v| v.short_name), Some("capei"));
        assert!(find_variable("rain").is_none());
        assert_eq!(EFI_VARIABLES.len(), 9);
    }

    #[test]
    fn test_init_times_newest_first_and_capped() {
        let data = tempdir().unwrap();
        for day in 1..=25u32 {
            fs::create_dir(data.path().join(format!("202009{:02}00", day))).unwrap();
        }
        fs::create_dir(data.path().join("latest")).unwrap();
        fs::create_dir(data.path().join("20200930001")).unwrap();
        File::create(data.path().join("2020093012")).unwrap();

        let dash = dashboard(data.path(), data.path());
        let times = dash.init_times().unwrap();
        assert_eq!(times.len(), MAX_INIT_TIMES);
        assert_eq!(times[0], "2020092500");
        assert_eq!(times[19], "2020090600");
    }

    #[test]
    fn test_init_times_without_data_dir() {
        let dash = dashboard(Path::new("/nonexistent/efi"), Path::new("/nonexistent/tmp"));
        assert!(dash.init_times().unwrap().is_empty());
    }

    #[test]
    fn test_stage_copies_once_and_prunes_old_files() {
        let data = tempdir().unwrap();
        let temp = tempdir().unwrap();
        fs::create_dir(data.path().join("2020093000")).unwrap();
        fs::write(data.path().join("2020093000").join(file_name("2020093000")), b"efi").unwrap();

        let old = temp.path().join(file_name("2020091000"));
        fs::write(&old, b"old").unwrap();
        let file = File::options().write(true).open(&old).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(8 * 86_400))
            .unwrap();

        let staged = stage(data.path(), temp.path(), DEFAULT_STAGE_RETENTION, "2020093000").unwrap();
        assert_eq!(fs::read(&staged).unwrap(), b"efi");
        assert!(!old.exists());

        // already staged: the archive copy is not read again
        fs::remove_file(data.path().join("2020093000").join(file_name("2020093000"))).unwrap();
        assert!(stage(data.path(), temp.path(), DEFAULT_STAGE_RETENTION, "2020093000").is_ok());
    }

    #[test]
    fn test_interrupted_copy_is_not_staged() {
        let data = tempdir().unwrap();
        let temp = tempdir().unwrap();
        fs::create_dir(data.path().join("2020093000")).unwrap();
        fs::write(data.path().join("2020093000").join(file_name("2020093000")), b"complete").unwrap();

        let leftover = temp.path().join(format!("{}.part", file_name("2020093000")));
        fs::write(&leftover, b"comp").unwrap();

        let staged = stage(data.path(), temp.path(), DEFAULT_STAGE_RETENTION, "2020093000").unwrap();
        assert_eq!(staged, temp.path().join(file_name("2020093000")));
        assert_eq!(fs::read(&staged).unwrap(), b"complete");
        assert!(!leftover.exists());
    }

    #[test]
    fn test_stage_missing_file_is_unavailable() {
        let data = tempdir().unwrap();
        let temp = tempdir().unwrap();
        let err = stage(data.path(), temp.path(), DEFAULT_STAGE_RETENTION, "2020093000").unwrap_err();
        assert!(matches!(err, SynopticError::DataUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_gallery_has_one_panel_per_step() {
        let data = tempdir().unwrap();
        let temp = tempdir().unwrap();
        let init_dir = data.path().join("2020093000");
        fs::create_dir(&init_dir).unwrap();
        write_efi(&init_dir.join(file_name("2020093000")), true);

        let dash = dashboard(data.path(), temp.path());
        let request = dash.request("2020093000", "tpi", "60,160,0,60", now()).unwrap();
        let gallery = dash.gallery(&request).await.unwrap();

        let labels: Vec<&str> = gallery.labels().collect();
        assert_eq!(labels, vec!["0-24", "24-48", "48-72"]);
        let title = &gallery.get("24-48").unwrap().title;
        assert!(title.starts_with("ECMWF | Extreme forecast index and Shift of Tails"));
        assert!(title.contains("for Total precipitation | T+24-48h"));
        assert!(title.ends_with("2020-09-30 00UTC"));
    }

    #[tokio::test]
    async fn test_gallery_without_sot_still_renders() {
        let data = tempdir().unwrap();
        let temp = tempdir().unwrap();
        let init_dir = data.path().join("2020093012");
        fs::create_dir(&init_dir).unwrap();
        write_efi(&init_dir.join(file_name("2020093012")), false);

        let dash = dashboard(data.path(), temp.path());
        let request = dash.request("2020093012", "Total precipitation", "60,160,0,60", now()).unwrap();
        let gallery = dash.gallery(&request).await.unwrap();
        assert_eq!(gallery.len(), 3);
        assert!(gallery.missing().is_empty());
    }

    #[test]
    fn test_request_rejects_unknown_variable() {
        let dash = dashboard(Path::new("/tmp"), Path::new("/tmp"));
        let err = dash.request("2020093000", "rain", "60,160,0,60", now()).unwrap_err();
        assert!(err.is_validation());
    }
}
