//! Ordered panel lists and the gallery assembler.
//!
//! A dashboard is a fixed, ordered list of [`PanelSpec`]s. [`assemble`]
//! renders them in that order and skips (but records) any panel whose
//! inputs are missing or whose render failed.

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Result, SynopticError};
use crate::fields::FieldSet;
use crate::region::BoundingBox;
use crate::render::{MapRenderer, PanelKind};

/// Everything one render needs from the caller
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub time: NaiveDateTime,
    pub bbox: BoundingBox,
    /// Only render these labels; `None` renders every panel
    pub panels: Option<Vec<String>>,
    /// The single variable of a per-variable dashboard
    pub variable: Option<String>,
    /// Data source named in panel titles
    pub source: String,
}

impl RenderRequest {
    pub fn new(time: NaiveDateTime, bbox: BoundingBox) -> Self {
        Self {
            time,
            bbox,
            panels: None,
            variable: None,
            source: "CFSR".to_string(),
        }
    }

    pub fn with_panels(mut self, panels: Vec<String>) -> Self {
        self.panels = Some(panels);
        self
    }

    pub fn with_variable(mut self, variable: impl Into<String>) -> Self {
        self.variable = Some(variable.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}

/// One chart of a dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelSpec {
    pub label: String,
    /// Title text between the source and the time
    pub head: String,
    pub kind: PanelKind,
}

impl PanelSpec {
    pub fn new(label: impl Into<String>, head: impl Into<String>, kind: PanelKind) -> Self {
        Self {
            label: label.into(),
            head: head.into(),
            kind,
        }
    }

    pub fn requires(&self) -> Vec<String> {
        self.kind.requires()
    }

    /// `"<source> | <head> | <YYYY-MM-DD HH>UTC"`
    pub fn title(&self, request: &RenderRequest) -> String {
        format!(
            "{} | {} | {}UTC",
            request.source,
            self.head,
            request.time.format("%Y-%m-%d %H")
        )
    }
}

/// The composite chart; its title carries the valid time on a second line
pub fn composite_panel() -> PanelSpec {
    PanelSpec::new("Synoptic_Composite", "Synoptic Composite", PanelKind::Composite)
}

/// Title of the composite chart
pub fn composite_title(time: NaiveDateTime) -> String {
    format!("Synoptic Composite \nValid: {}", time.format("%Y-%m-%d %H%M UTC"))
}

/// The reanalysis gallery, in display order
pub fn reanalysis_panels() -> Vec<PanelSpec> {
    use PanelKind::*;
    vec![
        PanelSpec::new("2PVU_Surface_Pressure", "2PVU Surface Pressure", PvSurfacePressure),
        PanelSpec::new("200hPa_Wind", "200hPa Wind | GH", UpperWind { level: 200 }),
        PanelSpec::new("500hPa_Height", "500hPa GH | T", HeightTemperature { level: 500 }),
        PanelSpec::new("500hPa_Vorticity", "500hPa Wind | Vorticity | GH", Vorticity { level: 500 }),
        PanelSpec::new(
            "700hPa_Vertical_Velocity",
            "700hPa Vertical Velocity | Wind | GH",
            VerticalVelocity { level: 700 },
        ),
        PanelSpec::new("700hPa_Wind", "700hPa Wind | 500hPa GH", Wind { level: 700 }),
        PanelSpec::new("700hPa_Temperature", "700hPa T | 500hPa GH", Temperature { level: 700 }),
        PanelSpec::new(
            "700hPa_Relative_Humidity",
            "700hPa RH | Wind | 500hPa GH",
            RelativeHumidity { level: 700 },
        ),
        PanelSpec::new("850hPa_Wind", "850hPa Wind | 500hPa GH", Wind { level: 850 }),
        PanelSpec::new("850hPa_Temperature", "850hPa T | 500hPa GH", Temperature { level: 850 }),
        PanelSpec::new(
            "850hPa_Relative_Humidity",
            "850hPa RH | Wind | 500hPa GH",
            RelativeHumidity { level: 850 },
        ),
        PanelSpec::new(
            "850hPa_Specific_Humidity",
            "850hPa SP | Wind | 500hPa GH",
            SpecificHumidity { level: 850 },
        ),
        PanelSpec::new("925hPa_Temperature", "925hPa T | 500hPa GH", Temperature { level: 925 }),
        PanelSpec::new("925hPa_Wind", "925hPa Wind | 500hPa GH", Wind { level: 925 }),
        PanelSpec::new(
            "925hPa_Relative_Humidity",
            "925hPa RH | Wind | 500hPa GH",
            RelativeHumidity { level: 925 },
        ),
        PanelSpec::new(
            "925hPa_Specific_Humidity",
            "925hPa SP | Wind | 500hPa GH",
            SpecificHumidity { level: 925 },
        ),
        PanelSpec::new("Precipitable_Water", "Precipitable Water | 500hPa GH", PrecipitableWater),
        PanelSpec::new("Mean_Sea_Level_Pressure", "MSLP | 500hPa GH", MeanSeaLevelPressure),
    ]
}

/// A rendered panel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GalleryImage {
    pub title: String,
    #[serde(skip)]
    pub png: Vec<u8>,
}

/// A panel that was not rendered, and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingPanel {
    pub label: String,
    pub reason: String,
}

/// Rendered panels in declaration order
#[derive(Debug, Clone, Default, Serialize)]
pub struct Gallery {
    images: IndexMap<String, GalleryImage>,
    missing: Vec<MissingPanel>,
}

impl Gallery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_image(&mut self, label: impl Into<String>, image: GalleryImage) {
        self.images.insert(label.into(), image);
    }

    pub fn push_missing(&mut self, label: impl Into<String>, reason: impl Into<String>) {
        self.missing.push(MissingPanel {
            label: label.into(),
            reason: reason.into(),
        });
    }

    pub fn get(&self, label: &str) -> Option<&GalleryImage> {
        self.images.get(label)
    }

    /// Rendered labels in order
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.images.keys().map(String::as_str)
    }

    pub fn images(&self) -> impl Iterator<Item = (&str, &GalleryImage)> {
        self.images.iter().map(|(label, image)| (label.as_str(), image))
    }

    pub fn missing(&self) -> &[MissingPanel] {
        &self.missing
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Apply the request's panel filter, keeping declaration order
pub fn select_panels<'a>(panels: &'a [PanelSpec], filter: Option<&[String]>) -> Result<Vec<&'a PanelSpec>> {
    let Some(wanted) = filter else {
        return Ok(panels.iter().collect());
    };
    if let Some(unknown) = wanted.iter().find(|w| !panels.iter().any(|p| &p.label == *w)) {
        return Err(SynopticError::InvalidParameter {
            param: "panels".to_string(),
            message: format!("Unknown panel: {}", unknown),
        });
    }
    Ok(panels.iter().filter(|p| wanted.contains(&p.label)).collect())
}

/// Render each panel in order. Missing inputs and render failures skip the
/// panel; only an unknown label in the filter is an error.
pub fn assemble(
    panels: &[PanelSpec],
    fields: &FieldSet,
    renderer: &dyn MapRenderer,
    request: &RenderRequest,
) -> Result<Gallery> {
    let selected = select_panels(panels, request.panels.as_deref())?;
    let mut gallery = Gallery::new();

    for panel in selected {
        if let Some(alias) = panel.requires().into_iter().find(|a| !fields.contains(a)) {
            warn!(panel = %panel.label, alias = %alias, "Skipping panel with missing input");
            gallery.push_missing(&panel.label, format!("missing field {}", alias));
            continue;
        }

        match renderer.render(panel, fields, request) {
            Ok(png) => {
                debug!(panel = %panel.label, "Added panel to gallery");
                gallery.push_image(
                    &panel.label,
                    GalleryImage {
                        title: panel.title(request),
                        png,
                    },
                );
            }
            Err(e) => {
                warn!(panel = %panel.label, error = %e, "Skipping panel that failed to render");
                gallery.push_missing(&panel.label, e.to_string());
            }
        }
    }

    Ok(gallery)
}
