//! What each kind of chart draws, layer by layer.

use serde::Serialize;

use super::canvas::Canvas;
use super::extrema::find_extrema;
use super::sample::Bilinear;
use super::styles;
use crate::derive;
use crate::error::Result;
use crate::fields::{FieldSet, GridField};

/// The chart types, each with fixed inputs and styling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PanelKind {
    /// Pressure on the 2 PVU surface
    PvSurfacePressure,
    /// Jet-level wind speed, arrows and height
    UpperWind { level: u32 },
    /// Height contours over temperature
    HeightTemperature { level: u32 },
    /// Smoothed relative vorticity with wind and height
    Vorticity { level: u32 },
    VerticalVelocity { level: u32 },
    /// Wind speed and arrows under 500 hPa height
    Wind { level: u32 },
    Temperature { level: u32 },
    RelativeHumidity { level: u32 },
    SpecificHumidity { level: u32 },
    PrecipitableWater,
    MeanSeaLevelPressure,
    /// The multi-layer synoptic composite
    Composite,
    /// EFI fill with optional SOT contours for one forecast step
    ExtremeForecastIndex { step: usize },
}

fn at(name: &str, level: u32) -> String {
    format!("{}{}", name, level)
}

/// Field set alias of the EFI grid for a forecast step
pub fn efi_alias(step: usize) -> String {
    format!("efi_{}", step)
}

/// Field set alias of the SOT grid for a forecast step; optional
pub fn sot_alias(step: usize) -> String {
    format!("sot_{}", step)
}

impl PanelKind {
    /// Aliases that must be present to draw the panel
    pub fn requires(&self) -> Vec<String> {
        let wind = |l: u32| vec![at("u", l), at("v", l)];
        let gh500 = || "gh500".to_string();
        match *self {
            PanelKind::PvSurfacePressure => vec!["pres_pv2".to_string()],
            PanelKind::UpperWind { level } | PanelKind::Vorticity { level } => {
                let mut needs = wind(level);
                needs.push(at("gh", level));
                needs
            }
            PanelKind::HeightTemperature { level } => vec![at("gh", level), at("t", level)],
            PanelKind::VerticalVelocity { level } => {
                let mut needs = wind(level);
                needs.extend([at("w", level), at("gh", level)]);
                needs
            }
            PanelKind::Wind { level } => {
                let mut needs = wind(level);
                needs.push(gh500());
                needs
            }
            PanelKind::Temperature { level } => vec![at("t", level), gh500()],
            PanelKind::RelativeHumidity { level } => {
                let mut needs = wind(level);
                needs.extend([at("t", level), at("q", level), gh500()]);
                needs
            }
            PanelKind::SpecificHumidity { level } => {
                let mut needs = wind(level);
                needs.extend([at("q", level), gh500()]);
                needs
            }
            PanelKind::PrecipitableWater => vec!["pwat".to_string(), gh500()],
            PanelKind::MeanSeaLevelPressure => vec!["mslp".to_string(), gh500()],
            PanelKind::Composite => ["t850", "u200", "v200", "u500", "v500", "mslp", "gh500", "u850", "v850", "pwat"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            PanelKind::ExtremeForecastIndex { step } => vec![efi_alias(step)],
        }
    }
}

/// Draw every layer of a panel onto the canvas
pub fn draw_panel(kind: &PanelKind, canvas: &mut Canvas, fields: &FieldSet) -> Result<()> {
    let sampler = Bilinear;
    match *kind {
        PanelKind::PvSurfacePressure => {
            let table = styles::pv_pressure_fill()?;
            canvas.fill(fields.require("pres_pv2")?, &table, &sampler);
            canvas.colorbar(&table);
        }
        PanelKind::UpperWind { level } => {
            let (u, v) = wind(fields, level)?;
            let table = styles::wind200_fill()?;
            canvas.fill(&derive::wind_speed(u, v)?, &table, &sampler);
            canvas.colorbar(&table);
            canvas.quiver(u, v, &sampler, &styles::PANEL_QUIVER);
            heights(canvas, fields.require(&at("gh", level))?, level);
        }
        PanelKind::HeightTemperature { level } => {
            let table = styles::temperature_fill()?;
            canvas.fill(fields.require(&at("t", level))?, &table, &sampler);
            canvas.colorbar(&table);
            heights(canvas, fields.require(&at("gh", level))?, level);
        }
        PanelKind::Vorticity { level } => {
            let (u, v) = wind(fields, level)?;
            let vort = derive::smoothed_vorticity(u, v, derive::DEFAULT_VORTICITY_SIGMA)?;
            let table = styles::vorticity_fill()?;
            canvas.fill(&vort, &table, &sampler);
            canvas.colorbar(&table);
            canvas.quiver(u, v, &sampler, &styles::PANEL_QUIVER);
            heights(canvas, fields.require(&at("gh", level))?, level);
        }
        PanelKind::VerticalVelocity { level } => {
            let (u, v) = wind(fields, level)?;
            let table = styles::vertical_velocity_fill()?;
            canvas.fill(fields.require(&at("w", level))?, &table, &sampler);
            canvas.colorbar(&table);
            canvas.quiver(u, v, &sampler, &styles::PANEL_QUIVER);
            heights(canvas, fields.require(&at("gh", level))?, level);
        }
        PanelKind::Wind { level } => {
            let (u, v) = wind(fields, level)?;
            let table = styles::wind_fill()?;
            canvas.fill(&derive::wind_speed(u, v)?, &table, &sampler);
            canvas.colorbar(&table);
            canvas.quiver(u, v, &sampler, &styles::PANEL_QUIVER);
            heights(canvas, fields.require("gh500")?, 500);
        }
        PanelKind::Temperature { level } => {
            let table = styles::temperature_fill()?;
            let t = fields.require(&at("t", level))?;
            canvas.fill(t, &table, &sampler);
            canvas.colorbar(&table);
            canvas.contour(t, &styles::isotherm_levels(), &styles::ISOTHERM_LINE);
            heights(canvas, fields.require("gh500")?, 500);
        }
        PanelKind::RelativeHumidity { level } => {
            let (u, v) = wind(fields, level)?;
            let rh = derive::relative_humidity(
                level as f64,
                fields.require(&at("t", level))?,
                fields.require(&at("q", level))?,
            )?;
            let table = styles::relative_humidity_fill()?;
            canvas.fill(&rh, &table, &sampler);
            canvas.colorbar(&table);
            canvas.quiver(u, v, &sampler, &styles::PANEL_QUIVER);
            heights(canvas, fields.require("gh500")?, 500);
        }
        PanelKind::SpecificHumidity { level } => {
            let (u, v) = wind(fields, level)?;
            let q = derive::scale(fields.require(&at("q", level))?, 1000.0, "g/kg");
            let table = styles::specific_humidity_fill()?;
            canvas.fill(&q, &table, &sampler);
            canvas.colorbar(&table);
            canvas.quiver(u, v, &sampler, &styles::PANEL_QUIVER);
            heights(canvas, fields.require("gh500")?, 500);
        }
        PanelKind::PrecipitableWater => {
            let table = styles::pwat_fill()?;
            canvas.fill(fields.require("pwat")?, &table, &sampler);
            canvas.colorbar(&table);
            heights(canvas, fields.require("gh500")?, 500);
        }
        PanelKind::MeanSeaLevelPressure => {
            let mslp = fields.require("mslp")?;
            let table = styles::mslp_fill()?;
            canvas.fill(mslp, &table, &sampler);
            canvas.colorbar(&table);
            heights(canvas, fields.require("gh500")?, 500);
            canvas.mark_extrema(&find_extrema(mslp, styles::EXTREMA_RADIUS));
        }
        PanelKind::Composite => draw_composite(canvas, fields)?,
        PanelKind::ExtremeForecastIndex { step } => {
            let table = styles::efi_fill()?;
            canvas.fill(fields.require(&efi_alias(step))?, &table, &sampler);
            canvas.colorbar(&table);
            if let Some(sot) = fields.get(&sot_alias(step)) {
                canvas.contour(sot, &styles::SOT_LEVELS, &styles::SOT_LINE);
            }
        }
    }
    canvas.draw_border();
    Ok(())
}

/// Fills first, then contours, arrows and pressure centres on top
fn draw_composite(canvas: &mut Canvas, fields: &FieldSet) -> Result<()> {
    let sampler = Bilinear;

    canvas.fill(fields.require("t850")?, &styles::t850_fill()?, &sampler);

    let pwat = styles::pwat_fill()?;
    canvas.fill(fields.require("pwat")?, &pwat, &sampler);
    canvas.colorbar(&pwat);

    let (u200, v200) = wind(fields, 200)?;
    let jet = styles::wind200_fill()?;
    canvas.fill(&derive::wind_speed(u200, v200)?, &jet, &sampler);
    canvas.colorbar(&jet);

    let (u500, v500) = wind(fields, 500)?;
    let vort = derive::smoothed_vorticity(u500, v500, derive::DEFAULT_VORTICITY_SIGMA)?;
    let vort_table = styles::vorticity_fill()?;
    canvas.fill(&vort, &vort_table, &sampler);
    canvas.colorbar(&vort_table);

    let mslp = fields.require("mslp")?;
    canvas.contour(mslp, &styles::mslp_levels(), &styles::MSLP_LINE);
    canvas.contour(
        &derive::to_decameters(fields.require("gh500")?),
        &styles::gh500_levels(),
        &styles::GH500_LINE,
    );

    let (u850, v850) = wind(fields, 850)?;
    canvas.quiver(u850, v850, &sampler, &styles::WIND850_QUIVER);
    canvas.mark_extrema(&find_extrema(mslp, styles::EXTREMA_RADIUS));
    Ok(())
}

fn wind(fields: &FieldSet, level: u32) -> Result<(&GridField, &GridField)> {
    Ok((fields.require(&at("u", level))?, fields.require(&at("v", level))?))
}

fn heights(canvas: &mut Canvas, gh: &GridField, level: u32) {
    let line = if level == 500 {
        styles::GH500_LINE
    } else {
        styles::HEIGHT_LINE
    };
    canvas.contour(&derive::to_decameters(gh), &styles::height_levels(level), &line);
}
