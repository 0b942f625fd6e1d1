//! The fixed list of CFSR fields loaded for every reanalysis render.

use crate::fields::Level;
use crate::loader::units::Conversion;

/// One field to load: an alias for the field set, the dataset variable code and a level
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldRequest {
    pub alias: &'static str,
    pub code: &'static str,
    pub level: Level,
    pub conversion: Conversion,
}

const fn req(alias: &'static str, code: &'static str, level: Level, conversion: Conversion) -> FieldRequest {
    FieldRequest {
        alias,
        code,
        level,
        conversion,
    }
}

const fn hpa(level: u32) -> Level {
    Level::Isobaric(level)
}

/// Fields loaded for the reanalysis dashboards, in load order
pub const CFSR_FIELDS: &[FieldRequest] = &[
    // wind
    req("u200", "u", hpa(200), Conversion::None),
    req("v200", "v", hpa(200), Conversion::None),
    req("u500", "u", hpa(500), Conversion::None),
    req("v500", "v", hpa(500), Conversion::None),
    req("u700", "u", hpa(700), Conversion::None),
    req("v700", "v", hpa(700), Conversion::None),
    req("u850", "u", hpa(850), Conversion::None),
    req("v850", "v", hpa(850), Conversion::None),
    req("u925", "u", hpa(925), Conversion::None),
    req("v925", "v", hpa(925), Conversion::None),
    // vertical velocity
    req("w700", "w", hpa(700), Conversion::None),
    // pressure on the 2 PVU surface
    req("pres_pv2", "pres_pv", Level::PotentialVorticity(2.0), Conversion::PascalToHectopascal),
    // geopotential height
    req("gh200", "g", hpa(200), Conversion::None),
    req("gh500", "g", hpa(500), Conversion::None),
    req("gh700", "g", hpa(700), Conversion::None),
    // temperature
    req("t500", "t", hpa(500), Conversion::KelvinToCelsius),
    req("t700", "t", hpa(700), Conversion::KelvinToCelsius),
    req("t850", "t", hpa(850), Conversion::KelvinToCelsius),
    req("t925", "t", hpa(925), Conversion::KelvinToCelsius),
    // specific humidity
    req("q700", "q", hpa(700), Conversion::None),
    req("q850", "q", hpa(850), Conversion::None),
    req("q925", "q", hpa(925), Conversion::None),
    // single level
    req("mslp", "pmsl", Level::Surface, Conversion::PascalToHectopascal),
    req("pwat", "pwat", Level::Surface, Conversion::KgPerSquareMeterToMillimeter),
];

/// Requests grouped by variable code, in order of first appearance
pub fn group_by_code(requests: &[FieldRequest]) -> Vec<(&'static str, Vec<FieldRequest>)> {
    let mut groups: Vec<(&'static str, Vec<FieldRequest>)> = Vec::new();
    for request in requests {
        match groups.iter_mut().find(|(code, _)| *code == request.code) {
            Some((_, members)) => members.push(*request),
            None => groups.push((request.code, vec![*request])),
        }
    }
    groups
}

/// Look up a request by alias
pub fn find(alias: &str) -> Option<&'static FieldRequest> {
    CFSR_FIELDS.iter().find(|r| r.alias == alias)
}
