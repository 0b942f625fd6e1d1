//! Conversion of loaded fields to the canonical display units.

use tracing::warn;

use crate::fields::GridField;

/// The unit conversion applied to a field after loading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// Keep native units
    None,
    /// K to °C
    KelvinToCelsius,
    /// Pa to hPa
    PascalToHectopascal,
    /// kg m-2 to mm of liquid water (numerically equal)
    KgPerSquareMeterToMillimeter,
}

impl Conversion {
    /// Units of the converted field
    pub fn target_units(&self) -> Option<&'static str> {
        match self {
            Conversion::None => None,
            Conversion::KelvinToCelsius => Some("degC"),
            Conversion::PascalToHectopascal => Some("hPa"),
            Conversion::KgPerSquareMeterToMillimeter => Some("mm"),
        }
    }

    /// Whether `units` already names the target unit
    fn already_converted(&self, units: &str) -> bool {
        let units = units.trim().to_ascii_lowercase();
        match self {
            Conversion::None => true,
            Conversion::KelvinToCelsius => {
                matches!(units.as_str(), "degc" | "celsius" | "c" | "deg_c" | "°c")
            }
            Conversion::PascalToHectopascal => matches!(units.as_str(), "hpa" | "mb" | "mbar"),
            Conversion::KgPerSquareMeterToMillimeter => units == "mm",
        }
    }

    /// Whether `units` names the source unit of the conversion
    fn is_source_unit(&self, units: &str) -> bool {
        let units = units.trim().to_ascii_lowercase();
        match self {
            Conversion::None => false,
            Conversion::KelvinToCelsius => matches!(units.as_str(), "k" | "kelvin" | "degk" | "deg_k"),
            Conversion::PascalToHectopascal => matches!(units.as_str(), "pa" | "pascal" | "pascals"),
            Conversion::KgPerSquareMeterToMillimeter => {
                matches!(units.as_str(), "kg m-2" | "kg.m-2" | "kg/m2" | "kg/m^2" | "kg m**-2")
            }
        }
    }

    /// Apply the conversion to fields in the source unit.
    ///
    /// Fields already in the target unit pass through. So do fields with a
    /// missing or unrecognised unit, with a warning.
    pub fn apply(&self, field: GridField) -> GridField {
        let Some(target) = self.target_units() else {
            return field;
        };
        if self.already_converted(field.units()) {
            return field;
        }
        if !self.is_source_unit(field.units()) {
            warn!(units = %field.units(), target = target, "Unrecognised units, leaving field unconverted");
            return field;
        }

        match self {
            Conversion::None => field,
            Conversion::KelvinToCelsius => field.map(|v| v - 273.15, target),
            Conversion::PascalToHectopascal => field.map(|v| v / 100.0, target),
            Conversion::KgPerSquareMeterToMillimeter => field.map(|v| v, target),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn field(value: f32, units: &str) -> GridField {
        GridField::new(array![[value]], vec![0.0], vec![0.0], units).unwrap()
    }

    #[test]
    fn test_kelvin_to_celsius() {
        let converted = Conversion::KelvinToCelsius.apply(field(273.15, "K"));
        assert!(converted.values()[[0, 0]].abs() < 1e-4);
        assert_eq!(converted.units(), "degC");
    }

    #[test]
    fn test_pascal_to_hectopascal() {
        let converted = Conversion::PascalToHectopascal.apply(field(101325.0, "Pa"));
        assert!((converted.values()[[0, 0]] - 1013.25).abs() < 1e-3);
        assert_eq!(converted.units(), "hPa");
    }

    #[test]
    fn test_precipitable_water_relabels_units() {
        let converted = Conversion::KgPerSquareMeterToMillimeter.apply(field(42.0, "kg m-2"));
        assert_eq!(converted.values()[[0, 0]], 42.0);
        assert_eq!(converted.units(), "mm");
    }

    #[test]
    fn test_already_converted_fields_are_untouched() {
        let converted = Conversion::KelvinToCelsius.apply(field(12.0, "degC"));
        assert_eq!(converted.values()[[0, 0]], 12.0);

        let converted = Conversion::PascalToHectopascal.apply(field(1000.0, "hPa"));
        assert_eq!(converted.values()[[0, 0]], 1000.0);
    }

    #[test]
    fn test_unknown_units_are_not_converted() {
        let converted = Conversion::KelvinToCelsius.apply(field(12.0, ""));
        assert_eq!(converted.values()[[0, 0]], 12.0);
        assert_eq!(converted.units(), "");

        let converted = Conversion::PascalToHectopascal.apply(field(1000.0, "1"));
        assert_eq!(converted.values()[[0, 0]], 1000.0);
        assert_eq!(converted.units(), "1");
    }

    #[test]
    fn test_none_keeps_native_units() {
        let converted = Conversion::None.apply(field(0.008, "kg/kg"));
        assert_eq!(converted.units(), "kg/kg");
    }
}
