//! Parameter and level lookup tables.
//!
//! Maps the (discipline, category, number) triplets of the originating
//! model's open-data feed to the short names, descriptions, units and CF
//! standard names carried through to the output store. Parameters outside
//! the table are indexed under a synthetic `unknown_…` name rather than
//! dropped, so feed additions degrade to oddly named variables instead of
//! silently missing ones.

/// Descriptive metadata for one parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamInfo {
    pub short_name: String,
    pub long_name: String,
    pub standard_name: String,
    pub units: String,
}

/// Level family a message belongs to (code table 4.5 condensed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelFamily {
    /// Isobaric levels; the level coordinate is pressure in hPa.
    PressureLevel,
    /// Surface and single-level fields (ground, mean sea level, 2 m, 10 m).
    Surface,
}

impl LevelFamily {
    /// Classify a first-fixed-surface type.
    pub fn from_surface_type(level_type: u8) -> Self {
        match level_type {
            100 => Self::PressureLevel,
            _ => Self::Surface,
        }
    }

    /// Name used to group logical datasets, e.g. "pl" or "sfc".
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PressureLevel => "pl",
            Self::Surface => "sfc",
        }
    }
}

impl std::fmt::Display for LevelFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Look up parameter metadata.
///
/// `level_type`/`level_value` take part because the feed names some fields
/// by their level (2 m temperature is "2t", not "t").
pub fn param_info(
    discipline: u8,
    category: u8,
    number: u8,
    level_type: u8,
    level_value: f64,
) -> ParamInfo {
    let info = |short: &str, long: &str, standard: &str, units: &str| ParamInfo {
        short_name: short.to_string(),
        long_name: long.to_string(),
        standard_name: standard.to_string(),
        units: units.to_string(),
    };

    match (discipline, category, number) {
        (0, 0, 0) => match (level_type, level_value as i64) {
            (103, 2) => info("2t", "2 metre temperature", "air_temperature", "K"),
            _ => info("t", "Temperature", "air_temperature", "K"),
        },
        (0, 0, 17) => info("skt", "Skin temperature", "", "K"),
        (0, 1, 0) => info("q", "Specific humidity", "specific_humidity", "kg kg**-1"),
        (0, 1, 1) => info("r", "Relative humidity", "relative_humidity", "%"),
        (0, 1, 8) => info("tp", "Total precipitation", "precipitation_amount", "kg m**-2"),
        (0, 2, 2) => match (level_type, level_value as i64) {
            (103, 10) => info("10u", "10 metre U wind component", "eastward_wind", "m s**-1"),
            _ => info("u", "U component of wind", "eastward_wind", "m s**-1"),
        },
        (0, 2, 3) => match (level_type, level_value as i64) {
            (103, 10) => info("10v", "10 metre V wind component", "northward_wind", "m s**-1"),
            _ => info("v", "V component of wind", "northward_wind", "m s**-1"),
        },
        (0, 2, 8) => info(
            "w",
            "Vertical velocity",
            "lagrangian_tendency_of_air_pressure",
            "Pa s**-1",
        ),
        (0, 2, 12) => info("vo", "Vorticity (relative)", "atmosphere_relative_vorticity", "s**-1"),
        (0, 2, 13) => info("d", "Divergence", "divergence_of_wind", "s**-1"),
        (0, 3, 0) => match level_type {
            101 => info(
                "msl",
                "Mean sea level pressure",
                "air_pressure_at_mean_sea_level",
                "Pa",
            ),
            _ => info("sp", "Surface pressure", "surface_air_pressure", "Pa"),
        },
        (0, 3, 5) => info("gh", "Geopotential height", "geopotential_height", "gpm"),
        (0, 6, 1) => info("tcc", "Total cloud cover", "cloud_area_fraction", "%"),
        _ => ParamInfo {
            short_name: format!("unknown_{discipline}_{category}_{number}"),
            long_name: format!(
                "Unknown parameter (discipline {discipline}, category {category}, number {number})"
            ),
            standard_name: String::new(),
            units: String::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_named_parameters() {
        assert_eq!(param_info(0, 0, 0, 103, 2.0).short_name, "2t");
        assert_eq!(param_info(0, 0, 0, 100, 85_000.0).short_name, "t");
        assert_eq!(param_info(0, 2, 2, 103, 10.0).short_name, "10u");
        assert_eq!(param_info(0, 3, 0, 101, 0.0).short_name, "msl");
        assert_eq!(param_info(0, 3, 0, 1, 0.0).short_name, "sp");
    }

    #[test]
    fn unknown_parameters_get_synthetic_names() {
        let info = param_info(9, 9, 99, 1, 0.0);
        assert_eq!(info.short_name, "unknown_9_9_99");
        assert!(info.standard_name.is_empty());
    }

    #[test]
    fn level_families() {
        assert_eq!(LevelFamily::from_surface_type(100), LevelFamily::PressureLevel);
        assert_eq!(LevelFamily::from_surface_type(1), LevelFamily::Surface);
        assert_eq!(LevelFamily::from_surface_type(103), LevelFamily::Surface);
        assert_eq!(LevelFamily::PressureLevel.as_str(), "pl");
    }
}
