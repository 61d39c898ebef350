//! Checks for GeoPackage content that map servers refuse to import.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::Result;
use crate::gpkg::Gpkg;

static VALID_COLUMN_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("column name pattern is valid")
});

/// Whether `name` is a plain identifier: a letter or `_`, then letters, digits or `_`.
pub fn is_valid_column_name(name: &str) -> bool {
    VALID_COLUMN_NAME.is_match(name)
}

/// Findings for one entry of `gpkg_contents`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerReport {
    pub table_name: String,
    pub identifier: String,
    /// Geometries with NaN or infinite coordinates.
    pub invalid_geometries: usize,
    pub invalid_column_names: Vec<String>,
}

impl LayerReport {
    pub fn error_count(&self) -> usize {
        self.invalid_geometries + self.invalid_column_names.len()
    }

    fn display_name(&self) -> &str {
        if self.identifier.is_empty() {
            &self.table_name
        } else {
            &self.identifier
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub layers: Vec<LayerReport>,
}

impl ValidationReport {
    pub fn error_count(&self) -> usize {
        self.layers.iter().map(LayerReport::error_count).sum()
    }

    pub fn is_valid(&self) -> bool {
        self.error_count() == 0
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for layer in &self.layers {
            let name = layer.display_name();
            if layer.invalid_geometries > 0 {
                writeln!(
                    f,
                    "  - Found {} invalid geometries in {name}",
                    layer.invalid_geometries
                )?;
            }
            for column in &layer.invalid_column_names {
                writeln!(
                    f,
                    "  - Column '{column}' in layer '{name}' is not a valid column name"
                )?;
            }
        }
        match self.error_count() {
            0 => write!(f, "No errors found"),
            n => write!(f, "Found {n} errors"),
        }
    }
}

/// Inspect every layer of `gpkg`.
///
/// Feature layers are checked for geometries with non-finite coordinates
/// (`POINT(nan nan)` and the like); all tables are checked for column names
/// that are not plain identifiers.
pub fn validate_gpkg(gpkg: &Gpkg) -> Result<ValidationReport> {
    let mut layers = Vec::new();
    for metadata in gpkg.layer_metadata()? {
        debug!(layer = %metadata.table_name, "validating layer");

        let invalid_geometries = if metadata.data_type == "features" {
            gpkg.open_layer(&metadata.table_name)?
                .count_invalid_geometries()?
        } else {
            0
        };
        let invalid_column_names = gpkg
            .column_names(&metadata.table_name)?
            .into_iter()
            .filter(|name| !is_valid_column_name(name))
            .collect();

        layers.push(LayerReport {
            table_name: metadata.table_name,
            identifier: metadata.identifier,
            invalid_geometries,
            invalid_column_names,
        });
    }
    Ok(ValidationReport { layers })
}

#[cfg(test)]
mod tests {
    use super::{is_valid_column_name, validate_gpkg};
    use crate::types::{ColumnSpec, ColumnType};
    use crate::{Gpkg, Value};
    use geo_types::Point;
    use wkb::reader::{Dimension, GeometryType};

    #[test]
    fn accepts_plain_identifiers_only() {
        for name in ["fid", "geom", "_x", "Col_1"] {
            assert!(is_valid_column_name(name), "{name}");
        }
        for name in ["", "1col", "col 1", "höhe", "a-b", "col.1"] {
            assert!(!is_valid_column_name(name), "{name}");
        }
    }

    #[test]
    fn clean_gpkg_has_no_errors() -> crate::Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        let layer = gpkg.new_layer(
            "points",
            "geom".to_string(),
            Some(GeometryType::Point),
            Dimension::Xy,
            4326,
            &[],
        )?;
        layer.insert(Point::new(1.0, 2.0), [])?;

        let report = validate_gpkg(&gpkg)?;
        assert_eq!(report.layers.len(), 1);
        assert!(report.is_valid());
        assert_eq!(report.to_string(), "No errors found");
        Ok(())
    }

    #[test]
    fn reports_nan_points_and_bad_column_names() -> crate::Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        let columns = vec![
            ColumnSpec {
                name: "station name".to_string(),
                column_type: ColumnType::Varchar,
            },
            ColumnSpec {
                name: "2nd".to_string(),
                column_type: ColumnType::Integer,
            },
        ];
        let layer = gpkg.new_layer(
            "points",
            "geom".to_string(),
            Some(GeometryType::Point),
            Dimension::Xy,
            4326,
            &columns,
        )?;
        layer.insert(Point::new(1.0, 2.0), [Value::from("a"), Value::from(1_i64)])?;
        layer.insert(
            Point::new(f64::NAN, f64::NAN),
            [Value::from("b"), Value::from(2_i64)],
        )?;

        let report = validate_gpkg(&gpkg)?;
        let points = &report.layers[0];
        assert_eq!(points.invalid_geometries, 1);
        assert_eq!(points.invalid_column_names, vec!["station name", "2nd"]);
        assert_eq!(report.error_count(), 3);

        let text = report.to_string();
        assert!(text.contains("Found 1 invalid geometries in points"));
        assert!(text.contains("Column 'station name' in layer 'points'"));
        assert!(text.ends_with("Found 3 errors"));
        Ok(())
    }
}
