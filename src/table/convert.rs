use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{ColumnTypes, CsvSource, DataType, GeometrySpec, csv_to_table, layer_name_from_path};
use crate::crs::{Crs, EPSG_4326};
use crate::error::{GpkgError, Result};
use crate::gpkg::Gpkg;
use crate::validate::is_valid_column_name;

/// Settings for [`convert_csv_file`].
#[derive(Clone, Debug)]
pub struct ConvertOptions {
    /// Field delimiter; sniffed from the file when `None`.
    pub delimiter: Option<u8>,
    /// CRS identifier of the coordinates, e.g. `"EPSG:4326"`.
    pub crs: String,
    /// Layer name; derived from the CSV file name when `None`.
    pub layer_name: Option<String>,
    /// Types that replace the header guesses.
    pub column_types: Vec<(String, DataType)>,
    /// Geometry source; resolved from the column types when `None`.
    pub geometry_spec: Option<GeometrySpec>,
    /// Replace an existing output file instead of failing.
    pub overwrite: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            crs: format!("EPSG:{}", EPSG_4326.code),
            layer_name: None,
            column_types: Vec::new(),
            geometry_spec: None,
            overwrite: false,
        }
    }
}

/// Outcome of [`convert_csv_file`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConvertSummary {
    pub output: PathBuf,
    pub layer_name: String,
    pub rows: usize,
    pub skipped: usize,
}

/// Convert a CSV file into a new GeoPackage holding a single layer.
pub fn convert_csv_file<P, Q>(csv_path: P, gpkg_path: Q, options: &ConvertOptions) -> Result<ConvertSummary>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let csv_path = csv_path.as_ref();
    let gpkg_path = gpkg_path.as_ref();

    // A fresh GeoPackage only ever holds the bundled definitions, so an
    // unknown CRS can be rejected before any work is done.
    let crs = Crs::parse(&options.crs)?;
    if crs.known_srs().is_none() {
        return Err(GpkgError::MissingSpatialRefSysId {
            srs_id: crs.srs_id(),
        });
    }
    if gpkg_path.exists() && !options.overwrite {
        return Err(GpkgError::FileExists {
            path: gpkg_path.to_path_buf(),
        });
    }

    let source = CsvSource::open(csv_path, options.delimiter)?;
    let headers = source.headers().to_vec();
    let column_types = resolve_column_types(&headers, options);
    let geometry_spec = match &options.geometry_spec {
        Some(spec) => spec.clone(),
        None => GeometrySpec::from_column_types(&column_types)?,
    };
    debug!(?geometry_spec, columns = headers.len(), "resolved column types");

    for header in &headers {
        if !is_valid_column_name(header) {
            warn!(column = %header, "column name is not a plain identifier; map servers may reject it");
        }
    }

    let (table, skipped) = csv_to_table(
        &headers,
        &column_types,
        &geometry_spec,
        &options.crs,
        source.rows(),
    )?;

    let layer_name = options
        .layer_name
        .clone()
        .unwrap_or_else(|| layer_name_from_path(csv_path));

    // Build the GeoPackage next to the target and move it into place only once
    // it is complete; a failure leaves any existing output untouched.
    let parent = match gpkg_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let staging = tempfile::Builder::new()
        .prefix(".gpkg-csv-")
        .tempdir_in(parent)?;
    let staged_path = staging.path().join("layer.gpkg");
    let rows = {
        let gpkg = Gpkg::new(&staged_path)?;
        table.write_layer(&gpkg, &layer_name)?
    };
    std::fs::rename(&staged_path, gpkg_path)?;
    debug!(output = %gpkg_path.display(), "moved GeoPackage into place");

    Ok(ConvertSummary {
        output: gpkg_path.to_path_buf(),
        layer_name,
        rows,
        skipped,
    })
}

/// Header guesses, adjusted to an explicit geometry spec, then the explicit
/// per-column types on top.
fn resolve_column_types(headers: &[String], options: &ConvertOptions) -> ColumnTypes {
    let guessed = ColumnTypes::guess(headers);
    let guessed = match &options.geometry_spec {
        None => guessed,
        Some(spec) => {
            let geometry_roles = match spec {
                GeometrySpec::Wkt(column) => vec![(column.clone(), DataType::Geometry)],
                GeometrySpec::LatLon {
                    latitude,
                    longitude,
                } => vec![
                    (latitude.clone(), DataType::Latitude),
                    (longitude.clone(), DataType::Longitude),
                ],
            };
            // Guessed roles the geometry spec does not use fall back to plain text.
            let demoted = guessed
                .iter()
                .filter(|(_, data_type)| data_type.is_geometry_role())
                .map(|(name, _)| (name.to_string(), DataType::Text))
                .collect::<Vec<_>>();
            guessed.with_overrides(demoted.into_iter().chain(geometry_roles))
        }
    };
    guessed.with_overrides(options.column_types.iter().cloned())
}
