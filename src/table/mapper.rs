use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use super::data_type::coerce_value;
use super::geometry::{Geometry, GeometrySpec};
use super::DataType;
use crate::error::{GpkgError, Result};
use crate::types::Value;

/// One CSV record keyed by header.
pub type Row = HashMap<String, String>;

/// An immutable column name to [`DataType`] assignment.
///
/// Built once (from header guesses, user overrides, or both) and only read
/// afterwards.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnTypes {
    types: BTreeMap<String, DataType>,
}

impl ColumnTypes {
    /// Assign every header its guessed type, see [`DataType::guess_from_header`].
    pub fn guess<S: AsRef<str>>(headers: &[S]) -> Self {
        headers
            .iter()
            .map(|header| {
                let header = header.as_ref();
                (header.to_string(), DataType::guess_from_header(header))
            })
            .collect()
    }

    /// A copy of `self` where the given assignments replace existing ones.
    pub fn with_overrides<I>(&self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (String, DataType)>,
    {
        let mut types = self.types.clone();
        types.extend(overrides);
        Self { types }
    }

    pub fn get(&self, column: &str) -> Option<DataType> {
        self.types.get(column).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, DataType)> {
        self.types
            .iter()
            .map(|(name, data_type)| (name.as_str(), *data_type))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl FromIterator<(String, DataType)> for ColumnTypes {
    fn from_iter<T: IntoIterator<Item = (String, DataType)>>(iter: T) -> Self {
        Self {
            types: iter.into_iter().collect(),
        }
    }
}

/// Values of one attribute column, in row order.
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeColumn {
    pub name: String,
    pub data_type: DataType,
    pub values: Vec<Value>,
}

/// Rows with one geometry each plus typed attribute columns, in memory.
#[derive(Clone, Debug, PartialEq)]
pub struct GeoTable {
    pub(super) crs: String,
    pub(super) geometries: Vec<Geometry>,
    pub(super) columns: Vec<AttributeColumn>,
}

impl GeoTable {
    /// CRS identifier such as `"EPSG:4326"`.
    pub fn crs(&self) -> &str {
        &self.crs
    }

    pub fn num_rows(&self) -> usize {
        self.geometries.len()
    }

    /// Attribute columns plus the geometry column.
    pub fn num_columns(&self) -> usize {
        self.columns.len() + 1
    }

    pub fn geometries(&self) -> &[Geometry] {
        &self.geometries
    }

    pub fn columns(&self) -> &[AttributeColumn] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&AttributeColumn> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Attribute values of row `index`, in column order.
    pub fn row_values(&self, index: usize) -> impl Iterator<Item = &Value> {
        self.columns
            .iter()
            .filter_map(move |column| column.values.get(index))
    }
}

/// Build a [`GeoTable`] from CSV rows.
///
/// Rows whose geometry source is empty (the WKT cell, or either of the
/// latitude/longitude cells) are skipped and counted; the count is returned
/// next to the table. Any other failure aborts the whole conversion. Row
/// numbers in errors are 1-based over the data rows.
///
/// Example:
/// ```
/// use std::collections::HashMap;
/// use gpkg_csv::table::{ColumnTypes, GeometrySpec, csv_to_table};
///
/// let headers = vec!["lat".to_string(), "lon".to_string(), "name".to_string()];
/// let column_types = ColumnTypes::guess(&headers);
/// let spec = GeometrySpec::from_column_types(&column_types)?;
///
/// let row: HashMap<String, String> = [("lat", "52.5"), ("lon", "13.4"), ("name", "Berlin")]
///     .into_iter()
///     .map(|(k, v)| (k.to_string(), v.to_string()))
///     .collect();
/// let (table, skipped) = csv_to_table(&headers, &column_types, &spec, "EPSG:4326", [Ok(row)])?;
/// assert_eq!((table.num_rows(), skipped), (1, 0));
/// # Ok::<(), gpkg_csv::GpkgError>(())
/// ```
pub fn csv_to_table<S, I>(
    headers: &[S],
    column_types: &ColumnTypes,
    geometry_spec: &GeometrySpec,
    crs: &str,
    rows: I,
) -> Result<(GeoTable, usize)>
where
    S: AsRef<str>,
    I: IntoIterator<Item = Result<Row>>,
{
    let headers: Vec<&str> = headers.iter().map(|header| header.as_ref()).collect();

    let mut seen = HashSet::with_capacity(headers.len());
    for header in &headers {
        if !seen.insert(header.to_lowercase()) {
            return Err(GpkgError::DuplicateColumn {
                column: header.to_string(),
            });
        }
    }

    for column in geometry_spec.source_columns() {
        if !headers.contains(&column) {
            return Err(GpkgError::MissingGeometryColumn {
                column: column.to_string(),
            });
        }
    }

    let geometry_columns = geometry_spec.source_columns();
    let mut columns = Vec::with_capacity(headers.len());
    for header in &headers {
        if geometry_columns.contains(header) {
            continue;
        }
        let data_type = column_types
            .get(header)
            .ok_or_else(|| GpkgError::MissingColumnType {
                column: header.to_string(),
            })?;
        if data_type.is_geometry_role() {
            // Only the columns named by the geometry spec take part in the
            // geometry; another geometry-role column is a misconfiguration.
            return Err(GpkgError::GeometryRoleNotCoercible {
                column: header.to_string(),
                data_type,
            });
        }
        columns.push(AttributeColumn {
            name: header.to_string(),
            data_type,
            values: Vec::new(),
        });
    }

    let mut geometries = Vec::new();
    let mut skipped = 0;

    for (idx, row) in rows.into_iter().enumerate() {
        let row_number = idx + 1;
        let row = row?;

        let geometry = match geometry_spec {
            GeometrySpec::Wkt(column) => {
                let text = field(&row, column);
                if text.is_empty() {
                    skipped += 1;
                    continue;
                }
                Geometry::from_wkt(text, row_number)?
            }
            GeometrySpec::LatLon {
                latitude,
                longitude,
            } => {
                let lat_text = field(&row, latitude);
                let lon_text = field(&row, longitude);
                if lat_text.is_empty() || lon_text.is_empty() {
                    skipped += 1;
                    continue;
                }
                let lat = parse_coordinate(latitude, lat_text, row_number)?;
                let lon = parse_coordinate(longitude, lon_text, row_number)?;
                Geometry::point(lon, lat)?
            }
        };

        // Coerce the whole row before pushing anything, so columns stay aligned.
        let values = columns
            .iter()
            .map(|column| {
                coerce_value(
                    &column.name,
                    field(&row, &column.name),
                    column.data_type,
                    row_number,
                )
            })
            .collect::<Result<Vec<Value>>>()?;

        geometries.push(geometry);
        for (column, value) in columns.iter_mut().zip(values) {
            column.values.push(value);
        }
    }

    if skipped > 0 {
        debug!(skipped, "skipped rows with an empty geometry");
    }
    debug!(
        rows = geometries.len(),
        columns = columns.len() + 1,
        crs,
        "mapped CSV rows"
    );

    Ok((
        GeoTable {
            crs: crs.to_string(),
            geometries,
            columns,
        },
        skipped,
    ))
}

fn field<'r>(row: &'r Row, column: &str) -> &'r str {
    row.get(column).map(String::as_str).unwrap_or("")
}

fn parse_coordinate(column: &str, value: &str, row: usize) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| GpkgError::MalformedCoordinate {
            column: column.to_string(),
            value: value.to_string(),
            row,
        })
}
