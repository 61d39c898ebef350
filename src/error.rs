use std::error::Error;
use std::fmt;
use std::path::PathBuf;

use crate::table::DataType;

/// Crate error type for CSV mapping and GeoPackage operations.
#[derive(Debug)]
pub enum GpkgError {
    /// Wraps errors returned by `rusqlite`.
    Sql(rusqlite::Error),
    /// Wraps errors returned by the `wkb` crate.
    Wkb(wkb::error::WkbError),
    /// Wraps errors returned by the `csv` reader.
    Csv(csv::Error),
    /// Wraps I/O errors from reading input or writing exports.
    Io(std::io::Error),
    /// The target GeoPackage file already exists.
    FileExists { path: PathBuf },
    /// The GeoPackage file to open does not exist.
    FileNotFound { path: PathBuf },
    /// A geometry type in metadata could not be mapped to a supported WKB geometry type.
    UnsupportedGeometryType(String),
    /// A column type declared in SQLite metadata is not supported by this crate.
    UnsupportedColumnType {
        column: String,
        declared_type: String,
    },
    /// Invalid or mixed `z` / `m` dimension flags in GeoPackage metadata.
    InvalidDimension { z: i8, m: i8 },
    /// Geometries of one table do not share a coordinate dimension.
    MixedDimensions { row: usize },
    /// Geometry blob does not start with the `GP` magic.
    InvalidGpkgGeometryMagic([u8; 2]),
    /// Invalid GeoPackage geometry flags byte.
    InvalidGpkgGeometryFlags(u8),
    /// GeoPackage geometry blob is too short for the fixed header.
    InvalidGpkgGeometryLength { len: usize, minimum: usize },
    /// Dynamic `Value` type did not match the expected conversion target.
    ValueTypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },
    /// Requested feature property does not exist in the feature.
    MissingProperty { property: String },
    /// A layer with the same name already exists.
    LayerAlreadyExists { layer_name: String },
    /// Referenced `srs_id` does not exist in `gpkg_spatial_ref_sys`.
    MissingSpatialRefSysId { srs_id: i32 },
    /// A CRS identifier is not of the form `AUTHORITY:CODE`.
    InvalidCrs(String),
    /// Layer schema has multiple primary key columns, which is unsupported.
    CompositePrimaryKeyUnsupported { layer_name: String },
    /// Layer schema has no primary key column.
    MissingPrimaryKeyColumn { layer_name: String },
    /// A feature row has a `NULL` geometry value.
    NullGeometryValue,
    /// An attribute value could not be coerced to its declared column type.
    InvalidValue {
        column: String,
        value: String,
        data_type: DataType,
        row: usize,
    },
    /// Well-known text in a geometry column could not be parsed.
    MalformedGeometry { row: usize, text: String },
    /// A latitude or longitude value is not a number.
    MalformedCoordinate {
        column: String,
        value: String,
        row: usize,
    },
    /// A geometry-role column type reached scalar coercion.
    GeometryRoleNotCoercible { column: String, data_type: DataType },
    /// A header has no column type assigned.
    MissingColumnType { column: String },
    /// The column types assign neither a geometry column nor a latitude/longitude pair.
    MissingGeometryRole(&'static str),
    /// A column named by the geometry specification is not among the headers.
    MissingGeometryColumn { column: String },
    /// Two headers name the same column (SQLite compares names case-insensitively).
    DuplicateColumn { column: String },
    /// A record has more fields than the header row.
    TooManyFields {
        row: usize,
        expected: usize,
        found: usize,
    },
    /// The column types assign a geometry role more than once.
    AmbiguousGeometryRole(String),
    /// A column type name could not be parsed.
    UnknownDataType(String),
    /// The CSV delimiter could not be inferred from the sample.
    UndecidableDelimiter,
    ReadOnly,
}

impl fmt::Display for GpkgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sql(err) => write!(f, "{err}"),
            Self::Wkb(err) => write!(f, "{err}"),
            Self::Csv(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "{err}"),
            Self::FileExists { path } => {
                write!(f, "GeoPackage file already exists: {}", path.display())
            }
            Self::FileNotFound { path } => {
                write!(f, "GeoPackage file does not exist: {}", path.display())
            }
            Self::UnsupportedGeometryType(ty) => write!(f, "unsupported geometry type: {ty}"),
            Self::UnsupportedColumnType {
                column,
                declared_type,
            } => write!(
                f,
                "unsupported column type for column '{column}': {declared_type}"
            ),
            Self::InvalidDimension { z, m } => {
                write!(f, "invalid or mixed geometry dimension (z={z}, m={m})")
            }
            Self::MixedDimensions { row } => {
                write!(f, "geometry in row {row} has a different dimension from row 1")
            }
            Self::InvalidGpkgGeometryMagic(magic) => {
                write!(f, "not a gpkg geometry blob: magic bytes {magic:02x?}")
            }
            Self::InvalidGpkgGeometryFlags(flags) => {
                write!(f, "invalid gpkg geometry flags: {flags:#04x}")
            }
            Self::InvalidGpkgGeometryLength { len, minimum } => {
                write!(
                    f,
                    "invalid gpkg geometry length: got {len} bytes, expected at least {minimum}"
                )
            }
            Self::ValueTypeMismatch { expected, actual } => {
                write!(f, "expected {expected}, got {actual}")
            }
            Self::MissingProperty { property } => write!(f, "missing property: {property}"),
            Self::LayerAlreadyExists { layer_name } => {
                write!(f, "layer already exists: {layer_name}")
            }
            Self::MissingSpatialRefSysId { srs_id } => {
                write!(f, "srs_id {srs_id} not found in gpkg_spatial_ref_sys")
            }
            Self::InvalidCrs(crs) => {
                write!(f, "invalid CRS identifier '{crs}', expected e.g. 'EPSG:4326'")
            }
            Self::CompositePrimaryKeyUnsupported { layer_name } => write!(
                f,
                "composite primary keys are not supported yet for layer: {layer_name}"
            ),
            Self::MissingPrimaryKeyColumn { layer_name } => {
                write!(f, "no primary key column found for layer: {layer_name}")
            }
            Self::NullGeometryValue => write!(f, "feature has null geometry value"),
            Self::InvalidValue {
                column,
                value,
                data_type,
                row,
            } => write!(
                f,
                "error converting column '{column}' value '{value}' to type {data_type} at line {row}"
            ),
            Self::MalformedGeometry { row, text } => {
                write!(f, "error parsing WKT geometry in row {row}: '{text}'")
            }
            Self::MalformedCoordinate { column, value, row } => write!(
                f,
                "error parsing coordinate column '{column}' value '{value}' at line {row}"
            ),
            Self::GeometryRoleNotCoercible { column, data_type } => write!(
                f,
                "column '{column}' has geometry role {data_type} and cannot hold attribute values"
            ),
            Self::MissingColumnType { column } => {
                write!(f, "no column type assigned for column '{column}'")
            }
            Self::MissingGeometryRole(role) => write!(f, "no {role} column found"),
            Self::MissingGeometryColumn { column } => {
                write!(f, "geometry column '{column}' is not in the CSV header")
            }
            Self::DuplicateColumn { column } => {
                write!(f, "column '{column}' appears more than once in the CSV header")
            }
            Self::TooManyFields {
                row,
                expected,
                found,
            } => write!(
                f,
                "row {row} has {found} fields but the header has only {expected}"
            ),
            Self::AmbiguousGeometryRole(message) => write!(f, "{message}"),
            Self::UnknownDataType(name) => write!(f, "unknown column type: {name}"),
            Self::UndecidableDelimiter => {
                write!(f, "cannot discern the delimiter of the CSV file")
            }
            Self::ReadOnly => write!(f, "operation not allowed on read-only connection"),
        }
    }
}

impl Error for GpkgError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sql(err) => Some(err),
            Self::Wkb(err) => Some(err),
            Self::Csv(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for GpkgError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Sql(err)
    }
}

impl From<wkb::error::WkbError> for GpkgError {
    fn from(err: wkb::error::WkbError) -> Self {
        Self::Wkb(err)
    }
}

impl From<csv::Error> for GpkgError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<std::io::Error> for GpkgError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

pub type Result<T> = std::result::Result<T, GpkgError>;
