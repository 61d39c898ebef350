//! CSV rows to an in-memory geospatial table, and from there to a GeoPackage layer.
//!
//! [`csv_to_table`] is the core: it coerces each column to its assigned
//! [`DataType`], builds one geometry per row from a WKT column or a
//! latitude/longitude pair, and counts rows skipped for an empty geometry.

mod convert;
mod csv_source;
mod data_type;
mod geometry;
mod mapper;
mod write;

pub use convert::{ConvertOptions, ConvertSummary, convert_csv_file};
pub use csv_source::{CANDIDATE_DELIMITERS, CsvSource, layer_name_from_path, sniff_delimiter};
pub use data_type::{DATE_FORMAT, DATETIME_FORMAT, DataType, coerce_value};
pub use geometry::{Geometry, GeometrySpec, has_non_finite_coord};
pub(crate) use geometry::for_each_position;
pub use mapper::{AttributeColumn, ColumnTypes, GeoTable, Row, csv_to_table};
pub use write::GEOMETRY_COLUMN;
