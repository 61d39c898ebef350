//! Convert delimited text tables into GeoPackage feature layers.
//!
//! ## Overview
//!
//! - [`table::csv_to_table`] maps CSV rows into a [`table::GeoTable`]: one
//!   geometry per row, built from a WKT column or a latitude/longitude pair,
//!   plus typed attribute columns. Rows with an empty geometry are skipped and
//!   counted.
//! - [`table::GeoTable::write_layer`] stores the table as a feature layer of a
//!   [`Gpkg`].
//! - [`validate::validate_gpkg`] and [`export::export_text`] inspect existing
//!   GeoPackages.
//!
//! `Gpkg` is the GeoPackage entry point and supports several open modes:
//!
//! - `Gpkg::open_read_only(path)`: open an existing file without write access.
//! - `Gpkg::open(path)`: open an existing file for read/write.
//! - `Gpkg::new(path)`: create a new file with the mandatory metadata tables.
//! - `Gpkg::new_in_memory()`: create a transient in-memory GeoPackage.
//!
//! ## Converting a file
//!
//! ```no_run
//! use gpkg_csv::table::{ConvertOptions, convert_csv_file};
//!
//! let summary = convert_csv_file("stations.csv", "stations.gpkg", &ConvertOptions::default())?;
//! println!("{} rows written, {} skipped", summary.rows, summary.skipped);
//! # Ok::<(), gpkg_csv::GpkgError>(())
//! ```
//!
//! ## Mapping rows yourself
//!
//! ```
//! use std::collections::HashMap;
//! use gpkg_csv::Gpkg;
//! use gpkg_csv::table::{ColumnTypes, DataType, GeometrySpec, csv_to_table};
//!
//! let headers = vec!["geom".to_string(), "opened".to_string()];
//! let column_types = ColumnTypes::guess(&headers)
//!     .with_overrides([("opened".to_string(), DataType::Date)]);
//! let spec = GeometrySpec::from_column_types(&column_types)?;
//!
//! let rows = vec![
//!     HashMap::from([
//!         ("geom".to_string(), "POINT (13.4 52.5)".to_string()),
//!         ("opened".to_string(), "2023-01-15".to_string()),
//!     ]),
//!     HashMap::from([
//!         ("geom".to_string(), String::new()),
//!         ("opened".to_string(), "2023-02-01".to_string()),
//!     ]),
//! ];
//! let (table, skipped) =
//!     csv_to_table(&headers, &column_types, &spec, "EPSG:4326", rows.into_iter().map(Ok))?;
//! assert_eq!((table.num_rows(), skipped), (1, 1));
//!
//! let gpkg = Gpkg::new_in_memory()?;
//! table.write_layer(&gpkg, "stations")?;
//! assert_eq!(gpkg.list_layers()?, vec!["stations"]);
//! # Ok::<(), gpkg_csv::GpkgError>(())
//! ```
//!
//! ## Reading layers
//!
//! ```no_run
//! use gpkg_csv::{Gpkg, Value};
//! use wkt::to_wkt::write_geometry;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gpkg = Gpkg::open_read_only("stations.gpkg")?;
//!     for layer_name in gpkg.list_layers()? {
//!         let layer = gpkg.open_layer(&layer_name)?;
//!         for feature in layer.features()? {
//!             let geom: wkb::reader::Wkb<'_> = feature.geometry()?;
//!
//!             let mut wkt = String::new();
//!             write_geometry(&mut wkt, &geom)?;
//!             println!("{layer_name}: {wkt}");
//!
//!             for column in &layer.property_columns {
//!                 let value = feature.property(&column.name).unwrap_or(Value::Null);
//!                 println!("  {} = {:?}", column.name, value);
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! `Value` is the crate's owned dynamic value used for feature properties. It
//! mirrors SQLite's dynamic typing and adds the boolean and date variants the
//! CSV mapper produces. Convert using `try_into()` or match directly; the
//! conversion fails on `NULL`.
mod error;
mod gpkg;
mod sql_functions;

mod conversions;
mod ogc_sql;
mod types;

pub mod crs;
pub mod export;
pub mod table;
pub mod validate;

pub use error::{GpkgError, Result};
pub use gpkg::{Gpkg, GpkgFeature, GpkgFeatureIterator, GpkgLayer};
pub use sql_functions::register_spatial_functions;
pub use types::{ColumnSpec, ColumnType, GpkgLayerMetadata, Value};

// Re-export types used in public fields to keep the public API stable.
pub use wkb::reader::{Dimension, GeometryType};
