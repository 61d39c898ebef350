//! GeoPackage container surface backed by rusqlite.
//!
//! Creates containers with the mandatory metadata tables, writes feature layers
//! with an R-tree spatial index, and reads layers back for validation and export.

mod feature;
mod gpkg;
mod layer;

pub use feature::{GpkgFeature, GpkgFeatureIterator};
pub use gpkg::Gpkg;
pub use layer::GpkgLayer;

pub(crate) use feature::{gpkg_geometry_to_wkb, wkb_to_gpkg_geometry};
