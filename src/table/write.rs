use tracing::info;
use wkb::reader::{Dimension, GeometryType};

use super::GeoTable;
use crate::conversions::column_type_from_data_type;
use crate::crs::Crs;
use crate::error::{GpkgError, Result};
use crate::gpkg::Gpkg;
use crate::types::ColumnSpec;

/// Name of the geometry column of layers written from a [`GeoTable`].
pub const GEOMETRY_COLUMN: &str = "geom";

impl GeoTable {
    /// Write the table as a new feature layer and return the number of rows.
    ///
    /// Everything happens in one transaction: on error the GeoPackage is left
    /// as it was. EPSG:4326 and EPSG:3857 are registered on demand; any other
    /// CRS has to exist in `gpkg_spatial_ref_sys` already.
    pub fn write_layer(&self, gpkg: &Gpkg, layer_name: &str) -> Result<usize> {
        if gpkg.is_read_only() {
            return Err(GpkgError::ReadOnly);
        }

        let tx = gpkg.connection().unchecked_transaction()?;

        let crs = Crs::parse(&self.crs)?;
        let srs_id = crs.srs_id();
        if !gpkg.has_srs(srs_id)? {
            match crs.known_srs() {
                Some(known) => gpkg.register_known_srs(known)?,
                None => return Err(GpkgError::MissingSpatialRefSysId { srs_id }),
            }
        }

        let (geometry_type, dimension) = self.layer_geometry_type()?;
        let column_specs = self
            .columns
            .iter()
            .map(|column| {
                let column_type = column_type_from_data_type(column.data_type).ok_or_else(|| {
                    GpkgError::GeometryRoleNotCoercible {
                        column: column.name.clone(),
                        data_type: column.data_type,
                    }
                })?;
                Ok(ColumnSpec {
                    name: column.name.clone(),
                    column_type,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let layer = gpkg.new_layer(
            layer_name,
            GEOMETRY_COLUMN.to_string(),
            geometry_type,
            dimension,
            srs_id,
            &column_specs,
        )?;

        for (idx, geometry) in self.geometries.iter().enumerate() {
            layer.insert_wkb(geometry.as_wkb(), self.row_values(idx).cloned())?;
        }
        layer.update_extent()?;

        tx.commit()?;
        info!(
            layer = layer_name,
            rows = self.num_rows(),
            crs = %crs,
            "wrote layer"
        );
        Ok(self.num_rows())
    }

    /// The shared geometry type of all rows (`None` when they differ) and the
    /// shared coordinate dimension.
    fn layer_geometry_type(&self) -> Result<(Option<GeometryType>, Dimension)> {
        let Some(first) = self.geometries.first() else {
            return Ok((None, Dimension::Xy));
        };

        let mut geometry_type = Some(first.geometry_type());
        for (idx, geometry) in self.geometries.iter().enumerate().skip(1) {
            if geometry.dimension() != first.dimension() {
                return Err(GpkgError::MixedDimensions { row: idx + 1 });
            }
            if geometry_type != Some(geometry.geometry_type()) {
                geometry_type = None;
            }
        }
        Ok((geometry_type, first.dimension()))
    }
}
