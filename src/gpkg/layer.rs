use crate::Value;
use crate::error::{GpkgError, Result};
use crate::ogc_sql::{sql_insert_feature, sql_select_features, sql_update_extent};
use crate::table::has_non_finite_coord;
use crate::types::ColumnSpec;
use geo_traits::GeometryTrait;
use rusqlite::{Row, params_from_iter, types::Type};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::{Gpkg, GpkgFeature, GpkgFeatureIterator, wkb_to_gpkg_geometry};

#[derive(Debug)]
/// A GeoPackage layer with geometry metadata and column specs.
pub struct GpkgLayer<'a> {
    pub(super) conn: &'a Gpkg,
    pub layer_name: String,
    pub geometry_column: String,
    pub primary_key_column: String,
    /// `None` for a layer declared with the generic `GEOMETRY` type.
    pub geometry_type: Option<wkb::reader::GeometryType>,
    pub geometry_dimension: wkb::reader::Dimension,
    pub srs_id: i32,
    pub property_columns: Vec<ColumnSpec>,
    pub(super) property_index_by_name: Arc<HashMap<String, usize>>,
    pub(super) insert_sql: String,
}

// When issueing the SELECT query, always place these columns first so that
// we don't need to find the positions every time.
const GEOMETRY_INDEX: usize = 0;
const PRIMARY_INDEX: usize = 1;

impl<'a> GpkgLayer<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        conn: &'a Gpkg,
        layer_name: &str,
        geometry_column: String,
        primary_key_column: String,
        geometry_type: Option<wkb::reader::GeometryType>,
        geometry_dimension: wkb::reader::Dimension,
        srs_id: i32,
        property_columns: Vec<ColumnSpec>,
    ) -> Self {
        let insert_sql = Self::build_insert_sql(layer_name, &geometry_column, &property_columns);
        let property_index_by_name = Arc::new(Self::build_property_index_by_name(&property_columns));

        Self {
            conn,
            layer_name: layer_name.to_string(),
            geometry_column,
            primary_key_column,
            geometry_type,
            geometry_dimension,
            srs_id,
            property_columns,
            property_index_by_name,
            insert_sql,
        }
    }

    /// Iterate over features in the layer in primary key order.
    ///
    /// Example:
    /// ```no_run
    /// use gpkg_csv::Gpkg;
    ///
    /// let gpkg = Gpkg::open_read_only("data/example.gpkg")?;
    /// let layer = gpkg.open_layer("points")?;
    /// for feature in layer.features()? {
    ///     let _id = feature.id();
    ///     let _geom = feature.geometry()?;
    /// }
    /// # Ok::<(), gpkg_csv::GpkgError>(())
    /// ```
    pub fn features(&self) -> Result<GpkgFeatureIterator> {
        self.query_features(None)
    }

    /// Like [`GpkgLayer::features`], but reads at most `limit` rows.
    pub fn features_limited(&self, limit: u32) -> Result<GpkgFeatureIterator> {
        self.query_features(Some(limit))
    }

    fn query_features(&self, limit: Option<u32>) -> Result<GpkgFeatureIterator> {
        let columns = self.property_columns.iter().map(|spec| spec.name.as_str());

        let sql = sql_select_features(
            &self.layer_name,
            &self.geometry_column,
            &self.primary_key_column,
            columns,
            limit,
        );
        let mut stmt = self.conn.connection().prepare(&sql)?;
        let features = stmt
            .query_map([], |row| self.row_to_feature(row))?
            .collect::<std::result::Result<Vec<GpkgFeature>, _>>()?;

        Ok(GpkgFeatureIterator {
            features: features.into_iter(),
        })
    }

    fn row_to_feature(&self, row: &Row<'_>) -> rusqlite::Result<GpkgFeature> {
        let mut id: Option<i64> = None;
        let mut geometry: Option<Vec<u8>> = None;
        let mut properties = Vec::with_capacity(self.property_columns.len());
        let row_len = self.property_columns.len() + 2;

        for idx in 0..row_len {
            let value_ref = row.get_ref(idx)?;
            let value = Value::from(value_ref);

            if idx == GEOMETRY_INDEX {
                match value {
                    Value::Blob(bytes) => geometry = Some(bytes),
                    Value::Null => geometry = None,
                    _ => {
                        return Err(rusqlite::Error::InvalidColumnType(
                            idx,
                            self.geometry_column.clone(),
                            value_ref.data_type(),
                        ));
                    }
                }
            } else if idx == PRIMARY_INDEX {
                match value {
                    Value::Integer(value) => id = Some(value),
                    _ => {
                        return Err(rusqlite::Error::InvalidColumnType(
                            idx,
                            self.primary_key_column.clone(),
                            value_ref.data_type(),
                        ));
                    }
                }
            } else {
                properties.push(value);
            }
        }

        let id = id.ok_or_else(|| {
            rusqlite::Error::InvalidColumnType(
                PRIMARY_INDEX,
                self.primary_key_column.clone(),
                Type::Null,
            )
        })?;

        Ok(GpkgFeature {
            id,
            geometry,
            properties,
            property_index_by_name: Arc::clone(&self.property_index_by_name),
        })
    }

    /// Insert a feature with geometry and ordered property values.
    ///
    /// Example:
    /// ```no_run
    /// use geo_types::Point;
    /// use gpkg_csv::{Gpkg, Value};
    ///
    /// let gpkg = Gpkg::open("data/example.gpkg")?;
    /// let layer = gpkg.open_layer("points")?;
    ///
    /// let properties = vec![Value::Text("alpha".to_string()), Value::Integer(1)];
    /// layer.insert(Point::new(1.0, 2.0), properties)?;
    /// # Ok::<(), gpkg_csv::GpkgError>(())
    /// ```
    pub fn insert<G, P>(&self, geometry: G, properties: P) -> Result<()>
    where
        G: GeometryTrait<T = f64>,
        P: IntoIterator<Item = Value>,
    {
        let wkb = wkb_from_geometry(&geometry)?;
        self.insert_wkb(&wkb, properties)
    }

    /// Insert a feature whose geometry is already encoded as WKB.
    pub fn insert_wkb<P>(&self, wkb: &[u8], properties: P) -> Result<()>
    where
        P: IntoIterator<Item = Value>,
    {
        self.ensure_writable()?;
        let geom = wkb_to_gpkg_geometry(wkb, self.srs_id);

        let params = std::iter::once(Value::Blob(geom)).chain(properties);

        let mut stmt = self.conn.connection().prepare_cached(&self.insert_sql)?;
        stmt.execute(params_from_iter(params))?;
        Ok(())
    }

    /// Record the bounding box of all geometries in `gpkg_contents`.
    pub fn update_extent(&self) -> Result<()> {
        self.ensure_writable()?;
        let sql = sql_update_extent(&self.layer_name, &self.geometry_column);
        self.conn.connection().execute(&sql, [&self.layer_name])?;
        debug!(layer = %self.layer_name, "updated layer extent");
        Ok(())
    }

    /// Count geometries with NaN or infinite coordinates, e.g. `POINT(nan nan)`
    /// produced from a `nan` latitude. Map servers reject these.
    pub fn count_invalid_geometries(&self) -> Result<usize> {
        let mut invalid = 0;
        for feature in self.features()? {
            let geometry = match feature.geometry() {
                Ok(geometry) => geometry,
                Err(GpkgError::NullGeometryValue) => continue,
                Err(err) => return Err(err),
            };
            if has_non_finite_coord(&geometry) {
                invalid += 1;
            }
        }
        Ok(invalid)
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.conn.is_read_only() {
            return Err(GpkgError::ReadOnly);
        }
        Ok(())
    }

    pub(crate) fn build_insert_sql(
        layer_name: &str,
        geometry_column: &str,
        property_columns: &[ColumnSpec],
    ) -> String {
        let columns = std::iter::once(geometry_column)
            .chain(property_columns.iter().map(|spec| spec.name.as_str()));
        sql_insert_feature(layer_name, columns)
    }

    pub(crate) fn build_property_index_by_name(
        property_columns: &[ColumnSpec],
    ) -> HashMap<String, usize> {
        let mut property_index_by_name = HashMap::with_capacity(property_columns.len());
        for (idx, column) in property_columns.iter().enumerate() {
            property_index_by_name.insert(column.name.clone(), idx);
        }
        property_index_by_name
    }
}

fn wkb_from_geometry<G>(geometry: &G) -> Result<Vec<u8>>
where
    G: GeometryTrait<T = f64>,
{
    let mut buf = Vec::new();
    wkb::writer::write_geometry(&mut buf, geometry, &Default::default())?;
    Ok(buf)
}
