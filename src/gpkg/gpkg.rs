use crate::conversions::{
    column_type_from_str, column_type_to_str, dimension_from_zm, dimension_to_zm,
    geometry_type_from_str, geometry_type_to_str,
};
use crate::crs::KnownSrs;
use crate::error::{GpkgError, Result};
use crate::ogc_sql::{
    RtreeIndex, SQL_INSERT_GPKG_CONTENTS, SQL_INSERT_GPKG_GEOMETRY_COLUMNS,
    SQL_INSERT_RTREE_EXTENSION, SQL_INSERT_SRS, SQL_LIST_LAYERS, SQL_SELECT_GEOMETRY_COLUMN_META,
    SQL_SELECT_LAYER_METADATA, SQL_SRS_EXISTS, initialize_gpkg, quote_ident, sql_create_table,
    sql_table_columns,
};
use crate::sql_functions::register_spatial_functions;
use crate::types::{ColumnSpec, ColumnSpecs, GpkgLayerMetadata};
use rusqlite::OpenFlags;
use std::path::Path;
use tracing::debug;

use super::layer::GpkgLayer;

#[derive(Debug)]
/// GeoPackage connection wrapper for reading and writing feature layers.
pub struct Gpkg {
    conn: rusqlite::Connection,
    read_only: bool,
}

impl Gpkg {
    /// Open a GeoPackage in read-only mode.
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(GpkgError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let conn = rusqlite::Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        register_spatial_functions(&conn)?;
        Ok(Self {
            conn,
            read_only: true,
        })
    }

    /// Open a GeoPackage in read-write mode.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(GpkgError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let conn = rusqlite::Connection::open(path)?;
        register_spatial_functions(&conn)?;
        Ok(Self {
            conn,
            read_only: false,
        })
    }

    /// Create a new GeoPackage
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Err(GpkgError::FileExists {
                path: path.to_path_buf(),
            });
        }

        let conn = rusqlite::Connection::open(path)?;

        initialize_gpkg(&conn)?;
        register_spatial_functions(&conn)?;
        debug!(path = %path.display(), "created GeoPackage");

        Ok(Self {
            conn,
            read_only: false,
        })
    }

    /// Create a new GeoPackage in memory
    pub fn new_in_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory()?;

        initialize_gpkg(&conn)?;
        register_spatial_functions(&conn)?;

        Ok(Self {
            conn,
            read_only: false,
        })
    }

    /// Expert-only: register a spatial reference system in gpkg_spatial_ref_sys.
    ///
    /// GeoPackage layers must reference a valid `srs_id` that already exists in
    /// `gpkg_spatial_ref_sys`, and the row needs a full WKT `definition`. This
    /// crate only bundles EPSG:4326 and EPSG:3857 (see [`crate::crs`]), so any
    /// other system has to be inserted here before a layer can use it.
    ///
    /// No validation of the WKT or authority fields is done.
    ///
    /// ```
    /// # use gpkg_csv::Gpkg;
    /// let gpkg = Gpkg::new_in_memory().expect("new gpkg");
    /// let srs = gpkg_csv::crs::EPSG_3857;
    /// gpkg.register_srs(srs.srs_name, srs.code, "EPSG", srs.code, srs.definition, srs.description)
    ///     .expect("register srs");
    /// assert!(gpkg.has_srs(3857).expect("query srs"));
    /// ```
    pub fn register_srs(
        &self,
        srs_name: &str,
        srs_id: i32,
        organization: &str,
        organization_coordsys_id: i32,
        definition: &str,
        description: &str,
    ) -> Result<()> {
        if self.read_only {
            return Err(GpkgError::ReadOnly);
        }

        self.conn.execute(
            SQL_INSERT_SRS,
            rusqlite::params![
                srs_name,
                srs_id,
                organization,
                organization_coordsys_id,
                definition,
                description
            ],
        )?;
        Ok(())
    }

    /// Register one of the bundled SRS definitions under its EPSG code.
    pub fn register_known_srs(&self, srs: KnownSrs) -> Result<()> {
        self.register_srs(
            srs.srs_name,
            srs.code,
            "EPSG",
            srs.code,
            srs.definition,
            srs.description,
        )
    }

    /// Whether `srs_id` exists in `gpkg_spatial_ref_sys`.
    pub fn has_srs(&self, srs_id: i32) -> Result<bool> {
        let exists: i64 = self
            .conn
            .query_row(SQL_SRS_EXISTS, rusqlite::params![srs_id], |row| row.get(0))?;
        Ok(exists != 0)
    }

    /// List the names of the layers.
    pub fn list_layers(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(SQL_LIST_LAYERS)?;
        let layers = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(layers)
    }

    /// Describe every entry in `gpkg_contents`, with bounds and CRS.
    pub fn layer_metadata(&self) -> Result<Vec<GpkgLayerMetadata>> {
        let mut stmt = self.conn.prepare(SQL_SELECT_LAYER_METADATA)?;
        let layers = stmt
            .query_map([], |row| {
                let min_x: Option<f64> = row.get(4)?;
                let min_y: Option<f64> = row.get(5)?;
                let max_x: Option<f64> = row.get(6)?;
                let max_y: Option<f64> = row.get(7)?;
                let srs_id: i32 = row.get(8)?;
                let organization: String = row.get(9)?;

                let bounds = match (min_x, min_y, max_x, max_y) {
                    (Some(min_x), Some(min_y), Some(max_x), Some(max_y)) => {
                        Some((min_x, min_y, max_x, max_y))
                    }
                    _ => None,
                };

                Ok(GpkgLayerMetadata {
                    table_name: row.get(0)?,
                    data_type: row.get(1)?,
                    identifier: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    description: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    bounds,
                    srs: format!("{organization}:{srs_id}"),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(layers)
    }

    /// Names of all columns of a table, in declaration order.
    pub fn column_names(&self, layer_name: &str) -> Result<Vec<String>> {
        let query = sql_table_columns(layer_name);
        let mut stmt = self.conn.prepare(&query)?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Load a layer definition and metadata by name.
    pub fn open_layer<'a>(&'a self, layer_name: &str) -> Result<GpkgLayer<'a>> {
        let (geometry_column, geometry_type, geometry_dimension, srs_id) =
            self.get_geometry_column_and_srs_id(layer_name)?;
        let column_specs = self.get_column_specs(layer_name)?;
        let property_columns = column_specs
            .other_columns
            .into_iter()
            .filter(|spec| spec.name != geometry_column)
            .collect();

        Ok(GpkgLayer::new(
            self,
            layer_name,
            geometry_column,
            column_specs.primary_key,
            geometry_type,
            geometry_dimension,
            srs_id,
            property_columns,
        ))
    }

    /// Create a new feature layer with an `fid` primary key and an R-tree index.
    pub fn new_layer<'a>(
        &'a self,
        layer_name: &str,
        geometry_column: String,
        geometry_type: Option<wkb::reader::GeometryType>,
        geometry_dimension: wkb::reader::Dimension,
        srs_id: i32,
        other_column_specs: &[ColumnSpec],
    ) -> Result<GpkgLayer<'a>> {
        if self.read_only {
            return Err(GpkgError::ReadOnly);
        }

        if self.list_layers()?.iter().any(|name| name == layer_name) {
            return Err(GpkgError::LayerAlreadyExists {
                layer_name: layer_name.to_string(),
            });
        }

        if !self.has_srs(srs_id)? {
            return Err(GpkgError::MissingSpatialRefSysId { srs_id });
        }

        let geometry_type_name = geometry_type_to_str(geometry_type);
        let (z, m) = dimension_to_zm(geometry_dimension);

        let mut column_defs = Vec::with_capacity(other_column_specs.len() + 2);
        column_defs.push("fid INTEGER PRIMARY KEY AUTOINCREMENT".to_string());
        column_defs.push(format!("{} {geometry_type_name}", quote_ident(&geometry_column)));
        for spec in other_column_specs {
            let col_type = column_type_to_str(spec.column_type);
            column_defs.push(format!("{} {col_type}", quote_ident(&spec.name)));
        }

        let create_sql = sql_create_table(layer_name, &column_defs.join(", "));
        self.conn.execute_batch(&create_sql)?;

        self.conn.execute(
            SQL_INSERT_GPKG_CONTENTS,
            rusqlite::params![layer_name, layer_name, srs_id],
        )?;
        self.conn.execute(
            SQL_INSERT_GPKG_GEOMETRY_COLUMNS,
            rusqlite::params![
                layer_name,
                geometry_column,
                geometry_type_name,
                srs_id,
                z,
                m
            ],
        )?;

        RtreeIndex {
            table: layer_name,
            geometry_column: &geometry_column,
            id_column: "fid",
        }
        .install(&self.conn)?;
        self.conn.execute(
            SQL_INSERT_RTREE_EXTENSION,
            rusqlite::params![layer_name, geometry_column],
        )?;
        debug!(layer = layer_name, geometry_type = geometry_type_name, srs_id, "created layer");

        Ok(GpkgLayer::new(
            self,
            layer_name,
            geometry_column,
            "fid".to_string(),
            geometry_type,
            geometry_dimension,
            srs_id,
            other_column_specs.to_vec(),
        ))
    }

    pub(crate) fn connection(&self) -> &rusqlite::Connection {
        &self.conn
    }

    pub(crate) fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Resolve the table columns and map SQLite types.
    pub(crate) fn get_column_specs(&self, layer_name: &str) -> Result<ColumnSpecs> {
        let query = sql_table_columns(layer_name);
        let mut stmt = self.conn.prepare(&query)?;

        let rows = stmt
            .query_map([], |row| {
                let name: String = row.get(0)?;
                let column_type_str: String = row.get(1)?;
                let primary_key: i32 = row.get(2)?;
                Ok((name, column_type_str, primary_key != 0))
            })?
            .collect::<std::result::Result<Vec<(String, String, bool)>, _>>()?;

        let mut primary_key: Option<String> = None;
        let mut other_columns = Vec::new();
        for (name, column_type_str, is_primary_key) in rows {
            if is_primary_key {
                if primary_key.is_some() {
                    return Err(GpkgError::CompositePrimaryKeyUnsupported {
                        layer_name: layer_name.to_string(),
                    });
                }
                primary_key = Some(name);
                continue;
            }

            // cf. https://www.geopackage.org/spec140/index.html#_sqlite_container
            let column_type = column_type_from_str(&column_type_str).ok_or_else(|| {
                GpkgError::UnsupportedColumnType {
                    column: name.clone(),
                    declared_type: column_type_str.clone(),
                }
            })?;
            other_columns.push(ColumnSpec { name, column_type });
        }

        let primary_key = primary_key.ok_or_else(|| GpkgError::MissingPrimaryKeyColumn {
            layer_name: layer_name.to_string(),
        })?;

        Ok(ColumnSpecs {
            primary_key,
            other_columns,
        })
    }

    /// Resolve the geometry column metadata and SRS information for a layer.
    pub(crate) fn get_geometry_column_and_srs_id(
        &self,
        layer_name: &str,
    ) -> Result<(
        String,
        Option<wkb::reader::GeometryType>,
        wkb::reader::Dimension,
        i32,
    )> {
        let mut stmt = self.conn.prepare(SQL_SELECT_GEOMETRY_COLUMN_META)?;

        let (geometry_column, geometry_type_str, z, m, srs_id) =
            stmt.query_one([layer_name], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i8>(2)?,
                    row.get::<_, i8>(3)?,
                    row.get::<_, i32>(4)?,
                ))
            })?;

        let geometry_type = geometry_type_from_str(&geometry_type_str)?;
        let geometry_dimension = dimension_from_zm(z, m)?;

        Ok((geometry_column, geometry_type, geometry_dimension, srs_id))
    }
}

#[cfg(test)]
mod tests {
    use super::Gpkg;
    use crate::error::GpkgError;
    use crate::types::{ColumnSpec, ColumnType};
    use geo_types::Point;
    use wkb::reader::{Dimension, GeometryType};

    #[test]
    fn new_layer_requires_existing_srs() {
        let gpkg = Gpkg::new_in_memory().expect("new gpkg");
        let columns: Vec<ColumnSpec> = Vec::new();
        let err = gpkg
            .new_layer(
                "missing_srs",
                "geom".to_string(),
                Some(GeometryType::Point),
                Dimension::Xy,
                9999,
                &columns,
            )
            .expect_err("missing srs should fail");

        assert!(matches!(
            err,
            GpkgError::MissingSpatialRefSysId { srs_id: 9999 }
        ));
    }

    #[test]
    fn new_layer_rejects_duplicate_name() -> crate::Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        gpkg.new_layer("points", "geom".to_string(), None, Dimension::Xy, 4326, &[])?;
        let err = gpkg
            .new_layer("points", "geom".to_string(), None, Dimension::Xy, 4326, &[])
            .expect_err("duplicate layer should fail");
        assert!(matches!(err, GpkgError::LayerAlreadyExists { .. }));
        Ok(())
    }

    #[test]
    fn new_fails_if_file_exists() {
        let file = tempfile::NamedTempFile::new().expect("temp file");
        let err = Gpkg::new(file.path()).expect_err("existing file should fail");
        assert!(matches!(err, GpkgError::FileExists { .. }));
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn open_fails_if_missing_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("missing.gpkg");

        let err = Gpkg::open(&path).expect_err("missing file should fail");
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn reopens_written_layer_with_schema() -> crate::Result<()> {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("points.gpkg");

        {
            let gpkg = Gpkg::new(&path)?;
            let columns = vec![
                ColumnSpec {
                    name: "name".to_string(),
                    column_type: ColumnType::Varchar,
                },
                ColumnSpec {
                    name: "seen".to_string(),
                    column_type: ColumnType::Date,
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
            layer.insert(
                Point::new(1.0, 2.0),
                [crate::Value::from("alpha"), crate::Value::Null],
            )?;
        }

        let gpkg = Gpkg::open_read_only(&path)?;
        assert_eq!(gpkg.list_layers()?, vec!["points"]);
        assert_eq!(gpkg.column_names("points")?, vec!["fid", "geom", "name", "seen"]);

        let layer = gpkg.open_layer("points")?;
        assert_eq!(layer.primary_key_column, "fid");
        assert_eq!(layer.geometry_type, Some(GeometryType::Point));
        assert_eq!(
            layer
                .property_columns
                .iter()
                .map(|spec| spec.column_type)
                .collect::<Vec<_>>(),
            vec![ColumnType::Varchar, ColumnType::Date]
        );
        assert_eq!(layer.features()?.count(), 1);

        let application_id: i32 =
            gpkg.connection()
                .query_row("PRAGMA application_id", [], |row| row.get(0))?;
        assert_eq!(application_id, 0x4750_4B47);
        Ok(())
    }

    #[test]
    fn new_layer_rejects_read_only() -> crate::Result<()> {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("ro.gpkg");
        {
            let gpkg = Gpkg::new(&path)?;
            gpkg.new_layer("points", "geom".to_string(), None, Dimension::Xy, 4326, &[])?;
        }

        let gpkg = Gpkg::open_read_only(&path)?;
        let err = gpkg
            .new_layer("more", "geom".to_string(), None, Dimension::Xy, 4326, &[])
            .expect_err("read-only should fail");
        assert!(matches!(err, GpkgError::ReadOnly));
        Ok(())
    }
}
