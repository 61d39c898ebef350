// cf. https://www.geopackage.org/spec140/index.html#table_definition_sql

// gpkg_contents: lists all geospatial contents in the package with identifying
// and descriptive metadata for user display and access.
pub(crate) const SQL_GPKG_CONTENTS: &str = "
CREATE TABLE gpkg_contents (
  table_name TEXT NOT NULL PRIMARY KEY,
  data_type TEXT NOT NULL,
  identifier TEXT UNIQUE,
  description TEXT DEFAULT '',
  last_change DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
  min_x DOUBLE,
  min_y DOUBLE,
  max_x DOUBLE,
  max_y DOUBLE,
  srs_id INTEGER,
  CONSTRAINT fk_gc_r_srs_id FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)
);
";

// gpkg_extensions: declares which extensions apply to the GeoPackage, a table,
// or a column so clients can detect requirements without scanning user tables.
pub(crate) const SQL_GPKG_EXTENSIONS: &str = "
CREATE TABLE gpkg_extensions (
  table_name TEXT,
  column_name TEXT,
  extension_name TEXT NOT NULL,
  definition TEXT NOT NULL,
  scope TEXT NOT NULL,
  CONSTRAINT ge_tce UNIQUE (table_name, column_name, extension_name)
);
";

pub(crate) const SQL_LIST_LAYERS: &str = "SELECT table_name FROM gpkg_contents";

pub(crate) const SQL_INSERT_GPKG_CONTENTS: &str = "
INSERT INTO gpkg_contents
  (table_name, data_type, identifier, description, srs_id)
VALUES
  (?1, 'features', ?2, '', ?3)
";

pub(crate) const SQL_INSERT_GPKG_GEOMETRY_COLUMNS: &str = "
INSERT INTO gpkg_geometry_columns
  (table_name, column_name, geometry_type_name, srs_id, z, m)
VALUES
  (?1, ?2, ?3, ?4, ?5, ?6)
";

pub(crate) const SQL_SELECT_GEOMETRY_COLUMN_META: &str = "
SELECT column_name, geometry_type_name, z, m, srs_id
FROM gpkg_geometry_columns
WHERE table_name = ?
";

pub(crate) const SQL_SELECT_LAYER_METADATA: &str = "
SELECT
  c.table_name,
  c.data_type,
  c.identifier,
  c.description,
  c.min_x,
  c.min_y,
  c.max_x,
  c.max_y,
  c.srs_id,
  s.organization
FROM gpkg_contents c
JOIN gpkg_spatial_ref_sys s ON c.srs_id = s.srs_id
ORDER BY c.table_name
";

pub(crate) const SQL_INSERT_SRS: &str = "
INSERT INTO gpkg_spatial_ref_sys
  (srs_name, srs_id, organization, organization_coordsys_id, definition, description)
VALUES
  (?1, ?2, ?3, ?4, ?5, ?6)
";

pub(crate) const SQL_SRS_EXISTS: &str =
    "SELECT EXISTS(SELECT 1 FROM gpkg_spatial_ref_sys WHERE srs_id = ?1)";

// cf. https://www.geopackage.org/spec140/index.html#extension_rtree
pub(crate) const SQL_INSERT_RTREE_EXTENSION: &str = "
INSERT INTO gpkg_extensions
  (table_name, column_name, extension_name, definition, scope)
VALUES
  (?1, ?2, 'gpkg_rtree_index', 'http://www.geopackage.org/spec120/#extension_rtree', 'write-only')
";

/// Quote an SQL identifier, doubling embedded double quotes. CSV headers end
/// up as column names verbatim, so they may contain spaces or quotes.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub(crate) fn sql_update_extent(layer_name: &str, geometry_column: &str) -> String {
    let t = quote_ident(layer_name);
    let c = quote_ident(geometry_column);
    format!(
        "UPDATE gpkg_contents SET
  min_x = (SELECT MIN(ST_MinX({c})) FROM {t}),
  min_y = (SELECT MIN(ST_MinY({c})) FROM {t}),
  max_x = (SELECT MAX(ST_MaxX({c})) FROM {t}),
  max_y = (SELECT MAX(ST_MaxY({c})) FROM {t}),
  last_change = strftime('%Y-%m-%dT%H:%M:%fZ','now')
WHERE table_name = ?1"
    )
}

pub(crate) fn sql_create_table(layer_name: &str, column_defs: &str) -> String {
    format!("CREATE TABLE {} ({column_defs})", quote_ident(layer_name))
}

pub(crate) fn sql_table_columns(layer_name: &str) -> String {
    format!(
        "SELECT name, type, pk FROM pragma_table_info('{}')",
        layer_name.replace('\'', "''")
    )
}

pub(crate) fn sql_select_features<'a, I>(
    layer_name: &str,
    geometry_column: &str,
    primary_key_column: &str,
    other_columns: I,
    limit: Option<u32>,
) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let pk = quote_ident(primary_key_column);
    let columns = [geometry_column, primary_key_column]
        .into_iter()
        .map(quote_ident)
        .chain(other_columns.into_iter().map(quote_ident))
        .collect::<Vec<String>>()
        .join(", ");
    let mut sql = format!(
        "SELECT {columns} FROM {} ORDER BY {pk}",
        quote_ident(layer_name)
    );
    if let Some(n) = limit {
        sql.push_str(&format!(" LIMIT {n}"));
    }
    sql
}

pub(crate) fn sql_insert_feature<'a, I>(layer_name: &str, columns: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let columns = columns.into_iter().map(quote_ident).collect::<Vec<String>>();
    let placeholders = (1..=columns.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<String>>();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(layer_name),
        columns.join(","),
        placeholders.join(",")
    )
}

// "GPKG" in ASCII, and version 1.4.0.
const GPKG_APPLICATION_ID: i32 = 0x4750_4B47;
const GPKG_USER_VERSION: i32 = 10400;

/// Create the metadata tables of an empty vector GeoPackage. Tile tables are
/// optional and left out.
pub(crate) fn initialize_gpkg(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "application_id", GPKG_APPLICATION_ID)?;
    conn.pragma_update(None, "user_version", GPKG_USER_VERSION)?;
    conn.execute_batch(SQL_GPKG_SPATIAL_REF_SYS)?;
    register_default_srs_ids(conn)?;
    conn.execute_batch(SQL_GPKG_CONTENTS)?;
    conn.execute_batch(SQL_GPKG_GEOMETRY_COLUMNS)?;
    conn.execute_batch(SQL_GPKG_EXTENSIONS)?;
    Ok(())
}

// gpkg_geometry_columns: identifies geometry columns and geometry types for
// vector feature user data tables.
pub(crate) const SQL_GPKG_GEOMETRY_COLUMNS: &str = "
CREATE TABLE gpkg_geometry_columns (
  table_name TEXT NOT NULL,
  column_name TEXT NOT NULL,
  geometry_type_name TEXT NOT NULL,
  srs_id INTEGER NOT NULL,
  z TINYINT NOT NULL,
  m TINYINT NOT NULL,
  CONSTRAINT pk_geom_cols PRIMARY KEY (table_name, column_name),
  CONSTRAINT uk_gc_table_name UNIQUE (table_name),
  CONSTRAINT fk_gc_tn FOREIGN KEY (table_name) REFERENCES gpkg_contents(table_name),
  CONSTRAINT fk_gc_srs FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys (srs_id)
);
";

// gpkg_spatial_ref_sys: the SRS catalog referenced by gpkg_contents and
// gpkg_geometry_columns to describe spatial reference systems.
pub(crate) const SQL_GPKG_SPATIAL_REF_SYS: &str = "
CREATE TABLE gpkg_spatial_ref_sys (
  srs_name TEXT NOT NULL,
  srs_id INTEGER PRIMARY KEY,
  organization TEXT NOT NULL,
  organization_coordsys_id INTEGER NOT NULL,
  definition  TEXT NOT NULL,
  description TEXT
);
";

// Every GeoPackage carries WGS 84 plus the two "undefined" entries.
fn register_default_srs_ids(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    let wgs84 = crate::crs::EPSG_4326;
    let rows = [
        (wgs84.srs_name, wgs84.code, "EPSG", wgs84.definition, wgs84.description),
        (
            "Undefined Cartesian SRS",
            -1,
            "NONE",
            "undefined",
            "undefined Cartesian coordinate reference system",
        ),
        (
            "Undefined geographic SRS",
            0,
            "NONE",
            "undefined",
            "undefined geographic coordinate reference system",
        ),
    ];
    let mut stmt = conn.prepare(SQL_INSERT_SRS)?;
    for (name, srs_id, organization, definition, description) in rows {
        stmt.execute(rusqlite::params![
            name,
            srs_id,
            organization,
            srs_id,
            definition,
            description
        ])?;
    }
    Ok(())
}

/// The `gpkg_rtree_index` of one geometry column: an R*Tree virtual table kept
/// in sync by triggers that call the `ST_*` functions.
///
/// cf. https://www.geopackage.org/spec140/index.html#extension_rtree
pub(crate) struct RtreeIndex<'a> {
    pub(crate) table: &'a str,
    pub(crate) geometry_column: &'a str,
    pub(crate) id_column: &'a str,
}

impl RtreeIndex<'_> {
    fn name(&self) -> String {
        quote_ident(&format!("rtree_{}_{}", self.table, self.geometry_column))
    }

    fn trigger(&self, suffix: &str) -> String {
        quote_ident(&format!(
            "rtree_{}_{}_{suffix}",
            self.table, self.geometry_column
        ))
    }

    pub(crate) fn create_sql(&self) -> String {
        format!(
            "CREATE VIRTUAL TABLE {} USING rtree(id, minx, maxx, miny, maxy);",
            self.name()
        )
    }

    pub(crate) fn load_sql(&self) -> String {
        let c = quote_ident(self.geometry_column);
        format!(
            "INSERT OR REPLACE INTO {rtree}
  SELECT {i}, {bbox} FROM {t} WHERE {c} NOT NULL AND NOT ST_IsEmpty({c});",
            rtree = self.name(),
            i = quote_ident(self.id_column),
            bbox = bbox_of(&c),
            t = quote_ident(self.table),
        )
    }

    pub(crate) fn triggers_sql(&self) -> String {
        let rtree = self.name();
        let t = quote_ident(self.table);
        let c = quote_ident(self.geometry_column);
        let i = quote_ident(self.id_column);
        let new_geom = format!("NEW.{c}");
        let old_geom = format!("OLD.{c}");
        let new_bbox = bbox_of(&new_geom);
        let new_present = format!("({new_geom} NOTNULL AND NOT ST_IsEmpty({new_geom}))");
        let new_absent = format!("({new_geom} ISNULL OR ST_IsEmpty({new_geom}))");

        [
            format!(
                "CREATE TRIGGER {name} AFTER INSERT ON {t}
  WHEN {new_present}
BEGIN
  INSERT OR REPLACE INTO {rtree} VALUES (NEW.{i}, {new_bbox});
END;",
                name = self.trigger("insert"),
            ),
            format!(
                "CREATE TRIGGER {name} AFTER UPDATE OF {c} ON {t}
  WHEN OLD.{i} = NEW.{i} AND {new_absent}
BEGIN
  DELETE FROM {rtree} WHERE id = OLD.{i};
END;",
                name = self.trigger("update2"),
            ),
            format!(
                "CREATE TRIGGER {name} AFTER UPDATE ON {t}
  WHEN OLD.{i} != NEW.{i} AND {new_absent}
BEGIN
  DELETE FROM {rtree} WHERE id IN (OLD.{i}, NEW.{i});
END;",
                name = self.trigger("update4"),
            ),
            format!(
                "CREATE TRIGGER {name} AFTER UPDATE ON {t}
  WHEN OLD.{i} != NEW.{i} AND {new_present}
BEGIN
  DELETE FROM {rtree} WHERE id = OLD.{i};
  INSERT OR REPLACE INTO {rtree} VALUES (NEW.{i}, {new_bbox});
END;",
                name = self.trigger("update5"),
            ),
            format!(
                "CREATE TRIGGER {name} AFTER UPDATE OF {c} ON {t}
  WHEN OLD.{i} = NEW.{i} AND {new_present}
    AND ({old_geom} NOTNULL AND NOT ST_IsEmpty({old_geom}))
BEGIN
  UPDATE {rtree} SET
    minx = ST_MinX({new_geom}), maxx = ST_MaxX({new_geom}),
    miny = ST_MinY({new_geom}), maxy = ST_MaxY({new_geom})
  WHERE id = NEW.{i};
END;",
                name = self.trigger("update6"),
            ),
            format!(
                "CREATE TRIGGER {name} AFTER UPDATE OF {c} ON {t}
  WHEN OLD.{i} = NEW.{i} AND {new_present}
    AND ({old_geom} ISNULL OR ST_IsEmpty({old_geom}))
BEGIN
  INSERT INTO {rtree} VALUES (NEW.{i}, {new_bbox});
END;",
                name = self.trigger("update7"),
            ),
            format!(
                "CREATE TRIGGER {name} AFTER DELETE ON {t}
  WHEN {old_geom} NOT NULL
BEGIN
  DELETE FROM {rtree} WHERE id = OLD.{i};
END;",
                name = self.trigger("delete"),
            ),
        ]
        .join("\n\n")
    }

    /// Create the virtual table, index existing rows and install the triggers.
    pub(crate) fn install(&self, conn: &rusqlite::Connection) -> rusqlite::Result<()> {
        conn.execute_batch(&self.create_sql())?;
        conn.execute_batch(&self.load_sql())?;
        conn.execute_batch(&self.triggers_sql())?;
        Ok(())
    }
}

// Column order of the rtree virtual table.
fn bbox_of(geometry: &str) -> String {
    format!(
        "ST_MinX({geometry}), ST_MaxX({geometry}), ST_MinY({geometry}), ST_MaxY({geometry})"
    )
}
