//! SQL scalar functions needed by the R-tree triggers of feature layers.
//!
//! The triggers written by [`crate::Gpkg::new_layer`] call `ST_MinX`,
//! `ST_MaxX`, `ST_MinY`, `ST_MaxY` and `ST_IsEmpty` on the GeoPackage blob
//! of each row, so every connection that inserts features needs them.

use crate::error::Result;
use crate::gpkg::gpkg_geometry_to_wkb;
use crate::table::for_each_position;
use geo_traits::GeometryTrait;
use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::{Type, ValueRef};
use rusqlite::{Connection, Error};
use wkb::reader::Wkb;

/// Axis-aligned extent of the finite positions of a geometry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Extent {
    pub(crate) min_x: f64,
    pub(crate) min_y: f64,
    pub(crate) max_x: f64,
    pub(crate) max_y: f64,
}

impl Extent {
    fn of_position(x: f64, y: f64) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    fn include(self, x: f64, y: f64) -> Self {
        Self {
            min_x: self.min_x.min(x),
            min_y: self.min_y.min(y),
            max_x: self.max_x.max(x),
            max_y: self.max_y.max(y),
        }
    }

    /// `None` when the geometry has no finite position at all. NaN positions
    /// are skipped, so a `POINT EMPTY` row never enters the spatial index.
    pub(crate) fn of_geometry<G: GeometryTrait<T = f64>>(geometry: &G) -> Option<Self> {
        let mut extent: Option<Self> = None;
        for_each_position(geometry, &mut |position| {
            let Some((x, y)) = position.filter(|(x, y)| x.is_finite() && y.is_finite()) else {
                return;
            };
            extent = Some(match extent {
                Some(extent) => extent.include(x, y),
                None => Self::of_position(x, y),
            });
        });
        extent
    }
}

/// Register all spatial SQL helper functions in the provided connection.
///
/// Example:
/// ```no_run
/// use rusqlite::Connection;
/// use gpkg_csv::register_spatial_functions;
///
/// let conn = Connection::open_in_memory()?;
/// register_spatial_functions(&conn)?;
/// # Ok::<(), gpkg_csv::GpkgError>(())
/// ```
pub fn register_spatial_functions(conn: &Connection) -> Result<()> {
    let components: [(&str, fn(Extent) -> f64); 4] = [
        ("ST_MinX", |e| e.min_x),
        ("ST_MinY", |e| e.min_y),
        ("ST_MaxX", |e| e.max_x),
        ("ST_MaxY", |e| e.max_y),
    ];
    for (name, component) in components {
        register_blob_function(conn, name, move |wkb| {
            Extent::of_geometry(wkb).map(component)
        })?;
    }
    register_blob_function(conn, "ST_IsEmpty", |wkb| {
        Some(i64::from(Extent::of_geometry(wkb).is_none()))
    })?;
    Ok(())
}

// Registers a one-argument deterministic function over a GeoPackage blob.
// SQL NULL in gives NULL out; anything other than a blob is a type error.
fn register_blob_function<T, F>(conn: &Connection, name: &str, f: F) -> Result<()>
where
    T: rusqlite::ToSql,
    F: Fn(&Wkb<'_>) -> Option<T> + Send + Sync + 'static,
{
    conn.create_scalar_function(name, 1, FunctionFlags::SQLITE_DETERMINISTIC, move |ctx| {
        Ok(match blob_argument(ctx)? {
            Some(wkb) => f(&wkb),
            None => None,
        })
    })?;
    Ok(())
}

fn blob_argument<'a>(ctx: &'a Context<'a>) -> std::result::Result<Option<Wkb<'a>>, Error> {
    match ctx.get_raw(0) {
        ValueRef::Null => Ok(None),
        ValueRef::Blob(blob) => gpkg_geometry_to_wkb(blob)
            .map(Some)
            .map_err(|err| Error::UserFunctionError(Box::new(err))),
        _ => Err(Error::InvalidFunctionParameterType(0, Type::Blob)),
    }
}

#[cfg(test)]
mod tests {
    use super::{Extent, register_spatial_functions};
    use crate::gpkg::wkb_to_gpkg_geometry;
    use geo_types::{Geometry, GeometryCollection, MultiLineString, MultiPoint};
    use geo_types::{LineString, Point};
    use rusqlite::{Connection, params};

    fn gpkg_blob_from_geometry<G: geo_traits::GeometryTrait<T = f64>>(
        geometry: G,
    ) -> crate::Result<Vec<u8>> {
        let mut wkb = Vec::new();
        wkb::writer::write_geometry(&mut wkb, &geometry, &Default::default())?;
        Ok(wkb_to_gpkg_geometry(&wkb, 4326))
    }

    #[test]
    fn st_bounds_for_point() -> crate::Result<()> {
        let conn = Connection::open_in_memory()?;
        register_spatial_functions(&conn)?;

        let point = Point::new(1.5, -2.0);
        let blob = gpkg_blob_from_geometry(point)?;

        let (minx, maxx, miny, maxy, empty): (f64, f64, f64, f64, i64) = conn.query_row(
            "SELECT ST_MinX(?1), ST_MaxX(?1), ST_MinY(?1), ST_MaxY(?1), ST_IsEmpty(?1)",
            params![blob],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            },
        )?;

        assert_eq!(minx, 1.5);
        assert_eq!(maxx, 1.5);
        assert_eq!(miny, -2.0);
        assert_eq!(maxy, -2.0);
        assert_eq!(empty, 0);
        Ok(())
    }

    #[test]
    fn st_is_empty_for_empty_linestring() -> crate::Result<()> {
        let conn = Connection::open_in_memory()?;
        register_spatial_functions(&conn)?;

        let line: LineString<f64> = LineString::new(Vec::new());
        let blob = gpkg_blob_from_geometry(line)?;

        let (minx, empty): (Option<f64>, i64) =
            conn.query_row("SELECT ST_MinX(?1), ST_IsEmpty(?1)", params![blob], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?;

        assert!(minx.is_none());
        assert_eq!(empty, 1);
        Ok(())
    }

    #[test]
    fn st_is_empty_for_nan_point() -> crate::Result<()> {
        let conn = Connection::open_in_memory()?;
        register_spatial_functions(&conn)?;

        let blob = gpkg_blob_from_geometry(Point::new(f64::NAN, f64::NAN))?;

        let (maxy, empty): (Option<f64>, i64) =
            conn.query_row("SELECT ST_MaxY(?1), ST_IsEmpty(?1)", params![blob], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?;

        assert!(maxy.is_none());
        assert_eq!(empty, 1);
        Ok(())
    }

    #[test]
    fn st_bounds_cover_every_part() -> crate::Result<()> {
        let conn = Connection::open_in_memory()?;
        register_spatial_functions(&conn)?;

        let cases: Vec<(Geometry, [f64; 4])> = vec![
            (
                Geometry::MultiPoint(MultiPoint::from(vec![
                    Point::new(1.0, 5.0),
                    Point::new(-2.0, 3.0),
                ])),
                [-2.0, 3.0, 1.0, 5.0],
            ),
            (
                Geometry::MultiLineString(MultiLineString(vec![
                    LineString::from(vec![(0.0, 0.0), (2.0, 1.0)]),
                    LineString::from(vec![(-3.0, 4.0), (-1.0, 2.0)]),
                ])),
                [-3.0, 0.0, 2.0, 4.0],
            ),
            (
                Geometry::GeometryCollection(GeometryCollection::from(vec![
                    Geometry::Point(Point::new(5.0, -1.0)),
                    Geometry::LineString(LineString::from(vec![(-2.0, 2.0), (1.0, 3.0)])),
                ])),
                [-2.0, -1.0, 5.0, 3.0],
            ),
        ];

        for (geometry, expected) in cases {
            let blob = gpkg_blob_from_geometry(geometry)?;
            let bounds: [f64; 4] = conn.query_row(
                "SELECT ST_MinX(?1), ST_MinY(?1), ST_MaxX(?1), ST_MaxY(?1)",
                params![blob],
                |row| Ok([row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?]),
            )?;
            assert_eq!(bounds, expected);
        }
        Ok(())
    }

    #[test]
    fn extent_skips_nan_positions() {
        let line = LineString::from(vec![(f64::NAN, 1.0), (2.0, -1.0), (4.0, f64::INFINITY)]);
        assert_eq!(
            Extent::of_geometry(&line),
            Some(Extent {
                min_x: 2.0,
                min_y: -1.0,
                max_x: 2.0,
                max_y: -1.0,
            })
        );
    }

    #[test]
    fn null_geometry_gives_null() -> crate::Result<()> {
        let conn = Connection::open_in_memory()?;
        register_spatial_functions(&conn)?;

        let (minx, empty): (Option<f64>, Option<i64>) =
            conn.query_row("SELECT ST_MinX(NULL), ST_IsEmpty(NULL)", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?;
        assert_eq!((minx, empty), (None, None));

        let text_arg = conn.query_row("SELECT ST_MaxY('POINT (1 2)')", [], |row| {
            row.get::<_, Option<f64>>(0)
        });
        assert!(text_arg.is_err());
        Ok(())
    }
}
