use std::str::FromStr;

use geo_traits::{
    CoordTrait, GeometryCollectionTrait, GeometryTrait, LineStringTrait, MultiLineStringTrait,
    MultiPointTrait, MultiPolygonTrait, PointTrait, PolygonTrait,
};
use wkb::reader::{Dimension, GeometryType, Wkb};
use wkt::Wkt;

use super::{ColumnTypes, DataType};
use crate::error::{GpkgError, Result};

/// A single geometry value, held as ISO WKB.
#[derive(Clone, Debug, PartialEq)]
pub struct Geometry {
    wkb: Vec<u8>,
    geometry_type: GeometryType,
    dimension: Dimension,
}

impl Geometry {
    /// Parse well-known text. `row` is only used to label the error.
    ///
    /// Only the syntax is checked: a self-intersecting polygon is accepted.
    pub fn from_wkt(text: &str, row: usize) -> Result<Self> {
        let malformed = || GpkgError::MalformedGeometry {
            row,
            text: text.to_string(),
        };
        let geometry = Wkt::<f64>::from_str(text).map_err(|_| malformed())?;
        Self::from_geometry(&geometry)
    }

    /// A 2D point; longitude is x and latitude is y.
    pub fn point(longitude: f64, latitude: f64) -> Result<Self> {
        Self::from_geometry(&geo_types::Point::new(longitude, latitude))
    }

    pub fn from_geometry<G: GeometryTrait<T = f64>>(geometry: &G) -> Result<Self> {
        let mut buf = Vec::new();
        wkb::writer::write_geometry(&mut buf, geometry, &Default::default())?;
        Self::from_wkb(buf)
    }

    pub fn from_wkb(wkb: Vec<u8>) -> Result<Self> {
        let (geometry_type, dimension) = {
            let parsed = Wkb::try_new(&wkb)?;
            (parsed.geometry_type(), parsed.dimension())
        };
        Ok(Self {
            wkb,
            geometry_type,
            dimension,
        })
    }

    pub fn as_wkb(&self) -> &[u8] {
        &self.wkb
    }

    pub fn wkb(&self) -> Result<Wkb<'_>> {
        Ok(Wkb::try_new(&self.wkb)?)
    }

    pub fn geometry_type(&self) -> GeometryType {
        self.geometry_type
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }
}

/// Where the geometry of each row comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GeometrySpec {
    /// One column holding well-known text.
    Wkt(String),
    /// A pair of numeric columns combined into a point.
    LatLon { latitude: String, longitude: String },
}

impl GeometrySpec {
    /// Resolve the geometry role from a column type assignment.
    ///
    /// A single `GEOMETRY` column wins; otherwise exactly one `LATITUDE` and one
    /// `LONGITUDE` column are required.
    pub fn from_column_types(column_types: &ColumnTypes) -> Result<Self> {
        let with_type = |wanted: DataType| -> Vec<&str> {
            column_types
                .iter()
                .filter(|(_, data_type)| *data_type == wanted)
                .map(|(name, _)| name)
                .collect()
        };
        let geometry = with_type(DataType::Geometry);
        let latitude = with_type(DataType::Latitude);
        let longitude = with_type(DataType::Longitude);

        match (geometry.as_slice(), latitude.as_slice(), longitude.as_slice()) {
            ([column], [], []) => Ok(GeometrySpec::Wkt(column.to_string())),
            ([], [latitude], [longitude]) => Ok(GeometrySpec::LatLon {
                latitude: latitude.to_string(),
                longitude: longitude.to_string(),
            }),
            ([_, _, ..], _, _) => Err(GpkgError::AmbiguousGeometryRole(format!(
                "more than one GEOMETRY column: {}",
                geometry.join(", ")
            ))),
            ([column], _, _) => Err(GpkgError::AmbiguousGeometryRole(format!(
                "GEOMETRY column '{column}' cannot be combined with LATITUDE/LONGITUDE columns"
            ))),
            ([], [_, _, ..], _) => Err(GpkgError::AmbiguousGeometryRole(format!(
                "more than one LATITUDE column: {}",
                latitude.join(", ")
            ))),
            ([], _, [_, _, ..]) => Err(GpkgError::AmbiguousGeometryRole(format!(
                "more than one LONGITUDE column: {}",
                longitude.join(", ")
            ))),
            ([], [], [_]) => Err(GpkgError::MissingGeometryRole("LATITUDE")),
            ([], [_], []) => Err(GpkgError::MissingGeometryRole("LONGITUDE")),
            ([], [], []) => Err(GpkgError::MissingGeometryRole(
                "GEOMETRY or LATITUDE/LONGITUDE",
            )),
        }
    }

    /// The CSV columns consumed by this spec.
    pub fn source_columns(&self) -> Vec<&str> {
        match self {
            GeometrySpec::Wkt(column) => vec![column.as_str()],
            GeometrySpec::LatLon {
                latitude,
                longitude,
            } => vec![latitude.as_str(), longitude.as_str()],
        }
    }
}

/// Whether any position of `geometry` is NaN or infinite. Points without a
/// coordinate (`POINT EMPTY`) count as non-finite.
pub fn has_non_finite_coord<G: GeometryTrait<T = f64>>(geometry: &G) -> bool {
    let mut found = false;
    for_each_position(geometry, &mut |position| {
        found |= !position.is_some_and(|(x, y)| x.is_finite() && y.is_finite());
    });
    found
}

/// Call `f` with the x/y of every position of `geometry`, in storage order.
///
/// A point without a coordinate yields `None`. Rings of polygons and members
/// of collections are walked recursively. Rect, Triangle and Line never come
/// out of a GeoPackage blob and are ignored.
pub(crate) fn for_each_position<G, F>(geometry: &G, f: &mut F)
where
    G: GeometryTrait<T = f64>,
    F: FnMut(Option<(f64, f64)>),
{
    use geo_traits::GeometryType as GeoType;

    match geometry.as_type() {
        GeoType::Point(point) => f(point.coord().map(|coord| coord.x_y())),
        GeoType::LineString(line) => walk_line(line, f),
        GeoType::Polygon(poly) => walk_polygon(poly, f),
        GeoType::MultiPoint(multi) => {
            for point in multi.points() {
                f(point.coord().map(|coord| coord.x_y()));
            }
        }
        GeoType::MultiLineString(multi) => {
            for line in multi.line_strings() {
                walk_line(&line, f);
            }
        }
        GeoType::MultiPolygon(multi) => {
            for poly in multi.polygons() {
                walk_polygon(&poly, f);
            }
        }
        GeoType::GeometryCollection(collection) => {
            for member in collection.geometries() {
                for_each_position(&member, f);
            }
        }
        GeoType::Rect(_) | GeoType::Triangle(_) | GeoType::Line(_) => {}
    }
}

fn walk_line<L, F>(line: &L, f: &mut F)
where
    L: LineStringTrait<T = f64>,
    F: FnMut(Option<(f64, f64)>),
{
    for coord in line.coords() {
        f(Some(coord.x_y()));
    }
}

fn walk_polygon<P, F>(poly: &P, f: &mut F)
where
    P: PolygonTrait<T = f64>,
    F: FnMut(Option<(f64, f64)>),
{
    if let Some(ring) = poly.exterior() {
        walk_line(&ring, f);
    }
    for ring in poly.interiors() {
        walk_line(&ring, f);
    }
}

#[cfg(test)]
mod tests {
    use super::{Geometry, GeometrySpec, has_non_finite_coord};
    use crate::GpkgError;
    use crate::table::{ColumnTypes, DataType};
    use geo_types::{LineString, Point};
    use wkb::reader::{Dimension, GeometryType};

    #[test]
    fn parses_wkt_into_wkb() -> crate::Result<()> {
        let geometry = Geometry::from_wkt("LINESTRING (0 0, 1 1, 2 0)", 1)?;
        assert_eq!(geometry.geometry_type(), GeometryType::LineString);
        assert_eq!(geometry.dimension(), Dimension::Xy);

        let point_z = Geometry::from_wkt("POINT Z (1 2 3)", 1)?;
        assert_eq!(point_z.dimension(), Dimension::Xyz);
        Ok(())
    }

    #[test]
    fn reports_row_of_malformed_wkt() {
        let err = Geometry::from_wkt("NOT A GEOM", 5).expect_err("bad wkt");
        match err {
            GpkgError::MalformedGeometry { row, text } => {
                assert_eq!(row, 5);
                assert_eq!(text, "NOT A GEOM");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn accepts_self_intersecting_polygon() -> crate::Result<()> {
        let bowtie = Geometry::from_wkt("POLYGON ((0 0, 2 2, 2 0, 0 2, 0 0))", 1)?;
        assert_eq!(bowtie.geometry_type(), GeometryType::Polygon);
        Ok(())
    }

    #[test]
    fn point_puts_longitude_first() -> crate::Result<()> {
        let point = Geometry::point(13.4, 52.5)?;
        let expected = Geometry::from_geometry(&Point::new(13.4, 52.5))?;
        assert_eq!(point, expected);
        assert_eq!(point.geometry_type(), GeometryType::Point);
        Ok(())
    }

    #[test]
    fn detects_non_finite_coordinates() -> crate::Result<()> {
        assert!(!has_non_finite_coord(&Point::new(1.0, 2.0)));
        assert!(has_non_finite_coord(&Point::new(1.0, f64::NAN)));
        assert!(has_non_finite_coord(&LineString::from(vec![
            (0.0, 0.0),
            (f64::INFINITY, 1.0)
        ])));

        let nan_point = Geometry::point(f64::NAN, f64::NAN)?;
        assert!(has_non_finite_coord(&nan_point.wkb()?));
        let fine = Geometry::from_wkt("MULTIPOINT ((0 0), (1 1))", 1)?;
        assert!(!has_non_finite_coord(&fine.wkb()?));
        Ok(())
    }

    fn types(pairs: &[(&str, DataType)]) -> ColumnTypes {
        pairs
            .iter()
            .map(|(name, data_type)| (name.to_string(), *data_type))
            .collect()
    }

    #[test]
    fn resolves_geometry_spec_from_types() -> crate::Result<()> {
        let wkt = types(&[("geom", DataType::Geometry), ("name", DataType::Text)]);
        assert_eq!(
            GeometrySpec::from_column_types(&wkt)?,
            GeometrySpec::Wkt("geom".to_string())
        );

        let latlon = types(&[
            ("lat", DataType::Latitude),
            ("lon", DataType::Longitude),
            ("name", DataType::Text),
        ]);
        assert_eq!(
            GeometrySpec::from_column_types(&latlon)?,
            GeometrySpec::LatLon {
                latitude: "lat".to_string(),
                longitude: "lon".to_string(),
            }
        );
        Ok(())
    }

    #[test]
    fn rejects_missing_or_ambiguous_geometry_roles() {
        let none = types(&[("name", DataType::Text)]);
        assert!(matches!(
            GeometrySpec::from_column_types(&none),
            Err(GpkgError::MissingGeometryRole(_))
        ));

        let half = types(&[("lat", DataType::Latitude)]);
        assert!(matches!(
            GeometrySpec::from_column_types(&half),
            Err(GpkgError::MissingGeometryRole("LONGITUDE"))
        ));

        let two_geoms = types(&[("a", DataType::Geometry), ("b", DataType::Geometry)]);
        assert!(matches!(
            GeometrySpec::from_column_types(&two_geoms),
            Err(GpkgError::AmbiguousGeometryRole(_))
        ));

        let mixed = types(&[
            ("geom", DataType::Geometry),
            ("lat", DataType::Latitude),
            ("lon", DataType::Longitude),
        ]);
        assert!(matches!(
            GeometrySpec::from_column_types(&mixed),
            Err(GpkgError::AmbiguousGeometryRole(_))
        ));
    }
}
