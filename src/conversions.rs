use crate::error::GpkgError;
use crate::table::DataType;
use crate::types::ColumnType;

/// `None` stands for the generic `GEOMETRY` type of a layer with mixed geometries.
#[inline]
pub(crate) fn geometry_type_to_str(
    geometry_type: Option<wkb::reader::GeometryType>,
) -> &'static str {
    match geometry_type {
        None => "GEOMETRY",
        Some(wkb::reader::GeometryType::GeometryCollection) => "GEOMETRYCOLLECTION",
        Some(wkb::reader::GeometryType::Point) => "POINT",
        Some(wkb::reader::GeometryType::LineString) => "LINESTRING",
        Some(wkb::reader::GeometryType::Polygon) => "POLYGON",
        Some(wkb::reader::GeometryType::MultiPoint) => "MULTIPOINT",
        Some(wkb::reader::GeometryType::MultiLineString) => "MULTILINESTRING",
        Some(wkb::reader::GeometryType::MultiPolygon) => "MULTIPOLYGON",
        Some(_) => "GEOMETRY",
    }
}

#[inline]
pub(crate) fn geometry_type_from_str(
    geometry_type_str: &str,
) -> Result<Option<wkb::reader::GeometryType>, GpkgError> {
    let s = geometry_type_str;
    if s.eq_ignore_ascii_case("GEOMETRY") {
        Ok(None)
    } else if s.eq_ignore_ascii_case("GEOMETRYCOLLECTION") {
        Ok(Some(wkb::reader::GeometryType::GeometryCollection))
    } else if s.eq_ignore_ascii_case("POINT") {
        Ok(Some(wkb::reader::GeometryType::Point))
    } else if s.eq_ignore_ascii_case("LINESTRING") {
        Ok(Some(wkb::reader::GeometryType::LineString))
    } else if s.eq_ignore_ascii_case("POLYGON") {
        Ok(Some(wkb::reader::GeometryType::Polygon))
    } else if s.eq_ignore_ascii_case("MULTIPOINT") {
        Ok(Some(wkb::reader::GeometryType::MultiPoint))
    } else if s.eq_ignore_ascii_case("MULTILINESTRING") {
        Ok(Some(wkb::reader::GeometryType::MultiLineString))
    } else if s.eq_ignore_ascii_case("MULTIPOLYGON") {
        Ok(Some(wkb::reader::GeometryType::MultiPolygon))
    } else {
        Err(GpkgError::UnsupportedGeometryType(
            geometry_type_str.to_string(),
        ))
    }
}

#[inline]
pub(crate) fn dimension_to_zm(dimension: wkb::reader::Dimension) -> (i8, i8) {
    match dimension {
        wkb::reader::Dimension::Xy => (0, 0),
        wkb::reader::Dimension::Xyz => (1, 0),
        wkb::reader::Dimension::Xym => (0, 1),
        wkb::reader::Dimension::Xyzm => (1, 1),
    }
}

#[inline]
pub(crate) fn dimension_from_zm(z: i8, m: i8) -> Result<wkb::reader::Dimension, GpkgError> {
    match (z, m) {
        (0, 0) => Ok(wkb::reader::Dimension::Xy),
        (1, 0) => Ok(wkb::reader::Dimension::Xyz),
        (0, 1) => Ok(wkb::reader::Dimension::Xym),
        (1, 1) => Ok(wkb::reader::Dimension::Xyzm),
        // z and m may also be 2 ("optional"), which a single-dimension layer
        // can't express.
        _ => Err(GpkgError::InvalidDimension { z, m }),
    }
}

#[inline]
pub(crate) fn column_type_to_str(column_type: ColumnType) -> &'static str {
    match column_type {
        ColumnType::Integer => "INTEGER",
        ColumnType::Double => "DOUBLE",
        ColumnType::Varchar => "TEXT",
        ColumnType::Boolean => "BOOLEAN",
        ColumnType::Date => "DATE",
        ColumnType::DateTime => "DATETIME",
        ColumnType::Geometry => "GEOMETRY",
    }
}

#[inline]
pub(crate) fn column_type_from_str(column_type_str: &str) -> Option<ColumnType> {
    let s = column_type_str;
    if s.eq_ignore_ascii_case("TINYINT")
        || s.eq_ignore_ascii_case("SMALLINT")
        || s.eq_ignore_ascii_case("MEDIUMINT")
        || s.eq_ignore_ascii_case("INT")
        || s.eq_ignore_ascii_case("INTEGER")
    {
        Some(ColumnType::Integer)
    } else if s.eq_ignore_ascii_case("DOUBLE")
        || s.eq_ignore_ascii_case("FLOAT")
        || s.eq_ignore_ascii_case("REAL")
    {
        Some(ColumnType::Double)
    } else if s.eq_ignore_ascii_case("TEXT") || s.to_ascii_uppercase().starts_with("TEXT(") {
        Some(ColumnType::Varchar)
    } else if s.eq_ignore_ascii_case("BOOLEAN") {
        Some(ColumnType::Boolean)
    } else if s.eq_ignore_ascii_case("DATE") {
        Some(ColumnType::Date)
    } else if s.eq_ignore_ascii_case("DATETIME") {
        Some(ColumnType::DateTime)
    } else if s.eq_ignore_ascii_case("BLOB")
        || s.eq_ignore_ascii_case("GEOMETRY")
        || s.eq_ignore_ascii_case("POINT")
        || s.eq_ignore_ascii_case("LINESTRING")
        || s.eq_ignore_ascii_case("POLYGON")
        || s.eq_ignore_ascii_case("MULTIPOINT")
        || s.eq_ignore_ascii_case("MULTILINESTRING")
        || s.eq_ignore_ascii_case("MULTIPOLYGON")
        || s.eq_ignore_ascii_case("GEOMETRYCOLLECTION")
    {
        Some(ColumnType::Geometry)
    } else {
        None
    }
}

/// Storage type of an attribute column; geometry roles have none.
#[inline]
pub(crate) fn column_type_from_data_type(data_type: DataType) -> Option<ColumnType> {
    match data_type {
        DataType::Text => Some(ColumnType::Varchar),
        DataType::Int => Some(ColumnType::Integer),
        DataType::Double => Some(ColumnType::Double),
        DataType::Boolean => Some(ColumnType::Boolean),
        DataType::Date => Some(ColumnType::Date),
        DataType::DateTime => Some(ColumnType::DateTime),
        DataType::Latitude | DataType::Longitude | DataType::Geometry => None,
    }
}
