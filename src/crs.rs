//! Coordinate reference system identifiers such as `"EPSG:4326"`.
//!
//! A GeoPackage layer references its CRS through an `srs_id` row in
//! `gpkg_spatial_ref_sys`, and that row needs a full WKT definition. This crate
//! bundles definitions for the two systems it meets in practice (WGS 84 and Web
//! Mercator); any other code must be registered with [`crate::Gpkg::register_srs`]
//! before a layer can use it.

use std::fmt;
use std::str::FromStr;

use crate::error::{GpkgError, Result};

/// A parsed `AUTHORITY:CODE` identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Crs {
    pub organization: String,
    pub code: i32,
}

/// An `gpkg_spatial_ref_sys` row this crate can insert on its own.
#[derive(Clone, Copy, Debug)]
pub struct KnownSrs {
    pub code: i32,
    pub srs_name: &'static str,
    pub definition: &'static str,
    pub description: &'static str,
}

pub const EPSG_4326: KnownSrs = KnownSrs {
    code: 4326,
    srs_name: "WGS 84",
    definition: r#"GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AXIS["Latitude",NORTH],AXIS["Longitude",EAST],AUTHORITY["EPSG","4326"]]"#,
    description: "WGS 84",
};

pub const EPSG_3857: KnownSrs = KnownSrs {
    code: 3857,
    srs_name: "WGS 84 / Pseudo-Mercator",
    definition: r#"PROJCS["WGS 84 / Pseudo-Mercator",GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AUTHORITY["EPSG","4326"]],PROJECTION["Mercator_1SP"],PARAMETER["central_meridian",0],PARAMETER["scale_factor",1],PARAMETER["false_easting",0],PARAMETER["false_northing",0],UNIT["metre",1,AUTHORITY["EPSG","9001"]],AXIS["Easting",EAST],AXIS["Northing",NORTH],EXTENSION["PROJ4","+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +nadgrids=@null +wktext +no_defs"],AUTHORITY["EPSG","3857"]]"#,
    description: "Web Mercator / Pseudo-Mercator (EPSG:3857)",
};

impl Crs {
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || GpkgError::InvalidCrs(s.to_string());

        let (organization, code) = s.trim().split_once(':').ok_or_else(invalid)?;
        let organization = organization.trim();
        if organization.is_empty() {
            return Err(invalid());
        }
        let code = code.trim().parse::<i32>().map_err(|_| invalid())?;

        Ok(Self {
            organization: organization.to_ascii_uppercase(),
            code,
        })
    }

    /// The GeoPackage `srs_id` this identifier is stored under.
    ///
    /// This crate follows the common convention of using the EPSG code as the
    /// `srs_id`.
    pub fn srs_id(&self) -> i32 {
        self.code
    }

    /// A bundled SRS definition for this identifier, if any.
    pub fn known_srs(&self) -> Option<KnownSrs> {
        if self.organization != "EPSG" {
            return None;
        }
        match self.code {
            4326 => Some(EPSG_4326),
            3857 => Some(EPSG_3857),
            _ => None,
        }
    }
}

impl FromStr for Crs {
    type Err = GpkgError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.organization, self.code)
    }
}
