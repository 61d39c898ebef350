use crate::error::{GpkgError, Result};
use crate::types::Value;
use std::collections::HashMap;
use std::sync::Arc;
use wkb::reader::Wkb;

/// A single feature with geometry bytes and owned properties.
#[derive(Clone, Debug)]
pub struct GpkgFeature {
    pub(super) id: i64,
    pub(super) geometry: Option<Vec<u8>>,
    pub(super) properties: Vec<Value>,
    pub(super) property_index_by_name: Arc<HashMap<String, usize>>,
}

impl GpkgFeature {
    /// Return the primary key value.
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Decode the geometry column into WKB.
    pub fn geometry(&self) -> Result<Wkb<'_>> {
        let bytes = self
            .geometry
            .as_ref()
            .ok_or(GpkgError::NullGeometryValue)?;
        gpkg_geometry_to_wkb(bytes)
    }

    /// Look up a property by column name.
    pub fn property(&self, name: &str) -> Option<Value> {
        self.property_index_by_name
            .get(name)
            .and_then(|idx| self.properties.get(*idx))
            .cloned()
    }

    /// All property values in layer column order.
    pub fn properties(&self) -> &[Value] {
        &self.properties
    }
}

/// Owned iterator over features.
pub struct GpkgFeatureIterator {
    pub(super) features: std::vec::IntoIter<GpkgFeature>,
}

impl Iterator for GpkgFeatureIterator {
    type Item = GpkgFeature;

    fn next(&mut self) -> Option<Self::Item> {
        self.features.next()
    }
}

// cf. https://www.geopackage.org/spec140/index.html#gpb_format
const GPKG_MAGIC: [u8; 2] = *b"GP";
const GPKG_HEADER_SIZE: usize = 8;
// Version 1, little-endian srs_id, no envelope, not flagged empty.
const GPKG_WRITE_FLAGS: u8 = 0b0000_0001;
const ENVELOPE_INDICATOR_MASK: u8 = 0b0000_1110;

// Envelope size in bytes for the 3-bit indicator in the flags byte: none, xy,
// xyz, xym, xyzm. Indicators 5 to 7 are invalid.
fn envelope_len(flags: u8) -> Option<usize> {
    match (flags & ENVELOPE_INDICATOR_MASK) >> 1 {
        0 => Some(0),
        1 => Some(4 * 8),
        2 | 3 => Some(6 * 8),
        4 => Some(8 * 8),
        _ => None,
    }
}

/// Strip the GeoPackage header and envelope to get at the WKB body.
pub(crate) fn gpkg_geometry_to_wkb(blob: &[u8]) -> Result<Wkb<'_>> {
    let Some(header) = blob.get(..GPKG_HEADER_SIZE) else {
        return Err(GpkgError::InvalidGpkgGeometryLength {
            len: blob.len(),
            minimum: GPKG_HEADER_SIZE,
        });
    };
    let magic = [header[0], header[1]];
    if magic != GPKG_MAGIC {
        return Err(GpkgError::InvalidGpkgGeometryMagic(magic));
    }

    let flags = header[3];
    let offset = envelope_len(flags)
        .ok_or(GpkgError::InvalidGpkgGeometryFlags(flags))?
        + GPKG_HEADER_SIZE;
    match blob.get(offset..) {
        Some(body) => Ok(Wkb::try_new(body)?),
        None => Err(GpkgError::InvalidGpkgGeometryLength {
            len: blob.len(),
            minimum: offset,
        }),
    }
}

/// Prefix ISO WKB with a GeoPackage header for `srs_id`. No envelope is
/// written; the R-tree holds the bounds instead.
pub(crate) fn wkb_to_gpkg_geometry(wkb: &[u8], srs_id: i32) -> Vec<u8> {
    let mut blob = Vec::with_capacity(GPKG_HEADER_SIZE + wkb.len());
    blob.extend_from_slice(&GPKG_MAGIC);
    blob.push(0); // version
    blob.push(GPKG_WRITE_FLAGS);
    blob.extend_from_slice(&srs_id.to_le_bytes());
    blob.extend_from_slice(wkb);
    blob
}
