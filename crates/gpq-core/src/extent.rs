//! Viewport extents and coordinate reference system handling.
//!
//! Remote GeoParquet datasets are filtered in EPSG:4326, so whatever
//! reference system the host viewport uses, its extent is reprojected here
//! before any predicate is built. The extent is never mutated in place; a
//! transform always produces a new rectangle.

/// An axis-aligned bounding rectangle in some coordinate reference system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Extent {
    #[must_use]
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }
}

/// A coordinate reference system identifier in `authority:code` form.
///
/// Parsing is case-insensitive; the stored form is upper-case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crs(String);

impl Crs {
    /// Parse an identifier such as `"EPSG:4326"` or `"OGC:CRS84"`.
    ///
    /// Returns `None` for anything that is not an `authority:code` pair.
    #[must_use]
    pub fn parse(ident: &str) -> Option<Self> {
        let ident = ident.trim();
        let (authority, code) = ident.split_once(':')?;
        if authority.is_empty() || code.is_empty() {
            return None;
        }
        Some(Self(ident.to_ascii_uppercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when coordinates in this system already are geographic
    /// longitude/latitude degrees.
    #[must_use]
    pub fn is_geographic(&self) -> bool {
        self.0 == "EPSG:4326" || self.0 == "OGC:CRS84"
    }

    fn is_web_mercator(&self) -> bool {
        self.0 == "EPSG:3857"
    }
}

/// The canonical geographic reference system of the remote datasets.
pub const GEOGRAPHIC_CRS: &str = "EPSG:4326";

/// WGS84 semi-major axis, the sphere radius used by EPSG:3857.
const EARTH_RADIUS_M: f64 = 6_378_137.0;

fn mercator_to_lon_lat(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / EARTH_RADIUS_M).to_degrees();
    // atan(sinh(..)) is bounded to (-90, 90), so polar input degrades to a
    // degenerate rectangle instead of failing.
    let lat = (y / EARTH_RADIUS_M).sinh().atan().to_degrees();
    (lon, lat)
}

/// Transform a bounding rectangle into EPSG:4326.
///
/// Identity when `source_crs` already is geographic. For projected systems
/// the four corners are transformed and the axis-aligned hull of the results
/// is returned. A missing extent, a missing CRS, or a CRS this crate cannot
/// invert all yield `None`; callers must check before building a predicate.
#[must_use]
pub fn to_geographic(extent: Option<&Extent>, source_crs: Option<&Crs>) -> Option<Extent> {
    let extent = extent?;
    let source_crs = source_crs?;

    if source_crs.is_geographic() {
        return Some(*extent);
    }

    if source_crs.is_web_mercator() {
        let corners = [
            mercator_to_lon_lat(extent.xmin, extent.ymin),
            mercator_to_lon_lat(extent.xmax, extent.ymin),
            mercator_to_lon_lat(extent.xmax, extent.ymax),
            mercator_to_lon_lat(extent.xmin, extent.ymax),
        ];
        let mut out = Extent::new(f64::MAX, f64::MAX, f64::MIN, f64::MIN);
        for (lon, lat) in corners {
            out.xmin = out.xmin.min(lon);
            out.ymin = out.ymin.min(lat);
            out.xmax = out.xmax.max(lon);
            out.ymax = out.ymax.max(lat);
        }
        return Some(out);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geographic_extent_is_identity() {
        let extent = Extent::new(-122.514, 37.708, -122.357, 37.833);
        let crs = Crs::parse("EPSG:4326").unwrap();

        let out = to_geographic(Some(&extent), Some(&crs)).unwrap();
        assert_eq!(out.xmin.to_bits(), extent.xmin.to_bits());
        assert_eq!(out.ymin.to_bits(), extent.ymin.to_bits());
        assert_eq!(out.xmax.to_bits(), extent.xmax.to_bits());
        assert_eq!(out.ymax.to_bits(), extent.ymax.to_bits());
    }

    #[test]
    fn test_crs84_is_geographic() {
        let crs = Crs::parse("ogc:crs84").unwrap();
        assert!(crs.is_geographic());
    }

    #[test]
    fn test_web_mercator_origin() {
        let extent = Extent::new(0.0, 0.0, 0.0, 0.0);
        let crs = Crs::parse("EPSG:3857").unwrap();

        let out = to_geographic(Some(&extent), Some(&crs)).unwrap();
        assert!(out.xmin.abs() < 1e-9);
        assert!(out.ymin.abs() < 1e-9);
    }

    #[test]
    fn test_web_mercator_bounds() {
        // The full mercator square maps back to the familiar world bounds.
        let world = 20_037_508.342_789_244;
        let extent = Extent::new(-world, -world, world, world);
        let crs = Crs::parse("EPSG:3857").unwrap();

        let out = to_geographic(Some(&extent), Some(&crs)).unwrap();
        assert!((out.xmin + 180.0).abs() < 1e-6);
        assert!((out.xmax - 180.0).abs() < 1e-6);
        assert!((out.ymin + 85.051_128_78).abs() < 1e-6);
        assert!((out.ymax - 85.051_128_78).abs() < 1e-6);
    }

    #[test]
    fn test_extreme_mercator_input_does_not_panic() {
        let extent = Extent::new(-1e12, -1e12, 1e12, 1e12);
        let crs = Crs::parse("EPSG:3857").unwrap();

        let out = to_geographic(Some(&extent), Some(&crs)).unwrap();
        assert!(out.ymax <= 90.0);
        assert!(out.ymin >= -90.0);
    }

    #[test]
    fn test_missing_inputs_are_none() {
        let extent = Extent::new(0.0, 0.0, 1.0, 1.0);
        let crs = Crs::parse("EPSG:4326").unwrap();

        assert!(to_geographic(None, Some(&crs)).is_none());
        assert!(to_geographic(Some(&extent), None).is_none());
    }

    #[test]
    fn test_unsupported_crs_is_none() {
        let extent = Extent::new(0.0, 0.0, 1.0, 1.0);
        let crs = Crs::parse("EPSG:27700").unwrap();

        assert!(to_geographic(Some(&extent), Some(&crs)).is_none());
    }

    #[test]
    fn test_bad_identifiers_fail_to_parse() {
        assert!(Crs::parse("4326").is_none());
        assert!(Crs::parse("EPSG:").is_none());
        assert!(Crs::parse("").is_none());
    }
}
