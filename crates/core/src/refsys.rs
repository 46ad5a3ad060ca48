//! Reference systems and target grids.
//!
//! Only WGS 84 / UTM systems are supported (EPSG 32601–32660 north,
//! 32701–32760 south). That covers the default case, where the system is
//! the UTM zone closest to the area, and explicit `--epsg` overrides.

use std::fmt;

use geo::Coord;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// WGS 84 ellipsoid and UTM constants.
const SEMI_MAJOR_AXIS: f64 = 6_378_137.0;
const FLATTENING: f64 = 1.0 / 298.257_223_563;
const SCALE_FACTOR: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Default output shape (rows, cols) when none is requested.
pub const DEFAULT_SHAPE: GridShape = GridShape {
    rows: 512,
    cols: 512,
};

/// Default sample spacing of the target grid, in reference-system units.
pub const DEFAULT_SAMPLE_SPACING: f64 = 10.0;

/// A WGS 84 / UTM projected reference system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct ReferenceSystem {
    zone: u8,
    north: bool,
}

impl ReferenceSystem {
    pub fn utm(zone: u8, north: bool) -> Result<Self, CoreError> {
        if !(1..=60).contains(&zone) {
            return Err(CoreError::invalid(format!(
                "UTM zone must be within 1..=60, got {zone}"
            )));
        }
        Ok(Self { zone, north })
    }

    /// Resolve an EPSG code. Only WGS 84 / UTM codes are accepted.
    pub fn from_epsg(code: u32) -> Result<Self, CoreError> {
        match code {
            32601..=32660 => Self::utm((code - 32600) as u8, true),
            32701..=32760 => Self::utm((code - 32700) as u8, false),
            _ => Err(CoreError::invalid(format!(
                "unsupported reference system EPSG:{code} (expected a WGS 84 / UTM code)"
            ))),
        }
    }

    /// The UTM zone containing a (lon, lat) position.
    pub fn utm_for(position: Coord<f64>) -> Result<Self, CoreError> {
        if !position.x.is_finite() || !position.y.is_finite() {
            return Err(CoreError::invalid("position has non-finite coordinates"));
        }
        let lon = position.x.clamp(-180.0, 180.0);
        let zone = (((lon + 180.0) / 6.0).floor() as i64 + 1).clamp(1, 60) as u8;
        Self::utm(zone, position.y >= 0.0)
    }

    pub fn zone(&self) -> u8 {
        self.zone
    }

    pub fn is_north(&self) -> bool {
        self.north
    }

    pub fn epsg(&self) -> u32 {
        let base = if self.north { 32600 } else { 32700 };
        base + u32::from(self.zone)
    }

    /// Stable textual descriptor, e.g. `EPSG:32633`.
    pub fn descriptor(&self) -> String {
        format!("EPSG:{}", self.epsg())
    }

    /// Human-readable projection name.
    pub fn name(&self) -> String {
        let hemisphere = if self.north { 'N' } else { 'S' };
        format!("WGS 84 / UTM zone {}{}", self.zone, hemisphere)
    }

    /// Project a (lon, lat) position to (easting, northing) metres.
    ///
    /// Transverse Mercator series expansion (Snyder, USGS PP 1395, §8).
    pub fn project(&self, position: Coord<f64>) -> Coord<f64> {
        let e2 = FLATTENING * (2.0 - FLATTENING);
        let e4 = e2 * e2;
        let e6 = e4 * e2;
        let ep2 = e2 / (1.0 - e2);

        let central_meridian = (f64::from(self.zone) - 1.0) * 6.0 - 180.0 + 3.0;
        let phi = position.y.to_radians();
        let dlambda = (position.x - central_meridian).to_radians();

        let (sin_phi, cos_phi) = phi.sin_cos();
        let tan_phi = phi.tan();
        let n = SEMI_MAJOR_AXIS / (1.0 - e2 * sin_phi * sin_phi).sqrt();
        let t = tan_phi * tan_phi;
        let c = ep2 * cos_phi * cos_phi;
        let a = cos_phi * dlambda;

        let m = SEMI_MAJOR_AXIS
            * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
                - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
                + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
                - (35.0 * e6 / 3072.0) * (6.0 * phi).sin());

        let easting = SCALE_FACTOR
            * n
            * (a + (1.0 - t + c) * a.powi(3) / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0)
            + FALSE_EASTING;

        let mut northing = SCALE_FACTOR
            * (m + n
                * tan_phi
                * (a * a / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0));
        if !self.north {
            northing += FALSE_NORTHING_SOUTH;
        }

        Coord {
            x: easting,
            y: northing,
        }
    }
}

impl TryFrom<u32> for ReferenceSystem {
    type Error = CoreError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        Self::from_epsg(code)
    }
}

impl From<ReferenceSystem> for u32 {
    fn from(refsys: ReferenceSystem) -> Self {
        refsys.epsg()
    }
}

impl fmt::Display for ReferenceSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.descriptor(), self.name())
    }
}

/// Raster shape in (rows, cols).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridShape {
    pub rows: u32,
    pub cols: u32,
}

impl GridShape {
    pub fn new(rows: u32, cols: u32) -> Result<Self, CoreError> {
        if rows == 0 || cols == 0 {
            return Err(CoreError::invalid(format!(
                "grid shape must be positive, got {rows}x{cols}"
            )));
        }
        Ok(Self { rows, cols })
    }

    /// A square shape.
    pub fn square(size: u32) -> Result<Self, CoreError> {
        Self::new(size, size)
    }
}

impl Default for GridShape {
    fn default() -> Self {
        DEFAULT_SHAPE
    }
}

impl fmt::Display for GridShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

/// Target grid handed to the raster collaborator.
///
/// `origin` is the south-west corner in reference-system coordinates
/// (easting, northing); `offset` is a whole-sample shift applied by the
/// mosaicking engine and is zero for centred sample grids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    origin: [f64; 2],
    shape: GridShape,
    offset: [i64; 2],
    sample_spacing: [f64; 2],
    reference_system: ReferenceSystem,
}

impl GridSpec {
    pub fn new(
        origin: [f64; 2],
        shape: GridShape,
        offset: [i64; 2],
        sample_spacing: [f64; 2],
        reference_system: ReferenceSystem,
    ) -> Result<Self, CoreError> {
        if !origin.iter().all(|v| v.is_finite()) {
            return Err(CoreError::invalid("grid origin must be finite"));
        }
        if !sample_spacing.iter().all(|v| v.is_finite() && *v > 0.0) {
            return Err(CoreError::invalid(format!(
                "grid sample spacing must be positive, got {:?}",
                sample_spacing
            )));
        }
        GridShape::new(shape.rows, shape.cols)?;
        Ok(Self {
            origin,
            shape,
            offset,
            sample_spacing,
            reference_system,
        })
    }

    /// A grid of `shape` samples spaced `spacing` apart, centred on a
    /// (lon, lat) position.
    pub fn centred_on(
        position: Coord<f64>,
        shape: GridShape,
        spacing: f64,
        reference_system: ReferenceSystem,
    ) -> Result<Self, CoreError> {
        let centre = reference_system.project(position);
        let half_width = (spacing * f64::from(shape.cols) / 2.0).floor();
        let half_height = (spacing * f64::from(shape.rows) / 2.0).floor();
        Self::new(
            [centre.x - half_width, centre.y - half_height],
            shape,
            [0, 0],
            [spacing, spacing],
            reference_system,
        )
    }

    pub fn origin(&self) -> [f64; 2] {
        self.origin
    }

    pub fn shape(&self) -> GridShape {
        self.shape
    }

    pub fn offset(&self) -> [i64; 2] {
        self.offset
    }

    pub fn sample_spacing(&self) -> [f64; 2] {
        self.sample_spacing
    }

    pub fn reference_system(&self) -> ReferenceSystem {
        self.reference_system
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utm_zone_for_position() {
        let oslo = ReferenceSystem::utm_for(Coord { x: 10.75, y: 59.91 }).unwrap();
        assert_eq!(oslo.epsg(), 32632);
        let tromso = ReferenceSystem::utm_for(Coord { x: 18.95, y: 69.65 }).unwrap();
        assert_eq!(tromso.descriptor(), "EPSG:32634");
        let sydney = ReferenceSystem::utm_for(Coord { x: 151.2, y: -33.87 }).unwrap();
        assert_eq!(sydney.epsg(), 32756);
        let antimeridian = ReferenceSystem::utm_for(Coord { x: 180.0, y: 0.0 }).unwrap();
        assert_eq!(antimeridian.zone(), 60);
    }

    #[test]
    fn epsg_round_trip_and_rejection() {
        assert_eq!(ReferenceSystem::from_epsg(32633).unwrap().zone(), 33);
        assert!(!ReferenceSystem::from_epsg(32733).unwrap().is_north());
        assert!(ReferenceSystem::from_epsg(4326).is_err());
        assert!(ReferenceSystem::from_epsg(32600).is_err());
    }

    #[test]
    fn projects_central_meridian_on_false_easting() {
        let zone33 = ReferenceSystem::from_epsg(32633).unwrap();
        let p = zone33.project(Coord { x: 15.0, y: 0.0 });
        assert!((p.x - 500_000.0).abs() < 1e-6);
        assert!(p.y.abs() < 1e-6);
    }

    #[test]
    fn projects_known_position() {
        // Reference value for EPSG:32632.
        let zone32 = ReferenceSystem::from_epsg(32632).unwrap();
        let p = zone32.project(Coord { x: 10.0, y: 60.0 });
        assert!((p.x - 555_776.27).abs() < 0.5, "easting {}", p.x);
        assert!((p.y - 6_651_832.73).abs() < 0.5, "northing {}", p.y);
    }

    #[test]
    fn grid_is_centred_on_position() {
        let refsys = ReferenceSystem::from_epsg(32632).unwrap();
        let position = Coord { x: 10.0, y: 60.0 };
        let grid = GridSpec::centred_on(position, DEFAULT_SHAPE, 10.0, refsys).unwrap();
        let centre = refsys.project(position);
        assert_eq!(grid.origin(), [centre.x - 2560.0, centre.y - 2560.0]);
        assert_eq!(grid.sample_spacing(), [10.0, 10.0]);
        assert_eq!(grid.offset(), [0, 0]);
    }

    #[test]
    fn grid_parameters_are_validated() {
        let refsys = ReferenceSystem::from_epsg(32632).unwrap();
        assert!(GridShape::new(0, 10).is_err());
        assert!(GridSpec::new([0.0, 0.0], DEFAULT_SHAPE, [0, 0], [0.0, 10.0], refsys).is_err());
        assert!(GridSpec::new([f64::NAN, 0.0], DEFAULT_SHAPE, [0, 0], [10.0, 10.0], refsys).is_err());
    }

    #[test]
    fn serializes_as_epsg_code() {
        let refsys = ReferenceSystem::from_epsg(32633).unwrap();
        assert_eq!(serde_json::to_string(&refsys).unwrap(), "32633");
        let back: ReferenceSystem = serde_json::from_str("32733").unwrap();
        assert!(!back.is_north());
        assert!(serde_json::from_str::<ReferenceSystem>("4326").is_err());
    }
}
