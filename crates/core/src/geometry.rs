//! Areas of interest.
//!
//! An [`Area`] is a validated, counter-clockwise oriented lon/lat polygon.
//! It can be read from WKT, GeoJSON or a `minx,miny,maxx,maxy` bounding box,
//! and renders back to WKT in a canonical form so identifiers and catalog
//! entries derived from it are reproducible.

use std::f64::consts::{PI, TAU};

use geo::algorithm::orient::{Direction, Orient};
use geo::{
    Area as _, Centroid, ConvexHull, Coord, Geometry, LineString, MultiPoint, Point, Polygon, Rect,
};
use wkt::TryFromWkt;

use crate::error::CoreError;

const EARTH_RADIUS: f64 = 6_378_137.0;

/// Number of vertices used to approximate the buffer disc around each corner.
const BUFFER_SEGMENTS: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub struct Area {
    polygon: Polygon<f64>,
    centroid: Coord<f64>,
}

impl Area {
    /// Validate and orient a lon/lat polygon.
    pub fn from_polygon(polygon: Polygon<f64>) -> Result<Self, CoreError> {
        let rings = std::iter::once(polygon.exterior()).chain(polygon.interiors());
        for ring in rings {
            for c in ring.coords() {
                if !c.x.is_finite() || !c.y.is_finite() {
                    return Err(CoreError::invalid("area has non-finite coordinates"));
                }
                if !(-180.0..=180.0).contains(&c.x) || !(-90.0..=90.0).contains(&c.y) {
                    return Err(CoreError::invalid(format!(
                        "area coordinate ({}, {}) is outside lon/lat bounds",
                        c.x, c.y
                    )));
                }
            }
        }
        if polygon.exterior().0.len() < 4 || polygon.unsigned_area() <= 0.0 {
            return Err(CoreError::invalid("area polygon is empty or degenerate"));
        }
        let centroid = polygon
            .centroid()
            .ok_or_else(|| CoreError::invalid("area polygon has no centroid"))?;
        Ok(Self {
            polygon: polygon.orient(Direction::Default),
            centroid: centroid.0,
        })
    }

    pub fn from_rect(rect: Rect<f64>) -> Result<Self, CoreError> {
        Self::from_polygon(rect.to_polygon())
    }

    /// Parse an area descriptor: GeoJSON text, a `minx,miny,maxx,maxy`
    /// bounding box, or WKT.
    pub fn parse(text: &str) -> Result<Self, CoreError> {
        let trimmed = text.trim();
        if trimmed.starts_with('{') {
            return Self::from_geojson_str(trimmed);
        }
        if let Some(rect) = parse_bbox(trimmed) {
            return Self::from_rect(rect);
        }
        Self::from_wkt(trimmed)
    }

    pub fn from_wkt(text: &str) -> Result<Self, CoreError> {
        let geometry = Geometry::<f64>::try_from_wkt_str(text)
            .map_err(|e| CoreError::invalid(format!("could not parse area WKT: {e}")))?;
        Self::from_geometry(geometry)
    }

    /// Accepts polygons, rectangles and single-member multipolygons.
    pub fn from_geometry(geometry: Geometry<f64>) -> Result<Self, CoreError> {
        match geometry {
            Geometry::Polygon(p) => Self::from_polygon(p),
            Geometry::Rect(r) => Self::from_rect(r),
            Geometry::MultiPolygon(mut mp) if mp.0.len() == 1 => Self::from_polygon(mp.0.remove(0)),
            other => Err(CoreError::invalid(format!(
                "area must be a single polygon, got {}",
                geometry_kind(&other)
            ))),
        }
    }

    pub fn from_geojson_str(text: &str) -> Result<Self, CoreError> {
        let document: geojson::GeoJson = text
            .parse()
            .map_err(|e| CoreError::invalid(format!("could not parse area GeoJSON: {e}")))?;
        match document {
            geojson::GeoJson::Geometry(g) => Self::from_geojson_geometry(&g),
            geojson::GeoJson::Feature(f) => match &f.geometry {
                Some(g) => Self::from_geojson_geometry(g),
                None => Err(CoreError::invalid("GeoJSON feature has no geometry")),
            },
            geojson::GeoJson::FeatureCollection(fc) => match fc.features.as_slice() {
                [single] => match &single.geometry {
                    Some(g) => Self::from_geojson_geometry(g),
                    None => Err(CoreError::invalid("GeoJSON feature has no geometry")),
                },
                features => Err(CoreError::invalid(format!(
                    "GeoJSON area must hold exactly one feature, got {}",
                    features.len()
                ))),
            },
        }
    }

    pub fn from_geojson_geometry(geometry: &geojson::Geometry) -> Result<Self, CoreError> {
        let converted = Geometry::<f64>::try_from(geometry.value.clone())
            .map_err(|e| CoreError::invalid(format!("unsupported GeoJSON geometry: {e}")))?;
        Self::from_geometry(converted)
    }

    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    /// Centroid as (lon, lat).
    pub fn centroid(&self) -> Coord<f64> {
        self.centroid
    }

    /// Canonical WKT: shortest round-trip decimal representation.
    pub fn to_wkt(&self) -> String {
        polygon_wkt(&self.polygon, None)
    }

    /// WKT with a fixed number of decimal digits.
    pub fn to_wkt_with_precision(&self, digits: usize) -> String {
        polygon_wkt(&self.polygon, Some(digits))
    }

    pub fn to_geojson_geometry(&self) -> geojson::Geometry {
        geojson::Geometry::new(geojson::Value::from(&self.polygon))
    }

    /// Expand the area by `distance` metres.
    ///
    /// Distances are measured in a tangent plane at the centroid. The result
    /// is the convex envelope of the buffered outline, which is a superset of
    /// the exact buffer for concave areas.
    pub fn buffered(&self, distance: f64) -> Result<Self, CoreError> {
        if !distance.is_finite() || distance < 0.0 {
            return Err(CoreError::invalid(format!(
                "buffer distance must be a non-negative number, got {distance}"
            )));
        }
        if distance == 0.0 {
            return Ok(self.clone());
        }

        let plane = LocalTangentPlane::new(self.centroid);
        // Circumscribe the disc so the polygonal approximation never falls short.
        let radius = distance / (PI / BUFFER_SEGMENTS as f64).cos();
        let mut points = Vec::with_capacity(self.polygon.exterior().0.len() * BUFFER_SEGMENTS);
        for c in self.polygon.exterior().coords() {
            let p = plane.project(*c);
            for k in 0..BUFFER_SEGMENTS {
                let angle = TAU * k as f64 / BUFFER_SEGMENTS as f64;
                points.push(Point::new(
                    p.x + radius * angle.cos(),
                    p.y + radius * angle.sin(),
                ));
            }
        }

        let hull = MultiPoint::new(points).convex_hull();
        let exterior: LineString<f64> = hull
            .exterior()
            .coords()
            .map(|c| plane.unproject(*c))
            .collect();
        Self::from_polygon(Polygon::new(exterior, Vec::new()))
    }
}

/// Equirectangular projection around a reference point. Accurate enough for
/// buffers of a few tens of kilometres.
struct LocalTangentPlane {
    center: Coord<f64>,
    cos_lat: f64,
}

impl LocalTangentPlane {
    fn new(center: Coord<f64>) -> Self {
        Self {
            center,
            cos_lat: center.y.to_radians().cos(),
        }
    }

    fn project(&self, c: Coord<f64>) -> Coord<f64> {
        Coord {
            x: (c.x - self.center.x).to_radians() * EARTH_RADIUS * self.cos_lat,
            y: (c.y - self.center.y).to_radians() * EARTH_RADIUS,
        }
    }

    fn unproject(&self, c: Coord<f64>) -> Coord<f64> {
        Coord {
            x: self.center.x + (c.x / (EARTH_RADIUS * self.cos_lat)).to_degrees(),
            y: self.center.y + (c.y / EARTH_RADIUS).to_degrees(),
        }
    }
}

fn parse_bbox(text: &str) -> Option<Rect<f64>> {
    let values: Vec<f64> = text
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .ok()?;
    match values.as_slice() {
        [min_x, min_y, max_x, max_y] => Some(Rect::new(
            Coord { x: *min_x, y: *min_y },
            Coord { x: *max_x, y: *max_y },
        )),
        _ => None,
    }
}

fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

fn polygon_wkt(polygon: &Polygon<f64>, precision: Option<usize>) -> String {
    let rings: Vec<String> = std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(|ring| {
            let coords: Vec<String> = ring
                .coords()
                .map(|c| format!("{} {}", format_number(c.x, precision), format_number(c.y, precision)))
                .collect();
            format!("({})", coords.join(", "))
        })
        .collect();
    format!("POLYGON ({})", rings.join(", "))
}

fn format_number(value: f64, precision: Option<usize>) -> String {
    // Avoid rendering "-0".
    let value = if value == 0.0 { 0.0 } else { value };
    match precision {
        Some(digits) => {
            let rendered = format!("{:.*}", digits, value);
            if rendered.trim_start_matches('-').chars().all(|ch| ch == '0' || ch == '.') {
                rendered.trim_start_matches('-').to_string()
            } else {
                rendered
            }
        }
        None => format!("{}", value),
    }
}
