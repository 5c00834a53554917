use std::panic::{self, AssertUnwindSafe};

use geo::{BooleanOps, Coord, LineString, MultiLineString, MultiPolygon, Polygon, Rect};

use crate::console_log;
use crate::geometry::{group_polygons, signed_area, Geometry, Point2d, Ring};
use crate::tile::GeomType;

/// Square clip window `[-buffer, extent + buffer]²`, in scaled units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipBox {
    pub min: f64,
    pub max: f64,
}

impl ClipBox {
    pub fn new(extent: u32, buffer_size: f64, scale: f64) -> Self {
        Self {
            min: -buffer_size * scale,
            max: (f64::from(extent) + buffer_size) * scale,
        }
    }

    pub fn contains(&self, point: &Point2d<f64>) -> bool {
        point.x >= self.min && point.x <= self.max && point.y >= self.min && point.y <= self.max
    }

    fn to_polygon(self) -> Polygon<f64> {
        Rect::new(
            Coord {
                x: self.min,
                y: self.min,
            },
            Coord {
                x: self.max,
                y: self.max,
            },
        )
        .to_polygon()
    }
}

/// Clip rings to `[-buffer_size, extent + buffer_size]²`, scaled by `scale`.
///
/// Points outside the window are dropped. Lines and polygons that overhang it
/// go through `geo`'s boolean operations. If that fails the input rings come
/// back unclipped, so the output is not guaranteed to be bounded.
pub fn clip(
    rings: &[Ring<f64>],
    geom_type: GeomType,
    extent: u32,
    buffer_size: f64,
    scale: f64,
) -> Vec<Ring<f64>> {
    let window = ClipBox::new(extent, buffer_size, scale);
    match geom_type {
        GeomType::Point => clip_points(rings, &window),
        GeomType::LineString | GeomType::Polygon => {
            if rings.iter().flatten().all(|p| window.contains(p)) {
                return rings.to_vec();
            }
            clip_paths(rings, geom_type, &window).unwrap_or_else(|| {
                console_log!(
                    "Clipping {:?} geometry with {} rings failed, keeping it unclipped",
                    geom_type,
                    rings.len()
                );
                rings.to_vec()
            })
        }
        GeomType::Unknown => rings.to_vec(),
    }
}

/// Clip a decoded geometry using its own extent and scale.
pub fn clip_geometry(geometry: &Geometry, buffer_size: f64) -> Geometry {
    Geometry {
        rings: clip(
            &geometry.rings,
            geometry.geom_type,
            geometry.extent,
            buffer_size,
            geometry.scale,
        ),
        ..geometry.clone()
    }
}

fn clip_points(rings: &[Ring<f64>], window: &ClipBox) -> Vec<Ring<f64>> {
    rings
        .iter()
        .map(|ring| ring.iter().copied().filter(|p| window.contains(p)).collect::<Ring<f64>>())
        .filter(|ring| !ring.is_empty())
        .collect()
}

fn clip_paths(rings: &[Ring<f64>], geom_type: GeomType, window: &ClipBox) -> Option<Vec<Ring<f64>>> {
    if rings
        .iter()
        .flatten()
        .any(|p| !p.x.is_finite() || !p.y.is_finite())
    {
        return None;
    }
    let window = MultiPolygon::new(vec![window.to_polygon()]);
    panic::catch_unwind(AssertUnwindSafe(|| match geom_type {
        GeomType::Polygon => clip_polygons(rings, &window),
        _ => clip_lines(rings, &window),
    }))
    .ok()
}

fn clip_lines(rings: &[Ring<f64>], window: &MultiPolygon<f64>) -> Vec<Ring<f64>> {
    let lines = MultiLineString::new(
        rings
            .iter()
            .filter(|ring| ring.len() >= 2)
            .map(|ring| to_line_string(ring))
            .collect(),
    );
    window
        .clip(&lines, false)
        .0
        .iter()
        .map(from_line_string)
        .filter(|ring| ring.len() >= 2)
        .collect()
}

fn clip_polygons(rings: &[Ring<f64>], window: &MultiPolygon<f64>) -> Vec<Ring<f64>> {
    let polygons: Vec<Polygon<f64>> = group_polygons(rings)
        .into_iter()
        .filter_map(|indices| {
            let mut parts = indices.into_iter().map(|i| to_line_string(&rings[i]));
            let exterior = parts.next()?;
            Some(Polygon::new(exterior, parts.collect()))
        })
        .collect();

    let clipped = MultiPolygon::new(polygons).intersection(window);

    let mut out = Vec::new();
    for polygon in &clipped.0 {
        out.push(repair_ring(from_line_string(polygon.exterior()), true));
        for hole in polygon.interiors() {
            out.push(repair_ring(from_line_string(hole), false));
        }
    }
    out
}

/// Restore the closing vertex and the tile-space winding the decoder emits:
/// positive area for exteriors, negative for holes. Boolean-op output is not
/// guaranteed to keep either.
fn repair_ring(mut ring: Ring<f64>, exterior: bool) -> Ring<f64> {
    if let (Some(first), Some(last)) = (ring.first().copied(), ring.last().copied()) {
        if first != last {
            ring.insert(0, last);
        }
    }
    let area = signed_area(&ring);
    if (exterior && area < 0.0) || (!exterior && area > 0.0) {
        ring.reverse();
    }
    ring
}

fn to_line_string(ring: &Ring<f64>) -> LineString<f64> {
    LineString::new(ring.iter().map(|p| Coord::from(*p)).collect())
}

fn from_line_string(line: &LineString<f64>) -> Ring<f64> {
    line.coords().map(|c| Point2d::from(*c)).collect()
}
