use std::mem;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::console_log;
use crate::error::{DecodeError, DecodeResult};
use crate::pbf::decode_zigzag32;
use crate::projection::{self, LatLng, TileId};
use crate::tile::GeomType;

pub const CMD_MOVE_TO: u32 = 1;
pub const CMD_LINE_TO: u32 = 2;
pub const CMD_CLOSE_PATH: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point2d<T> {
    pub x: T,
    pub y: T,
}

impl<T> Point2d<T> {
    pub fn new(x: T, y: T) -> Self {
        Self { x, y }
    }
}

impl Point2d<i32> {
    pub fn scale<T: ScaleTarget>(self, factor: f64) -> Point2d<T> {
        Point2d::new(
            T::from_scaled(f64::from(self.x) * factor),
            T::from_scaled(f64::from(self.y) * factor),
        )
    }
}

impl Point2d<f64> {
    /// Geographic position of this tile-space point.
    pub fn to_lat_lng(self, tile: TileId, extent: f64) -> LatLng {
        projection::to_geographic(self, tile, extent)
    }
}

impl From<Point2d<f64>> for geo_types::Coord<f64> {
    fn from(point: Point2d<f64>) -> Self {
        geo_types::Coord {
            x: point.x,
            y: point.y,
        }
    }
}

impl From<geo_types::Coord<f64>> for Point2d<f64> {
    fn from(coord: geo_types::Coord<f64>) -> Self {
        Point2d::new(coord.x, coord.y)
    }
}

/// One contiguous part of a geometry. Closed polygon rings repeat their first
/// point at the end.
pub type Ring<T> = Vec<Point2d<T>>;

/// Decoded feature geometry in tile space.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub geom_type: GeomType,
    /// Extent of the layer the rings were decoded from.
    pub extent: u32,
    /// Factor already applied to every coordinate.
    pub scale: f64,
    pub rings: Vec<Ring<f64>>,
}

impl Geometry {
    /// Extent expressed in the same units as the scaled rings.
    pub fn scaled_extent(&self) -> f64 {
        f64::from(self.extent) * self.scale
    }

    pub fn is_empty(&self) -> bool {
        self.rings.iter().all(Vec::is_empty)
    }

    pub fn point_count(&self) -> usize {
        self.rings.iter().map(Vec::len).sum()
    }
}

/// Interpret a command stream as integer tile-space rings.
///
/// Each MoveTo point closes the ring in progress, so multi-points come back as
/// one ring per point and multi-lines/polygons as one ring per part. ClosePath
/// repeats the first point only for polygons. Unknown commands are skipped
/// together with their parameters.
pub fn decode_commands(geom_type: GeomType, commands: &[u32]) -> DecodeResult<Vec<Ring<i32>>> {
    let mut rings = Vec::new();
    let mut ring: Ring<i32> = Vec::new();
    let (mut x, mut y) = (0i32, 0i32);
    let mut i = 0;

    while i < commands.len() {
        let position = i;
        let id = commands[i] & 0x7;
        let count = (commands[i] >> 3) as usize;
        i += 1;

        match id {
            CMD_MOVE_TO | CMD_LINE_TO => {
                let params = parameters(commands, position, i, count)?;
                for pair in params.chunks_exact(2) {
                    x = x.wrapping_add(decode_zigzag32(pair[0]));
                    y = y.wrapping_add(decode_zigzag32(pair[1]));
                    if id == CMD_MOVE_TO && !ring.is_empty() {
                        rings.push(mem::take(&mut ring));
                    }
                    ring.push(Point2d::new(x, y));
                }
                i += params.len();
            }
            CMD_CLOSE_PATH => {
                if geom_type == GeomType::Polygon {
                    if let Some(first) = ring.first().copied() {
                        ring.push(first);
                    }
                }
            }
            other => {
                console_log!("Skipping unknown geometry command {} at {}", other, position);
                i += parameters(commands, position, i, count)?.len();
            }
        }
    }

    if !ring.is_empty() {
        rings.push(ring);
    }
    Ok(rings)
}

fn parameters(commands: &[u32], position: usize, start: usize, count: usize) -> DecodeResult<&[u32]> {
    let needed = count.saturating_mul(2);
    let available = commands.len() - start;
    if needed > available {
        return Err(DecodeError::TruncatedGeometry {
            position,
            needed,
            available,
        });
    }
    Ok(&commands[start..start + needed])
}

/// Decode a command stream and multiply every coordinate by `scale`.
pub fn decode(extent: u32, geom_type: GeomType, commands: &[u32], scale: f64) -> DecodeResult<Geometry> {
    let rings = decode_commands(geom_type, commands)?;
    Ok(Geometry {
        geom_type,
        extent,
        scale,
        rings: scale_rings(&rings, scale),
    })
}

/// Numeric representation a ring can be scaled into.
pub trait ScaleTarget: Copy {
    fn from_scaled(value: f64) -> Self;
}

impl ScaleTarget for i32 {
    fn from_scaled(value: f64) -> Self {
        value.round() as i32
    }
}

impl ScaleTarget for i64 {
    fn from_scaled(value: f64) -> Self {
        value.round() as i64
    }
}

impl ScaleTarget for f32 {
    fn from_scaled(value: f64) -> Self {
        value as f32
    }
}

impl ScaleTarget for f64 {
    fn from_scaled(value: f64) -> Self {
        value
    }
}

pub fn scale_rings<T: ScaleTarget>(rings: &[Ring<i32>], factor: f64) -> Vec<Ring<T>> {
    rings
        .iter()
        .map(|ring| ring.iter().map(|p| p.scale(factor)).collect())
        .collect()
}

/// Scale target chosen at runtime, e.g. from decode options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleKind {
    Int,
    Long,
    #[default]
    Float,
}

impl FromStr for ScaleKind {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "int" | "i32" => Ok(ScaleKind::Int),
            "long" | "i64" => Ok(ScaleKind::Long),
            "float" | "double" | "f64" => Ok(ScaleKind::Float),
            _ => Err(DecodeError::UnsupportedScaleType(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScaledRings {
    Int(Vec<Ring<i32>>),
    Long(Vec<Ring<i64>>),
    Float(Vec<Ring<f64>>),
}

pub fn scale_as(rings: &[Ring<i32>], factor: f64, kind: ScaleKind) -> ScaledRings {
    match kind {
        ScaleKind::Int => ScaledRings::Int(scale_rings(rings, factor)),
        ScaleKind::Long => ScaledRings::Long(scale_rings(rings, factor)),
        ScaleKind::Float => ScaledRings::Float(scale_rings(rings, factor)),
    }
}

/// Surveyor's-formula area. Positive for exterior rings in tile space
/// (y pointing down), negative for holes.
pub fn signed_area(ring: &[Point2d<f64>]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for (i, a) in ring.iter().enumerate() {
        let b = ring[(i + 1) % ring.len()];
        sum += a.x * b.y - b.x * a.y;
    }
    sum / 2.0
}

/// Group polygon rings into polygons: each positive-area ring starts a new
/// polygon and following negative-area rings are its holes. Returns ring
/// indices per polygon.
pub fn group_polygons(rings: &[Ring<f64>]) -> Vec<Vec<usize>> {
    let mut polygons: Vec<Vec<usize>> = Vec::new();
    for (index, ring) in rings.iter().enumerate() {
        match polygons.last_mut() {
            Some(polygon) if signed_area(ring) <= 0.0 => polygon.push(index),
            _ => polygons.push(vec![index]),
        }
    }
    polygons
}
