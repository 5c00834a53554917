use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, DecodeResult};
use crate::geometry::{Point2d, Ring};

/// Latitude limit of the square Web Mercator world.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_6;
pub const MAX_LONGITUDE: f64 = 180.0;

// Slack for float error exactly on the tile-pyramid edge.
const BOUNDS_EPSILON: f64 = 1e-9;

/// Position of a tile in the z/x/y pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TileId {
    pub zoom: u8,
    pub column: u32,
    pub row: u32,
}

impl TileId {
    pub fn new(zoom: u8, column: u32, row: u32) -> Self {
        Self { zoom, column, row }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_within_mercator_bounds(&self) -> bool {
        self.lng.abs() <= MAX_LONGITUDE + BOUNDS_EPSILON
            && self.lat.abs() <= MAX_LATITUDE + BOUNDS_EPSILON
    }
}

/// Project a point expressed in a tile of size `extent` to longitude/latitude.
pub fn to_geographic(point: Point2d<f64>, tile: TileId, extent: f64) -> LatLng {
    let size = extent * 2f64.powi(i32::from(tile.zoom));
    let origin_x = extent * f64::from(tile.column);
    let origin_y = extent * f64::from(tile.row);

    let mercator_y = 180.0 - (point.y + origin_y) * 360.0 / size;
    let lng = (point.x + origin_x) * 360.0 / size - 180.0;
    let lat = 360.0 / PI * (mercator_y * PI / 180.0).exp().atan() - 90.0;

    LatLng { lat, lng }
}

/// Projects points of one tile, optionally rejecting results outside the
/// Web Mercator envelope.
#[derive(Debug, Clone, Copy)]
pub struct Projector {
    tile: TileId,
    extent: f64,
    check_bounds: bool,
}

impl Projector {
    pub fn new(tile: TileId, extent: f64) -> Self {
        Self {
            tile,
            extent,
            check_bounds: false,
        }
    }

    pub fn with_bounds_check(mut self, check_bounds: bool) -> Self {
        self.check_bounds = check_bounds;
        self
    }

    pub fn project(&self, point: Point2d<f64>) -> DecodeResult<LatLng> {
        let projected = to_geographic(point, self.tile, self.extent);
        if self.check_bounds && !projected.is_within_mercator_bounds() {
            return Err(DecodeError::OutOfRange {
                lng: projected.lng,
                lat: projected.lat,
            });
        }
        Ok(projected)
    }

    pub fn project_rings(&self, rings: &[Ring<f64>]) -> DecodeResult<Vec<Vec<LatLng>>> {
        rings
            .iter()
            .map(|ring| ring.iter().map(|p| self.project(*p)).collect())
            .collect()
    }
}
