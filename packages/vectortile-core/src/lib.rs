use wasm_bindgen::prelude::*;
use serde_wasm_bindgen::to_value;

// Create a console module for logging
pub mod console;
pub mod error;
// Protobuf wire-format reader
pub mod pbf;
// Tile/layer/feature view over the buffer
pub mod tile;
pub mod geometry;
pub mod projection;
pub mod clip;
pub mod geojson;
pub mod options;
pub mod inflate;
// Parallel whole-tile decoding
pub mod pipeline;

#[cfg(test)]
mod test_support;

pub use error::{DecodeError, DecodeResult, DecodeStage};
pub use geometry::{Geometry, Point2d, Ring, ScaleKind};
pub use options::DecodeOptions;
pub use pipeline::{decode_tile, decode_tile_to_geojson_string, DecodedFeature, DecodedLayer, DecodedTile};
pub use projection::{LatLng, TileId};
pub use tile::{parse_tile, Feature, GeomType, Layer, LayerSummary, Tile, Value};

// Enable better panic messages in console during development
#[cfg(feature = "console_error_panic_hook")]
pub use console_error_panic_hook::set_once as set_panic_hook;

#[macro_export]
macro_rules! console_log {
    ($($t:tt)*) => ($crate::console::log(&format!($($t)*)))
}

use std::sync::Once;
static INIT: Once = Once::new();

#[wasm_bindgen(start)]
pub fn start() {
    INIT.call_once(|| {
        #[cfg(feature = "console_error_panic_hook")]
        console_error_panic_hook::set_once();

        console_log!("vectortile_core initialized");
    });
}

impl From<DecodeError> for JsValue {
    fn from(err: DecodeError) -> Self {
        js_sys::Error::new(&err.to_string()).into()
    }
}

fn options_from_js(options: JsValue) -> Result<DecodeOptions, JsValue> {
    if options.is_undefined() || options.is_null() {
        return Ok(DecodeOptions::default());
    }
    let options: DecodeOptions = serde_wasm_bindgen::from_value(options)
        .map_err(|e| DecodeError::InvalidOptions(e.to_string()))?;
    options.validate()?;
    Ok(options)
}

/// Decode a (possibly gzip'd) tile into a GeoJSON FeatureCollection string.
#[wasm_bindgen(js_name = decodeTileToGeoJson)]
pub fn decode_tile_to_geojson(data: &[u8], zoom: u8, x: u32, y: u32, options: JsValue) -> Result<String, JsValue> {
    let options = options_from_js(options)?;
    Ok(decode_tile_to_geojson_string(data, TileId::new(zoom, x, y), &options)?)
}

/// Name, extent, version and feature count of every layer in a tile.
#[wasm_bindgen(js_name = listLayers)]
pub fn list_layers(data: &[u8]) -> Result<JsValue, JsValue> {
    let tile = Tile::from_compressed(data)?;
    Ok(to_value(&tile.summaries())?)
}
