use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, DecodeResult};
use crate::geometry::ScaleKind;

/// Options accepted by [`crate::pipeline::decode_tile`] and the wasm entry
/// points. Missing fields take their defaults, so `{}` is a valid options
/// object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DecodeOptions {
    /// Clip geometry to the tile square plus `buffer_size`.
    pub clip: bool,
    /// Overhang past the tile edge kept when clipping, in extent units.
    pub buffer_size: f64,
    /// Multiplier applied to tile-space coordinates.
    pub scale: f64,
    /// Numeric target for scaled coordinates: "int", "long" or "float".
    pub scale_type: String,
    /// Fail features whose projection leaves the Web Mercator envelope.
    pub check_bounds: bool,
    /// Only decode these layers when set.
    pub layers: Option<Vec<String>>,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            clip: false,
            buffer_size: 0.0,
            scale: 1.0,
            scale_type: "float".to_string(),
            check_bounds: false,
            layers: None,
        }
    }
}

impl DecodeOptions {
    pub fn from_json(json: &str) -> DecodeResult<Self> {
        let options: Self =
            serde_json::from_str(json).map_err(|e| DecodeError::InvalidOptions(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> DecodeResult<()> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(DecodeError::InvalidOptions(format!(
                "scale must be a positive number, got {}",
                self.scale
            )));
        }
        if !self.buffer_size.is_finite() || self.buffer_size < 0.0 {
            return Err(DecodeError::InvalidOptions(format!(
                "bufferSize must be zero or positive, got {}",
                self.buffer_size
            )));
        }
        self.scale_kind().map(|_| ())
    }

    pub fn scale_kind(&self) -> DecodeResult<ScaleKind> {
        self.scale_type.parse()
    }

    pub fn wants_layer(&self, name: &str) -> bool {
        match &self.layers {
            Some(layers) => layers.iter().any(|l| l == name),
            None => true,
        }
    }
}
