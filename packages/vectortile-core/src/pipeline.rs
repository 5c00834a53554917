use rayon::prelude::*;

use crate::clip;
use crate::console_log;
use crate::error::{DecodeError, DecodeResult};
use crate::geojson;
use crate::geometry::{self, Point2d, Ring, ScaleKind, ScaledRings};
use crate::options::DecodeOptions;
use crate::projection::{LatLng, Projector, TileId};
use crate::tile::{Feature, GeomType, Layer, Tile, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFeature {
    pub id: u64,
    pub geom_type: GeomType,
    pub properties: Vec<(String, Value)>,
    /// Scaled (and clipped, if requested) tile-space rings.
    pub rings: Vec<Ring<f64>>,
    /// `rings` projected to longitude/latitude, ring for ring.
    pub geographic: Vec<Vec<LatLng>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureError {
    pub index: usize,
    pub error: DecodeError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedLayer {
    pub name: String,
    pub extent: u32,
    pub features: Vec<DecodedFeature>,
    pub skipped: Vec<FeatureError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTile {
    pub tile: TileId,
    pub layers: Vec<DecodedLayer>,
}

impl DecodedTile {
    pub fn layer(&self, name: &str) -> Option<&DecodedLayer> {
        self.layers.iter().find(|layer| layer.name == name)
    }

    pub fn feature_count(&self) -> usize {
        self.layers.iter().map(|layer| layer.features.len()).sum()
    }
}

/// Decode every allowed layer, features in parallel. A feature that fails is
/// listed in its layer's `skipped` and the rest of the layer carries on.
pub fn decode_tile(tile: &Tile, id: TileId, options: &DecodeOptions) -> DecodeResult<DecodedTile> {
    options.validate()?;
    let kind = options.scale_kind()?;

    let layers = tile
        .layers()
        .iter()
        .filter(|layer| options.wants_layer(layer.name()))
        .map(|layer| decode_layer(layer, id, options, kind))
        .collect();

    Ok(DecodedTile { tile: id, layers })
}

fn decode_layer(layer: &Layer, id: TileId, options: &DecodeOptions, kind: ScaleKind) -> DecodedLayer {
    let projector = Projector::new(id, f64::from(layer.extent()) * options.scale)
        .with_bounds_check(options.check_bounds);

    let results: Vec<(usize, DecodeResult<Option<DecodedFeature>>)> = (0..layer.feature_count())
        .into_par_iter()
        .map(|index| {
            let decoded = layer
                .feature(index)
                .and_then(|feature| decode_feature(&feature, &projector, options, kind));
            (index, decoded)
        })
        .collect();

    let mut features = Vec::with_capacity(results.len());
    let mut skipped = Vec::new();
    for (index, result) in results {
        match result {
            Ok(Some(feature)) => features.push(feature),
            Ok(None) => {}
            Err(error) => {
                console_log!(
                    "Skipping feature {} in layer '{}': {}",
                    index,
                    layer.name(),
                    error
                );
                skipped.push(FeatureError { index, error });
            }
        }
    }

    DecodedLayer {
        name: layer.name().to_string(),
        extent: layer.extent(),
        features,
        skipped,
    }
}

/// `Ok(None)` for features with an unknown geometry type, which have no
/// GeoJSON representation, and for features clipped away entirely.
fn decode_feature(
    feature: &Feature<'_>,
    projector: &Projector,
    options: &DecodeOptions,
    kind: ScaleKind,
) -> DecodeResult<Option<DecodedFeature>> {
    let geom_type = feature.geom_type();
    if geom_type == GeomType::Unknown {
        return Ok(None);
    }

    let properties = feature
        .properties()?
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect();

    let commands = feature.commands()?;
    let raw = geometry::decode_commands(geom_type, &commands)?;
    let mut rings = to_float_rings(geometry::scale_as(&raw, options.scale, kind));

    if options.clip {
        rings = clip::clip(
            &rings,
            geom_type,
            feature.layer().extent(),
            options.buffer_size,
            options.scale,
        );
        if rings.is_empty() {
            return Ok(None);
        }
    }

    let geographic = projector.project_rings(&rings)?;

    Ok(Some(DecodedFeature {
        id: feature.id(),
        geom_type,
        properties,
        rings,
        geographic,
    }))
}

fn to_float_rings(scaled: ScaledRings) -> Vec<Ring<f64>> {
    fn widen<T: Copy>(rings: Vec<Ring<T>>, to_f64: impl Fn(T) -> f64) -> Vec<Ring<f64>> {
        rings
            .into_iter()
            .map(|ring| {
                ring.into_iter()
                    .map(|p| Point2d::new(to_f64(p.x), to_f64(p.y)))
                    .collect()
            })
            .collect()
    }

    match scaled {
        ScaledRings::Int(rings) => widen(rings, f64::from),
        ScaledRings::Long(rings) => widen(rings, |v| v as f64),
        ScaledRings::Float(rings) => rings,
    }
}

/// Inflate (if needed), parse and decode a tile payload into a GeoJSON
/// FeatureCollection string.
pub fn decode_tile_to_geojson_string(
    payload: &[u8],
    id: TileId,
    options: &DecodeOptions,
) -> DecodeResult<String> {
    let tile = Tile::from_compressed(payload)?;
    let decoded = decode_tile(&tile, id, options)?;
    console_log!(
        "Decoded {} features from {} layers for tile {}/{}/{}",
        decoded.feature_count(),
        decoded.layers.len(),
        id.zoom,
        id.column,
        id.row
    );
    Ok(geojson::to_geojson_string(&decoded))
}
