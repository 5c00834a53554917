use serde_json::{json, Map, Number, Value as JsonValue};

use crate::geometry::group_polygons;
use crate::pipeline::{DecodedFeature, DecodedLayer, DecodedTile};
use crate::projection::LatLng;
use crate::tile::{GeomType, Value};

impl From<&Value> for JsonValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Float(f) => float(f64::from(*f)),
            Value::Double(d) => float(*d),
            Value::Int(i) => JsonValue::from(*i),
            Value::UInt(u) => JsonValue::from(*u),
            Value::SInt(s) => JsonValue::from(*s),
            Value::Bool(b) => JsonValue::Bool(*b),
        }
    }
}

// NaN and infinities have no JSON form.
fn float(value: f64) -> JsonValue {
    Number::from_f64(value).map_or(JsonValue::Null, JsonValue::Number)
}

fn position(point: &LatLng) -> JsonValue {
    json!([point.lng, point.lat])
}

fn line(ring: &[LatLng]) -> JsonValue {
    JsonValue::Array(ring.iter().map(position).collect())
}

/// GeoJSON geometry object, or `None` for an empty or untyped feature.
pub fn geometry(feature: &DecodedFeature) -> Option<JsonValue> {
    let parts = &feature.geographic;
    if parts.iter().all(Vec::is_empty) {
        return None;
    }

    let geometry = match feature.geom_type {
        GeomType::Point => {
            let points: Vec<JsonValue> = parts.iter().flatten().map(position).collect();
            if points.len() == 1 {
                json!({ "type": "Point", "coordinates": points[0] })
            } else {
                json!({ "type": "MultiPoint", "coordinates": points })
            }
        }
        GeomType::LineString => {
            if parts.len() == 1 {
                json!({ "type": "LineString", "coordinates": line(&parts[0]) })
            } else {
                let lines: Vec<JsonValue> = parts.iter().map(|part| line(part)).collect();
                json!({ "type": "MultiLineString", "coordinates": lines })
            }
        }
        GeomType::Polygon => {
            // Winding is read from tile space, where y points down.
            let polygons: Vec<JsonValue> = group_polygons(&feature.rings)
                .into_iter()
                .map(|indices| JsonValue::Array(indices.into_iter().map(|i| line(&parts[i])).collect()))
                .collect();
            if polygons.len() == 1 {
                json!({ "type": "Polygon", "coordinates": polygons[0] })
            } else {
                json!({ "type": "MultiPolygon", "coordinates": polygons })
            }
        }
        GeomType::Unknown => return None,
    };
    Some(geometry)
}

pub fn properties(feature: &DecodedFeature) -> Map<String, JsonValue> {
    feature
        .properties
        .iter()
        .map(|(key, value)| (key.clone(), JsonValue::from(value)))
        .collect()
}

pub fn to_feature(feature: &DecodedFeature, layer: &str) -> Option<JsonValue> {
    Some(json!({
        "type": "Feature",
        "id": feature.id,
        "layer": layer,
        "geometry": geometry(feature)?,
        "properties": properties(feature),
    }))
}

pub fn layer_features(layer: &DecodedLayer) -> Vec<JsonValue> {
    layer
        .features
        .iter()
        .filter_map(|feature| to_feature(feature, &layer.name))
        .collect()
}

/// All layers of a decoded tile as one FeatureCollection, layer by layer in
/// tile order.
pub fn to_feature_collection(tile: &DecodedTile) -> JsonValue {
    let features: Vec<JsonValue> = tile.layers.iter().flat_map(layer_features).collect();
    json!({
        "type": "FeatureCollection",
        "features": features,
    })
}

pub fn to_geojson_string(tile: &DecodedTile) -> String {
    to_feature_collection(tile).to_string()
}
