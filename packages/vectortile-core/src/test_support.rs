use crate::pbf::{encode_key, encode_varint, encode_zigzag32, encode_zigzag64, WireType};
use crate::tile::{field, GeomType, Value};

#[derive(Debug, Clone, Default)]
pub(crate) struct FeatureFixture {
    pub id: Option<u64>,
    pub geom_type: GeomType,
    pub tags: Vec<u32>,
    pub geometry: Vec<u32>,
    /// Raw field bytes appended after the encoded fields.
    pub extra: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct LayerFixture {
    pub name: String,
    pub extent: Option<u32>,
    pub version: Option<u64>,
    pub keys: Vec<String>,
    pub values: Vec<Value>,
    /// Raw value messages appended after `values`.
    pub raw_values: Vec<Vec<u8>>,
    pub features: Vec<FeatureFixture>,
}

fn put_bytes(field: u32, bytes: &[u8], out: &mut Vec<u8>) {
    encode_key(field, WireType::Bytes, out);
    encode_varint(bytes.len() as u64, out);
    out.extend_from_slice(bytes);
}

fn put_varint(field: u32, value: u64, out: &mut Vec<u8>) {
    encode_key(field, WireType::Varint, out);
    encode_varint(value, out);
}

fn put_packed(field: u32, values: &[u32], out: &mut Vec<u8>) {
    let wide: Vec<u64> = values.iter().map(|v| u64::from(*v)).collect();
    out.extend(packed_field(field, &wide));
}

/// A packed varint field, for values that do not fit the fixture's u32 lists.
pub(crate) fn packed_field(field: u32, values: &[u64]) -> Vec<u8> {
    let mut payload = Vec::new();
    for v in values {
        encode_varint(*v, &mut payload);
    }
    let mut out = Vec::new();
    put_bytes(field, &payload, &mut out);
    out
}

fn encode_value(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    match value {
        Value::String(s) => put_bytes(field::VALUE_STRING, s.as_bytes(), &mut out),
        Value::Float(f) => {
            encode_key(field::VALUE_FLOAT, WireType::Fixed32, &mut out);
            out.extend_from_slice(&f.to_le_bytes());
        }
        Value::Double(d) => {
            encode_key(field::VALUE_DOUBLE, WireType::Fixed64, &mut out);
            out.extend_from_slice(&d.to_le_bytes());
        }
        Value::Int(i) => put_varint(field::VALUE_INT, *i as u64, &mut out),
        Value::UInt(u) => put_varint(field::VALUE_UINT, *u, &mut out),
        Value::SInt(s) => put_varint(field::VALUE_SINT, encode_zigzag64(*s), &mut out),
        Value::Bool(b) => put_varint(field::VALUE_BOOL, u64::from(*b), &mut out),
    }
    out
}

fn encode_feature(feature: &FeatureFixture) -> Vec<u8> {
    let mut out = Vec::new();
    if let Some(id) = feature.id {
        put_varint(field::FEATURE_ID, id, &mut out);
    }
    if !feature.tags.is_empty() {
        put_packed(field::FEATURE_TAGS, &feature.tags, &mut out);
    }
    if feature.geom_type != GeomType::Unknown {
        put_varint(field::FEATURE_TYPE, feature.geom_type as u64, &mut out);
    }
    if !feature.geometry.is_empty() {
        put_packed(field::FEATURE_GEOMETRY, &feature.geometry, &mut out);
    }
    out.extend_from_slice(&feature.extra);
    out
}

fn encode_layer(layer: &LayerFixture) -> Vec<u8> {
    let mut out = Vec::new();
    if let Some(version) = layer.version {
        put_varint(field::LAYER_VERSION, version, &mut out);
    }
    put_bytes(field::LAYER_NAME, layer.name.as_bytes(), &mut out);
    for feature in &layer.features {
        put_bytes(field::LAYER_FEATURES, &encode_feature(feature), &mut out);
    }
    for key in &layer.keys {
        put_bytes(field::LAYER_KEYS, key.as_bytes(), &mut out);
    }
    for value in &layer.values {
        put_bytes(field::LAYER_VALUES, &encode_value(value), &mut out);
    }
    for value in &layer.raw_values {
        put_bytes(field::LAYER_VALUES, value, &mut out);
    }
    if let Some(extent) = layer.extent {
        put_varint(field::LAYER_EXTENT, u64::from(extent), &mut out);
    }
    out
}

pub(crate) fn encode_tile(layers: &[LayerFixture]) -> Vec<u8> {
    let mut out = Vec::new();
    for layer in layers {
        put_bytes(field::TILE_LAYERS, &encode_layer(layer), &mut out);
    }
    out
}

/// Command integer for `id` repeated `count` times.
pub(crate) fn command(id: u32, count: u32) -> u32 {
    (count << 3) | (id & 0x7)
}

/// Command stream drawing through absolute points, one MoveTo then LineTos.
pub(crate) fn path(points: &[(i32, i32)], close: bool) -> Vec<u32> {
    let mut out = Vec::new();
    let (mut cx, mut cy) = (0, 0);
    for (i, &(x, y)) in points.iter().enumerate() {
        if i == 0 {
            out.push(command(1, 1));
        } else if i == 1 {
            out.push(command(2, points.len() as u32 - 1));
        }
        out.push(encode_zigzag32(x - cx));
        out.push(encode_zigzag32(y - cy));
        cx = x;
        cy = y;
    }
    if close {
        out.push(command(7, 1));
    }
    out
}

/// One layer "roads", extent 4096, one LineString tagged name=Main St.
pub(crate) fn roads_tile() -> Vec<u8> {
    encode_tile(&[LayerFixture {
        name: "roads".into(),
        extent: Some(4096),
        version: Some(2),
        keys: vec!["name".into()],
        values: vec![Value::String("Main St".into())],
        features: vec![FeatureFixture {
            id: Some(7),
            geom_type: GeomType::LineString,
            tags: vec![0, 0],
            geometry: path(&[(100, 100), (2000, 100), (2000, 3000)], false),
            ..FeatureFixture::default()
        }],
        ..LayerFixture::default()
    }])
}
