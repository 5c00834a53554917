// Tile model: layers are indexed once, features decode on demand

use std::ops::Range;
use std::sync::Arc;

use serde::Serialize;

use crate::console_log;
use crate::error::{DecodeError, DecodeResult};
use crate::geometry::{self, Geometry};
use crate::inflate;
use crate::pbf::{PbfReader, WireType};

/// Field numbers of the vector tile protobuf schema.
pub mod field {
    pub const TILE_LAYERS: u32 = 3;

    pub const LAYER_NAME: u32 = 1;
    pub const LAYER_FEATURES: u32 = 2;
    pub const LAYER_KEYS: u32 = 3;
    pub const LAYER_VALUES: u32 = 4;
    pub const LAYER_EXTENT: u32 = 5;
    pub const LAYER_VERSION: u32 = 15;

    pub const FEATURE_ID: u32 = 1;
    pub const FEATURE_TAGS: u32 = 2;
    pub const FEATURE_TYPE: u32 = 3;
    pub const FEATURE_GEOMETRY: u32 = 4;

    pub const VALUE_STRING: u32 = 1;
    pub const VALUE_FLOAT: u32 = 2;
    pub const VALUE_DOUBLE: u32 = 3;
    pub const VALUE_INT: u32 = 4;
    pub const VALUE_UINT: u32 = 5;
    pub const VALUE_SINT: u32 = 6;
    pub const VALUE_BOOL: u32 = 7;
}

pub const DEFAULT_EXTENT: u32 = 4096;
pub const DEFAULT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum GeomType {
    #[default]
    Unknown = 0,
    Point = 1,
    LineString = 2,
    Polygon = 3,
}

impl From<u64> for GeomType {
    fn from(code: u64) -> Self {
        match code {
            1 => GeomType::Point,
            2 => GeomType::LineString,
            3 => GeomType::Polygon,
            _ => GeomType::Unknown,
        }
    }
}

/// Entry of a layer's value table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Float(f32),
    Double(f64),
    Int(i64),
    UInt(u64),
    SInt(i64),
    Bool(bool),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float(f) => Some(f64::from(f)),
            Value::Double(d) => Some(d),
            Value::Int(i) | Value::SInt(i) => Some(i as f64),
            Value::UInt(u) => Some(u as f64),
            Value::String(_) | Value::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    // The last scalar present wins, matching protobuf merge semantics.
    fn parse(data: &[u8], range: Range<usize>) -> DecodeResult<Option<Value>> {
        let mut reader = PbfReader::with_range(data, range);
        let mut value = None;
        while reader.next_field()? {
            value = match (reader.field(), reader.wire_type()) {
                (field::VALUE_STRING, WireType::Bytes) => {
                    Some(Value::String(reader.string()?.to_owned()))
                }
                (field::VALUE_FLOAT, WireType::Fixed32) => Some(Value::Float(reader.fixed32()?)),
                (field::VALUE_DOUBLE, WireType::Fixed64) => Some(Value::Double(reader.fixed64()?)),
                (field::VALUE_INT, WireType::Varint) => Some(Value::Int(reader.int64()?)),
                (field::VALUE_UINT, WireType::Varint) => Some(Value::UInt(reader.varint()?)),
                (field::VALUE_SINT, WireType::Varint) => Some(Value::SInt(reader.sint64()?)),
                (field::VALUE_BOOL, WireType::Varint) => Some(Value::Bool(reader.bool()?)),
                _ => {
                    reader.skip()?;
                    value
                }
            };
        }
        Ok(value)
    }
}

/// Cheap description of a layer, without its features.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerSummary {
    pub name: String,
    pub extent: u32,
    pub version: u32,
    pub feature_count: usize,
}

/// A decoded tile: the shared buffer plus its layers in appearance order.
#[derive(Debug, Clone)]
pub struct Tile {
    data: Arc<[u8]>,
    layers: Vec<Layer>,
}

impl Tile {
    pub fn parse(data: impl Into<Arc<[u8]>>) -> DecodeResult<Self> {
        let data: Arc<[u8]> = data.into();
        let mut reader = PbfReader::new(&data);
        let mut layers = Vec::new();
        while reader.next_field()? {
            match (reader.field(), reader.wire_type()) {
                (field::TILE_LAYERS, WireType::Bytes) => {
                    let range = reader.view_range()?;
                    layers.push(Layer::parse(&data, range)?);
                }
                _ => {
                    reader.skip()?;
                }
            }
        }
        console_log!("Parsed tile with {} layers ({} bytes)", layers.len(), data.len());
        Ok(Self { data, layers })
    }

    /// Parse a payload that may still be gzip or zlib wrapped.
    pub fn from_compressed(payload: &[u8]) -> DecodeResult<Self> {
        let inflated = inflate::inflate(payload)?;
        Self::parse(&*inflated)
    }

    pub fn data(&self) -> &Arc<[u8]> {
        &self.data
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// First layer carrying `name`.
    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.name == name)
    }

    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|layer| layer.name.as_str())
    }

    pub fn summaries(&self) -> Vec<LayerSummary> {
        self.layers.iter().map(Layer::summary).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

pub fn parse_tile(data: impl Into<Arc<[u8]>>) -> DecodeResult<Tile> {
    Tile::parse(data)
}

#[derive(Debug, Clone)]
pub struct Layer {
    data: Arc<[u8]>,
    name: String,
    version: u32,
    extent: u32,
    keys: Vec<String>,
    // `None` for value messages with no recognised scalar; an error only when
    // a feature references them.
    values: Vec<Option<Value>>,
    features: Vec<Range<usize>>,
}

impl Layer {
    fn parse(data: &Arc<[u8]>, range: Range<usize>) -> DecodeResult<Self> {
        let mut reader = PbfReader::with_range(data, range);
        let mut name = String::new();
        let mut version = u64::from(DEFAULT_VERSION);
        let mut extent = u64::from(DEFAULT_EXTENT);
        let mut keys = Vec::new();
        let mut value_ranges = Vec::new();
        let mut features = Vec::new();

        while reader.next_field()? {
            match (reader.field(), reader.wire_type()) {
                (field::LAYER_NAME, WireType::Bytes) => name = reader.string()?.to_owned(),
                (field::LAYER_FEATURES, WireType::Bytes) => features.push(reader.view_range()?),
                (field::LAYER_KEYS, WireType::Bytes) => keys.push(reader.string()?.to_owned()),
                (field::LAYER_VALUES, WireType::Bytes) => value_ranges.push(reader.view_range()?),
                (field::LAYER_EXTENT, WireType::Varint) => extent = reader.varint()?,
                (field::LAYER_VERSION, WireType::Varint) => version = reader.varint()?,
                _ => {
                    reader.skip()?;
                }
            }
        }

        if extent == 0 || extent > u64::from(u32::MAX) {
            return Err(DecodeError::InvalidExtent {
                layer: name,
                extent,
            });
        }

        if version > u64::from(u32::MAX) {
            return Err(DecodeError::InvalidVersion {
                layer: name,
                version,
            });
        }

        let values = value_ranges
            .into_iter()
            .map(|range| Value::parse(data, range))
            .collect::<DecodeResult<Vec<_>>>()?;

        Ok(Self {
            data: Arc::clone(data),
            name,
            version: version as u32,
            extent: extent as u32,
            keys,
            values,
            features,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn extent(&self) -> u32 {
        self.extent
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Value table in wire order; `None` marks entries with no known scalar.
    pub fn values(&self) -> &[Option<Value>] {
        &self.values
    }

    pub fn key(&self, index: usize) -> DecodeResult<&str> {
        self.keys
            .get(index)
            .map(String::as_str)
            .ok_or(DecodeError::IndexOutOfRange {
                table: "keys",
                index,
                len: self.keys.len(),
            })
    }

    pub fn value(&self, index: usize) -> DecodeResult<&Value> {
        match self.values.get(index) {
            Some(Some(value)) => Ok(value),
            Some(None) => Err(DecodeError::MissingValue {
                layer: self.name.clone(),
                index,
            }),
            None => Err(DecodeError::IndexOutOfRange {
                table: "values",
                index,
                len: self.values.len(),
            }),
        }
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    pub fn feature(&self, index: usize) -> DecodeResult<Feature<'_>> {
        let range = self
            .features
            .get(index)
            .cloned()
            .ok_or(DecodeError::IndexOutOfRange {
                table: "features",
                index,
                len: self.features.len(),
            })?;
        Feature::parse(self, index, range)
    }

    pub fn features(&self) -> impl Iterator<Item = DecodeResult<Feature<'_>>> {
        (0..self.features.len()).map(move |index| self.feature(index))
    }

    pub fn summary(&self) -> LayerSummary {
        LayerSummary {
            name: self.name.clone(),
            extent: self.extent,
            version: self.version,
            feature_count: self.features.len(),
        }
    }
}

/// A feature inside its layer. Geometry stays encoded until requested.
#[derive(Debug, Clone)]
pub struct Feature<'a> {
    layer: &'a Layer,
    index: usize,
    id: u64,
    geom_type: GeomType,
    tags: Vec<u32>,
    geometry: Option<Range<usize>>,
}

impl<'a> Feature<'a> {
    fn parse(layer: &'a Layer, index: usize, range: Range<usize>) -> DecodeResult<Self> {
        let mut reader = PbfReader::with_range(&layer.data, range);
        let mut feature = Feature {
            layer,
            index,
            id: 0,
            geom_type: GeomType::Unknown,
            tags: Vec::new(),
            geometry: None,
        };
        while reader.next_field()? {
            match (reader.field(), reader.wire_type()) {
                (field::FEATURE_ID, WireType::Varint) => feature.id = reader.varint()?,
                (field::FEATURE_TAGS, WireType::Bytes) => {
                    let tags: Vec<u32> = reader.packed_varints()?;
                    feature.tags.extend(tags);
                }
                (field::FEATURE_TYPE, WireType::Varint) => {
                    feature.geom_type = GeomType::from(reader.varint()?)
                }
                (field::FEATURE_GEOMETRY, WireType::Bytes) => {
                    feature.geometry = Some(reader.view_range()?)
                }
                _ => {
                    reader.skip()?;
                }
            }
        }
        Ok(feature)
    }

    pub fn layer(&self) -> &'a Layer {
        self.layer
    }

    /// Position of the feature within its layer.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn geom_type(&self) -> GeomType {
        self.geom_type
    }

    /// Raw key/value index pairs.
    pub fn tags(&self) -> &[u32] {
        &self.tags
    }

    /// Resolve the tag list against the layer's key and value tables.
    pub fn properties(&self) -> DecodeResult<Properties<'a>> {
        if self.tags.len() % 2 != 0 {
            return Err(DecodeError::OddTagCount {
                len: self.tags.len(),
            });
        }
        let layer = self.layer;
        let entries = self
            .tags
            .chunks_exact(2)
            .map(|pair| Ok((layer.key(pair[0] as usize)?, layer.value(pair[1] as usize)?)))
            .collect::<DecodeResult<Vec<_>>>()?;
        Ok(Properties { entries })
    }

    /// The undecoded command stream.
    pub fn commands(&self) -> DecodeResult<Vec<u32>> {
        match &self.geometry {
            Some(range) => {
                let mut reader = PbfReader::with_range(&self.layer.data, range.clone());
                let mut commands = Vec::with_capacity(reader.remaining());
                while reader.remaining() > 0 {
                    commands.push(reader.varint32()?);
                }
                Ok(commands)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Decode the command stream into tile-space rings multiplied by `scale`.
    pub fn geometry(&self, scale: f64) -> DecodeResult<Geometry> {
        geometry::decode(self.layer.extent, self.geom_type, &self.commands()?, scale)
    }
}

/// Resolved feature properties in tag order.
#[derive(Debug, Clone, PartialEq)]
pub struct Properties<'a> {
    entries: Vec<(&'a str, &'a Value)>,
}

impl<'a> Properties<'a> {
    /// Value for `key`; when a key repeats the later pair wins.
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a Value)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
