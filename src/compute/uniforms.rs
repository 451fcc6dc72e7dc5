//! Parameter bridge: typed uniform slots and their CPU-side storage.
//!
//! A program's parameters live in one uniform block. Each declared uniform
//! resolves to a byte offset inside that block plus the shape it was declared
//! with. Values are written into a host shadow of the block and uploaded as a
//! whole.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Declared shape of a uniform. Never re-inferred after declaration.
///
/// JSON accepts snake-case names as well as the WebGL-style suffixes
/// (`1f`, `1i`, `1ui`, `2f`, `2i`, `4f`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UniformShape {
    #[serde(alias = "1f")]
    Float,
    #[serde(alias = "1i")]
    Int,
    #[serde(alias = "1ui")]
    UInt,
    #[serde(alias = "2f")]
    Vec2Float,
    #[serde(alias = "2i")]
    Vec2Int,
    #[serde(alias = "4f")]
    Vec4Float,
}

impl UniformShape {
    /// Size in bytes inside the uniform block.
    pub fn size(self) -> usize {
        match self {
            UniformShape::Float | UniformShape::Int | UniformShape::UInt => 4,
            UniformShape::Vec2Float | UniformShape::Vec2Int => 8,
            UniformShape::Vec4Float => 16,
        }
    }
}

/// A uniform declaration: name plus shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniformSpec {
    pub name: String,
    #[serde(rename = "type", alias = "shape")]
    pub shape: UniformShape,
}

impl UniformSpec {
    pub fn new(name: impl Into<String>, shape: UniformShape) -> Self {
        Self {
            name: name.into(),
            shape,
        }
    }
}

/// A parameter value as supplied by callers: a number or a short vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UniformValue {
    Scalar(f32),
    Vec2([f32; 2]),
    Vec4([f32; 4]),
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Scalar(v)
    }
}

impl From<[f32; 2]> for UniformValue {
    fn from(v: [f32; 2]) -> Self {
        UniformValue::Vec2(v)
    }
}

impl From<[f32; 4]> for UniformValue {
    fn from(v: [f32; 4]) -> Self {
        UniformValue::Vec4(v)
    }
}

/// Mapping of uniform name to value.
pub type ParameterSet = BTreeMap<String, UniformValue>;

/// A value as stored in the uniform block, tagged by shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformData {
    Float(f32),
    Int(i32),
    UInt(u32),
    Vec2Float([f32; 2]),
    Vec2Int([i32; 2]),
    Vec4Float([f32; 4]),
}

impl UniformData {
    /// Convert a caller value to the declared shape.
    ///
    /// Integer shapes truncate toward zero and saturate at the type bounds
    /// (NaN becomes 0). Returns `None` when the value's arity does not match.
    pub fn convert(shape: UniformShape, value: UniformValue) -> Option<Self> {
        match (shape, value) {
            (UniformShape::Float, UniformValue::Scalar(v)) => Some(UniformData::Float(v)),
            (UniformShape::Int, UniformValue::Scalar(v)) => Some(UniformData::Int(v as i32)),
            (UniformShape::UInt, UniformValue::Scalar(v)) => Some(UniformData::UInt(v as u32)),
            (UniformShape::Vec2Float, UniformValue::Vec2(v)) => Some(UniformData::Vec2Float(v)),
            (UniformShape::Vec2Int, UniformValue::Vec2([x, y])) => {
                Some(UniformData::Vec2Int([x as i32, y as i32]))
            }
            (UniformShape::Vec4Float, UniformValue::Vec4(v)) => Some(UniformData::Vec4Float(v)),
            _ => None,
        }
    }

    pub fn shape(&self) -> UniformShape {
        match self {
            UniformData::Float(_) => UniformShape::Float,
            UniformData::Int(_) => UniformShape::Int,
            UniformData::UInt(_) => UniformShape::UInt,
            UniformData::Vec2Float(_) => UniformShape::Vec2Float,
            UniformData::Vec2Int(_) => UniformShape::Vec2Int,
            UniformData::Vec4Float(_) => UniformShape::Vec4Float,
        }
    }

    fn write_to(&self, dst: &mut [u8]) {
        let bytes: &[u8] = match self {
            UniformData::Float(v) => bytemuck::bytes_of(v),
            UniformData::Int(v) => bytemuck::bytes_of(v),
            UniformData::UInt(v) => bytemuck::bytes_of(v),
            UniformData::Vec2Float(v) => bytemuck::bytes_of(v),
            UniformData::Vec2Int(v) => bytemuck::bytes_of(v),
            UniformData::Vec4Float(v) => bytemuck::bytes_of(v),
        };
        dst[..bytes.len()].copy_from_slice(bytes);
    }

    fn read_from(shape: UniformShape, src: &[u8]) -> Self {
        match shape {
            UniformShape::Float => UniformData::Float(bytemuck::pod_read_unaligned(&src[..4])),
            UniformShape::Int => UniformData::Int(bytemuck::pod_read_unaligned(&src[..4])),
            UniformShape::UInt => UniformData::UInt(bytemuck::pod_read_unaligned(&src[..4])),
            UniformShape::Vec2Float => {
                UniformData::Vec2Float(bytemuck::pod_read_unaligned(&src[..8]))
            }
            UniformShape::Vec2Int => UniformData::Vec2Int(bytemuck::pod_read_unaligned(&src[..8])),
            UniformShape::Vec4Float => {
                UniformData::Vec4Float(bytemuck::pod_read_unaligned(&src[..16]))
            }
        }
    }
}

/// Location of a resolved uniform inside its block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformSlot {
    pub offset: usize,
    pub shape: UniformShape,
}

/// Minimum uniform block size, and the granularity it is rounded up to.
pub const UNIFORM_BLOCK_ALIGNMENT: usize = 16;

/// Host shadow of a program's uniform block.
#[derive(Debug, Clone)]
pub struct UniformBlock {
    slots: HashMap<String, UniformSlot>,
    bytes: Vec<u8>,
}

impl UniformBlock {
    /// Zeroed block of at least `size` bytes, rounded up to 16.
    pub fn new(size: usize) -> Self {
        let size = size
            .div_ceil(UNIFORM_BLOCK_ALIGNMENT)
            .max(1)
            * UNIFORM_BLOCK_ALIGNMENT;
        Self {
            slots: HashMap::new(),
            bytes: vec![0; size],
        }
    }

    /// Register a resolved slot. Slots that do not fit the block are dropped.
    pub fn bind(&mut self, name: impl Into<String>, slot: UniformSlot) -> bool {
        if slot.offset + slot.shape.size() > self.bytes.len() {
            return false;
        }
        self.slots.insert(name.into(), slot);
        true
    }

    pub fn slot(&self, name: &str) -> Option<UniformSlot> {
        self.slots.get(name).copied()
    }

    /// Names of all resolved slots.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    /// Write one parameter. Unknown names are ignored; a value whose arity
    /// does not match the declared shape is skipped with a warning.
    ///
    /// Returns whether the block changed.
    pub fn apply(&mut self, name: &str, value: UniformValue) -> bool {
        let Some(slot) = self.slots.get(name).copied() else {
            log::debug!("Ignoring unknown uniform `{name}`");
            return false;
        };
        let Some(data) = UniformData::convert(slot.shape, value) else {
            log::warn!(
                "Uniform `{name}` is declared {:?}; ignoring value {:?}",
                slot.shape,
                value
            );
            return false;
        };
        data.write_to(&mut self.bytes[slot.offset..]);
        true
    }

    /// Write every entry of `params`. Returns how many were applied.
    pub fn apply_all(&mut self, params: &ParameterSet) -> usize {
        params
            .iter()
            .filter(|(name, value)| self.apply(name, **value))
            .count()
    }

    /// Current stored value of a resolved uniform.
    pub fn get(&self, name: &str) -> Option<UniformData> {
        let slot = self.slots.get(name)?;
        Some(UniformData::read_from(slot.shape, &self.bytes[slot.offset..]))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block() -> UniformBlock {
        let mut block = UniformBlock::new(28);
        let slots = [
            ("res", 0, UniformShape::Vec2Float),
            ("Feed", 8, UniformShape::Float),
            ("Steps", 12, UniformShape::Int),
            ("Tint", 16, UniformShape::Vec4Float),
        ];
        for (name, offset, shape) in slots {
            block.bind(name, UniformSlot { offset, shape });
        }
        block
    }

    #[test]
    fn test_block_size_rounded() {
        assert_eq!(UniformBlock::new(0).size(), 16);
        assert_eq!(UniformBlock::new(28).size(), 32);
        assert_eq!(UniformBlock::new(32).size(), 32);
    }

    #[test]
    fn test_float_round_trip() {
        let mut block = block();
        assert!(block.apply("Feed", 0.055.into()));
        assert_eq!(block.get("Feed"), Some(UniformData::Float(0.055)));
    }

    #[test]
    fn test_vector_round_trip() {
        let mut block = block();
        block.apply("res", [512.0, 256.0].into());
        block.apply("Tint", [0.1, 0.2, 0.3, 0.4].into());
        assert_eq!(block.get("res"), Some(UniformData::Vec2Float([512.0, 256.0])));
        assert_eq!(
            block.get("Tint"),
            Some(UniformData::Vec4Float([0.1, 0.2, 0.3, 0.4]))
        );
        assert_eq!(&block.as_bytes()[0..4], &512.0f32.to_ne_bytes());
    }

    #[test]
    fn test_unknown_name_is_noop() {
        let mut block = block();
        let before = block.as_bytes().to_vec();
        assert!(!block.apply("Nope", 1.0.into()));
        assert_eq!(block.as_bytes(), &before[..]);
    }

    #[test]
    fn test_arity_mismatch_is_noop() {
        let mut block = block();
        assert!(!block.apply("res", 3.0.into()));
        assert!(!block.apply("Feed", [1.0, 2.0].into()));
        assert_eq!(block.get("Feed"), Some(UniformData::Float(0.0)));
    }

    #[test]
    fn test_int_conversion_truncates_and_saturates() {
        assert_eq!(
            UniformData::convert(UniformShape::Int, 2.9.into()),
            Some(UniformData::Int(2))
        );
        assert_eq!(
            UniformData::convert(UniformShape::Int, (-2.9).into()),
            Some(UniformData::Int(-2))
        );
        assert_eq!(
            UniformData::convert(UniformShape::Int, f32::NAN.into()),
            Some(UniformData::Int(0))
        );
        assert_eq!(
            UniformData::convert(UniformShape::UInt, (-5.0).into()),
            Some(UniformData::UInt(0))
        );
        assert_eq!(
            UniformData::convert(UniformShape::Int, 1e12.into()),
            Some(UniformData::Int(i32::MAX))
        );
    }

    #[test]
    fn test_apply_all_counts_applied() {
        let mut block = block();
        let params = ParameterSet::from([
            ("Feed".to_string(), UniformValue::Scalar(0.06)),
            ("Steps".to_string(), UniformValue::Scalar(4.0)),
            ("Missing".to_string(), UniformValue::Scalar(1.0)),
        ]);
        assert_eq!(block.apply_all(&params), 2);
        assert_eq!(block.get("Steps"), Some(UniformData::Int(4)));
    }

    #[test]
    fn test_bind_rejects_slot_past_end() {
        let mut block = UniformBlock::new(16);
        assert!(!block.bind("late", UniformSlot { offset: 12, shape: UniformShape::Vec2Float }));
        assert!(block.slot("late").is_none());
    }

    #[test]
    fn test_shape_json_aliases() {
        let spec: UniformSpec = serde_json::from_str(r#"{"name": "Da", "type": "1f"}"#).unwrap();
        assert_eq!(spec.shape, UniformShape::Float);
        let spec: UniformSpec =
            serde_json::from_str(r#"{"name": "res", "type": "vec2_float"}"#).unwrap();
        assert_eq!(spec.shape, UniformShape::Vec2Float);
    }

    #[test]
    fn test_value_json_untagged() {
        let params: ParameterSet =
            serde_json::from_str(r#"{"Feed": 0.055, "res": [4, 4]}"#).unwrap();
        assert_eq!(params["Feed"], UniformValue::Scalar(0.055));
        assert_eq!(params["res"], UniformValue::Vec2([4.0, 4.0]));
    }
}
