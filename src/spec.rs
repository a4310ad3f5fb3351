use std::collections::BTreeMap;
use std::fmt;

use crate::{
    coord::Coordinate,
    error::{VoxweaveError, VoxweaveResult},
    roi::Roi,
};

/// Names one logical data stream (raw intensities, ground-truth labels, ...).
/// Keys are declared by the node that provides them, never invented downstream.
#[derive(
    Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct ArrayKey(String);

impl ArrayKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArrayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArrayKey {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// Declared element type. Metadata for collaborator backends; the core
/// realizes all payloads as f32 tensors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Dtype {
    F32,
    U8,
    U16,
    U64,
    Bool,
}

/// What a node guarantees to deliver for one key: extent, resolution and
/// whether values may be interpolated.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ArraySpec {
    pub roi: Roi,
    pub voxel_size: Coordinate,
    pub interpolatable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtype: Option<Dtype>,
}

impl ArraySpec {
    pub fn new(roi: Roi, voxel_size: Coordinate, interpolatable: bool) -> Self {
        Self {
            roi,
            voxel_size,
            interpolatable,
            dtype: None,
        }
    }

    pub fn with_dtype(mut self, dtype: Dtype) -> Self {
        self.dtype = Some(dtype);
        self
    }

    pub fn validate(&self) -> VoxweaveResult<()> {
        if self.roi.dims() != self.voxel_size.dims() {
            return Err(VoxweaveError::config(format!(
                "spec roi has {} axes but voxel size {} has {}",
                self.roi.dims(),
                self.voxel_size,
                self.voxel_size.dims()
            )));
        }
        if !self.voxel_size.is_strictly_positive() {
            return Err(VoxweaveError::config(format!(
                "voxel size {} must be strictly positive",
                self.voxel_size
            )));
        }
        Ok(())
    }
}

/// What a consumer wants for one key: at minimum a bounded roi, optionally a
/// specific voxel size (must then match the declared one).
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RequestSpec {
    pub roi: Roi,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voxel_size: Option<Coordinate>,
}

impl RequestSpec {
    pub fn new(roi: Roi) -> Self {
        Self {
            roi,
            voxel_size: None,
        }
    }

    pub fn with_voxel_size(mut self, voxel_size: Coordinate) -> Self {
        self.voxel_size = Some(voxel_size);
        self
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BatchRequest {
    pub specs: BTreeMap<ArrayKey, RequestSpec>,
    pub random_seed: u64,
}

impl BatchRequest {
    pub fn new(random_seed: u64) -> Self {
        Self {
            specs: BTreeMap::new(),
            random_seed,
        }
    }

    pub fn with(mut self, key: impl Into<ArrayKey>, spec: RequestSpec) -> Self {
        self.insert(key.into(), spec);
        self
    }

    pub fn insert(&mut self, key: ArrayKey, spec: RequestSpec) {
        self.specs.insert(key, spec);
    }

    pub fn get(&self, key: &ArrayKey) -> Option<&RequestSpec> {
        self.specs.get(key)
    }

    pub fn contains_key(&self, key: &ArrayKey) -> bool {
        self.specs.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &ArrayKey> {
        self.specs.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ArrayKey, &RequestSpec)> {
        self.specs.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }
}

/// The declared specs of one node. Declaring a key is final for the life of
/// the pipeline; redeclaration is a configuration error.
#[derive(Clone, Debug, Default)]
pub struct SpecMap {
    map: BTreeMap<ArrayKey, ArraySpec>,
}

impl SpecMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, key: ArrayKey, spec: ArraySpec) -> VoxweaveResult<()> {
        spec.validate()?;
        if self.map.contains_key(&key) {
            return Err(VoxweaveError::config(format!(
                "key '{key}' is already declared"
            )));
        }
        self.map.insert(key, spec);
        Ok(())
    }

    pub fn get(&self, key: &ArrayKey) -> Option<&ArraySpec> {
        self.map.get(key)
    }

    pub fn contains_key(&self, key: &ArrayKey) -> bool {
        self.map.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &ArrayKey> {
        self.map.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ArrayKey, &ArraySpec)> {
        self.map.iter()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec_3d() -> ArraySpec {
        ArraySpec::new(
            Roi::new(&Coordinate::zeros(3), &Coordinate::splat(8, 3)).unwrap(),
            Coordinate::ones(3),
            true,
        )
    }

    #[test]
    fn declare_is_final() {
        let mut specs = SpecMap::new();
        specs.declare(ArrayKey::from("raw"), spec_3d()).unwrap();
        let err = specs.declare(ArrayKey::from("raw"), spec_3d()).unwrap_err();
        assert!(err.to_string().contains("already declared"));
    }

    #[test]
    fn declare_rejects_bad_voxel_size() {
        let mut specs = SpecMap::new();
        let mut spec = spec_3d();
        spec.voxel_size = Coordinate::from([1, 0, 1]);
        assert!(specs.declare(ArrayKey::from("raw"), spec).is_err());
    }

    #[test]
    fn request_keys_iterate_in_insertion_independent_order() {
        let roi = Roi::new(&Coordinate::zeros(3), &Coordinate::splat(4, 3)).unwrap();
        let request = BatchRequest::new(0)
            .with("zebra", RequestSpec::new(roi.clone()))
            .with("alpha", RequestSpec::new(roi));
        let keys: Vec<&str> = request.keys().map(ArrayKey::as_str).collect();
        assert_eq!(keys, ["alpha", "zebra"]);
    }
}
