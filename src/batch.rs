use std::collections::BTreeMap;

use crate::{
    coord::Coordinate,
    error::{VoxweaveError, VoxweaveResult},
    roi::Roi,
    spec::{ArrayKey, ArraySpec},
    tensor::Tensor,
};

/// Realized data for one key. The trailing tensor dimensions equal
/// `roi.shape / voxel_size`; any leading dimensions are non-spatial channels.
#[derive(Clone, Debug)]
pub struct Array {
    pub data: Tensor,
    pub spec: ArraySpec,
}

impl Array {
    pub fn new(data: Tensor, spec: ArraySpec) -> VoxweaveResult<Self> {
        let array = Self { data, spec };
        array.validate()?;
        Ok(array)
    }

    pub fn validate(&self) -> VoxweaveResult<()> {
        self.spec.validate()?;
        let voxel_shape = self
            .spec
            .roi
            .divide(&self.spec.voxel_size)?
            .bounded_shape()?;
        let spatial = voxel_shape.dims();
        if self.data.ndim() < spatial {
            return Err(VoxweaveError::data_integrity(format!(
                "array data has {} dimensions but its spec has {spatial} spatial axes",
                self.data.ndim()
            )));
        }
        let trailing = &self.data.shape()[self.data.ndim() - spatial..];
        let expected: Vec<usize> = voxel_shape.iter().map(|s| s as usize).collect();
        if trailing != expected.as_slice() {
            return Err(VoxweaveError::data_integrity(format!(
                "array data shape {:?} does not end in {expected:?} (roi {:?} at voxel size {})",
                self.data.shape(),
                self.spec.roi,
                self.spec.voxel_size
            )));
        }
        Ok(())
    }

    pub fn spatial_dims(&self) -> usize {
        self.spec.voxel_size.dims()
    }

    pub fn channel_dims(&self) -> usize {
        self.data.ndim() - self.spatial_dims()
    }

    /// Extracts the sub-array covering `roi` (world units). Channel
    /// dimensions are carried over in full.
    pub fn crop_to(&self, roi: &Roi) -> VoxweaveResult<Array> {
        if !self.spec.roi.contains(roi) {
            return Err(VoxweaveError::data_integrity(format!(
                "cannot crop array with roi {:?} to {roi:?}",
                self.spec.roi
            )));
        }
        let voxel = &self.spec.voxel_size;
        let delta = &Coordinate::zeros(voxel.dims()) - &self.spec.roi.bounded_offset()?;
        let rel = roi.shift(&delta).divide(voxel)?;
        let rel_offset = rel.bounded_offset()?;
        let rel_shape = rel.bounded_shape()?;

        let channels = self.channel_dims();
        let mut start = vec![0usize; channels];
        let mut size = self.data.shape()[..channels].to_vec();
        start.extend(rel_offset.iter().map(|v| v as usize));
        size.extend(rel_shape.iter().map(|v| v as usize));

        let data = self.data.crop(&start, &size)?;
        let mut spec = self.spec.clone();
        spec.roi = roi.clone();
        Array::new(data, spec)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Batch {
    arrays: BTreeMap<ArrayKey, Array>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: ArrayKey, array: Array) {
        self.arrays.insert(key, array);
    }

    pub fn get(&self, key: &ArrayKey) -> Option<&Array> {
        self.arrays.get(key)
    }

    pub fn remove(&mut self, key: &ArrayKey) -> Option<Array> {
        self.arrays.remove(key)
    }

    /// Removes and returns the array for `key`; missing keys are a data
    /// integrity error (the upstream promised and did not deliver).
    pub fn take(&mut self, key: &ArrayKey) -> VoxweaveResult<Array> {
        self.arrays.remove(key).ok_or_else(|| {
            VoxweaveError::data_integrity(format!("batch is missing array for key '{key}'"))
        })
    }

    pub fn contains_key(&self, key: &ArrayKey) -> bool {
        self.arrays.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &ArrayKey> {
        self.arrays.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ArrayKey, &Array)> {
        self.arrays.iter()
    }

    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }
}

impl IntoIterator for Batch {
    type Item = (ArrayKey, Array);
    type IntoIter = std::collections::btree_map::IntoIter<ArrayKey, Array>;

    fn into_iter(self) -> Self::IntoIter {
        self.arrays.into_iter()
    }
}
