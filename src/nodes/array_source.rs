use std::collections::BTreeMap;

use crate::{
    batch::{Array, Batch},
    error::{VoxweaveError, VoxweaveResult},
    provider::BatchProvider,
    spec::{ArrayKey, ArraySpec, BatchRequest, SpecMap},
    tensor::Tensor,
};

/// In-memory provider serving exact sub-regions of owned arrays. The
/// reference `BatchProvider` implementation and the backbone of the test
/// pipelines.
pub struct ArraySource {
    name: String,
    arrays: BTreeMap<ArrayKey, Array>,
    spec: SpecMap,
    is_setup: bool,
}

impl ArraySource {
    pub fn new() -> Self {
        Self {
            name: "array_source".to_string(),
            arrays: BTreeMap::new(),
            spec: SpecMap::new(),
            is_setup: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_array(
        mut self,
        key: impl Into<ArrayKey>,
        data: Tensor,
        spec: ArraySpec,
    ) -> VoxweaveResult<Self> {
        let key = key.into();
        if !spec.roi.is_bounded() {
            return Err(VoxweaveError::config(format!(
                "array source '{}' needs a bounded roi for key '{key}'",
                self.name
            )));
        }
        if self.arrays.contains_key(&key) {
            return Err(VoxweaveError::config(format!(
                "array source '{}' already holds key '{key}'",
                self.name
            )));
        }
        self.arrays.insert(key, Array::new(data, spec)?);
        Ok(self)
    }
}

impl Default for ArraySource {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchProvider for ArraySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn setup(&mut self) -> VoxweaveResult<()> {
        if self.is_setup {
            return Err(VoxweaveError::config(format!(
                "setup ran twice on '{}'",
                self.name
            )));
        }
        for (key, array) in &self.arrays {
            self.spec.declare(key.clone(), array.spec.clone())?;
        }
        self.is_setup = true;
        Ok(())
    }

    fn spec(&self) -> &SpecMap {
        &self.spec
    }

    fn provide(&mut self, request: &BatchRequest) -> VoxweaveResult<Batch> {
        if !self.is_setup {
            return Err(VoxweaveError::config(format!(
                "'{}' received a request before setup",
                self.name
            )));
        }
        let mut batch = Batch::new();
        for (key, requested) in request.iter() {
            let array = self.arrays.get(key).ok_or_else(|| {
                VoxweaveError::negotiation(format!("'{}' does not hold key '{key}'", self.name))
            })?;
            batch.insert(key.clone(), array.crop_to(&requested.roi)?);
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        coord::Coordinate,
        pipeline::Pipeline,
        roi::Roi,
        spec::RequestSpec,
    };

    fn source_1x8() -> ArraySource {
        let roi = Roi::new(&Coordinate::zeros(1), &Coordinate::from([8])).unwrap();
        let spec = ArraySpec::new(roi, Coordinate::ones(1), true);
        let data = Tensor::from_vec(&[8], (0..8).map(|v| v as f32).collect()).unwrap();
        ArraySource::new().with_array("raw", data, spec).unwrap()
    }

    #[test]
    fn serves_exact_sub_region() {
        let mut pipeline = Pipeline::build(source_1x8()).unwrap();
        let roi = Roi::new(&Coordinate::from([2]), &Coordinate::from([3])).unwrap();
        let request = BatchRequest::new(0).with("raw", RequestSpec::new(roi.clone()));
        let batch = pipeline.request_batch(&request).unwrap();
        let array = batch.get(&ArrayKey::from("raw")).unwrap();
        assert_eq!(array.spec.roi, roi);
        assert_eq!(array.data.data(), &[2.0, 3.0, 4.0]);
    }

    #[test]
    fn rejects_request_outside_declared_roi() {
        let mut pipeline = Pipeline::build(source_1x8()).unwrap();
        let roi = Roi::new(&Coordinate::from([6]), &Coordinate::from([4])).unwrap();
        let request = BatchRequest::new(0).with("raw", RequestSpec::new(roi));
        assert!(matches!(
            pipeline.request_batch(&request),
            Err(VoxweaveError::Negotiation(_))
        ));
    }

    #[test]
    fn rejects_mismatched_voxel_size_request() {
        let mut pipeline = Pipeline::build(source_1x8()).unwrap();
        let roi = Roi::new(&Coordinate::from([2]), &Coordinate::from([2])).unwrap();
        let request = BatchRequest::new(0).with(
            "raw",
            RequestSpec::new(roi).with_voxel_size(Coordinate::from([2])),
        );
        assert!(matches!(
            pipeline.request_batch(&request),
            Err(VoxweaveError::Negotiation(_))
        ));
    }
}
