use std::collections::BTreeMap;

use rand::RngExt;

use crate::{
    batch::{Array, Batch},
    coord::Coordinate,
    error::{VoxweaveError, VoxweaveResult},
    provider::{BatchProvider, derive_rng},
    spec::{ArrayKey, ArraySpec, BatchRequest, RequestSpec, SpecMap},
};

/// Draws one upstream provider per request, without replacement: every
/// upstream is selected exactly once per cycle of N draws, in randomized
/// order, before any repeat. Upstreams with heterogeneous resolutions are
/// reconciled to a per-axis least-common-multiple voxel size; finer data is
/// mean-downsampled on the way out.
pub struct RandomOrder {
    name: String,
    upstreams: Vec<Box<dyn BatchProvider>>,
    available: Vec<bool>,
    spec: SpecMap,
    is_setup: bool,
}

impl RandomOrder {
    pub fn new(upstreams: Vec<Box<dyn BatchProvider>>) -> Self {
        Self {
            name: "random_order".to_string(),
            upstreams,
            available: Vec::new(),
            spec: SpecMap::new(),
            is_setup: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl BatchProvider for RandomOrder {
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
        if self.upstreams.is_empty() {
            return Err(VoxweaveError::config(format!(
                "'{}' needs at least one upstream provider",
                self.name
            )));
        }
        for upstream in &mut self.upstreams {
            upstream.setup()?;
        }
        self.available = vec![true; self.upstreams.len()];

        // Declare the common spec: the key set every upstream provides, at
        // the lcm voxel size over the intersection of their extents.
        let common_keys: Vec<ArrayKey> = self.upstreams[0]
            .spec()
            .keys()
            .filter(|key| {
                self.upstreams
                    .iter()
                    .all(|upstream| upstream.spec().contains_key(key))
            })
            .cloned()
            .collect();

        for key in common_keys {
            let mut common: Option<ArraySpec> = None;
            for upstream in &self.upstreams {
                let spec = upstream
                    .spec()
                    .get(&key)
                    .ok_or_else(|| {
                        VoxweaveError::config(format!(
                            "upstream of '{}' lost key '{key}' between scans",
                            self.name
                        ))
                    })?
                    .clone();
                common = Some(match common {
                    None => spec,
                    Some(common) => ArraySpec {
                        roi: common.roi.intersect(&spec.roi)?,
                        voxel_size: common.voxel_size.lcm(&spec.voxel_size),
                        interpolatable: common.interpolatable && spec.interpolatable,
                        dtype: common.dtype.or(spec.dtype),
                    },
                });
            }
            let common = common.ok_or_else(|| {
                VoxweaveError::config(format!("'{}' has no upstream spec for '{key}'", self.name))
            })?;
            for upstream in &self.upstreams {
                if let Some(native) = upstream.spec().get(&key)
                    && native.voxel_size != common.voxel_size
                {
                    tracing::warn!(
                        key = %key,
                        declared = %common.voxel_size,
                        native = %native.voxel_size,
                        upstream = upstream.name(),
                        "declared voxel size differs from an upstream's native size"
                    );
                }
            }
            self.spec.declare(key, common)?;
        }

        self.is_setup = true;
        Ok(())
    }

    fn spec(&self) -> &SpecMap {
        &self.spec
    }

    fn upstreams(&self) -> Vec<&dyn BatchProvider> {
        self.upstreams.iter().map(Box::as_ref).collect()
    }

    fn provide(&mut self, request: &BatchRequest) -> VoxweaveResult<Batch> {
        if !self.is_setup {
            return Err(VoxweaveError::config(format!(
                "'{}' received a request before setup",
                self.name
            )));
        }
        let mut rng = derive_rng(request.random_seed, &self.name);

        if !self.available.iter().any(|&a| a) {
            tracing::debug!(node = %self.name, "cycle complete, resetting availability");
            self.available.fill(true);
        }
        let choices: Vec<usize> = self
            .available
            .iter()
            .enumerate()
            .filter(|&(_, &a)| a)
            .map(|(i, _)| i)
            .collect();
        let choice = choices[rng.random_range(0..choices.len())];
        tracing::debug!(node = %self.name, choice, of = self.upstreams.len(), "selected upstream");
        self.available[choice] = false;

        // Re-request at the chosen upstream's native resolution over the
        // same world extent; the lcm construction makes every per-axis
        // factor a whole number.
        let mut upstream_request = BatchRequest::new(request.random_seed);
        let mut factors: BTreeMap<ArrayKey, Coordinate> = BTreeMap::new();
        for (key, requested) in request.iter() {
            let declared = self.spec.get(key).ok_or_else(|| {
                VoxweaveError::negotiation(format!("'{}' does not provide '{key}'", self.name))
            })?;
            let native = self.upstreams[choice]
                .spec()
                .get(key)
                .ok_or_else(|| {
                    VoxweaveError::negotiation(format!(
                        "chosen upstream of '{}' does not provide '{key}'",
                        self.name
                    ))
                })?
                .voxel_size
                .clone();
            factors.insert(key.clone(), &declared.voxel_size / &native);
            upstream_request.insert(
                key.clone(),
                RequestSpec::new(requested.roi.clone()).with_voxel_size(native),
            );
        }

        let upstream_batch = self.upstreams[choice].request_batch(&upstream_request)?;

        let mut batch = Batch::new();
        for (key, array) in upstream_batch {
            let factor = factors.get(&key).ok_or_else(|| {
                VoxweaveError::data_integrity(format!(
                    "'{}' received unsolicited key '{key}'",
                    self.name
                ))
            })?;
            let declared = self.spec.get(&key).ok_or_else(|| {
                VoxweaveError::negotiation(format!("'{}' does not provide '{key}'", self.name))
            })?;
            let array = if factor.iter().all(|f| f == 1) {
                array
            } else {
                let mut block = vec![1usize; array.channel_dims()];
                block.extend(factor.iter().map(|f| f as usize));
                let data = array.data.downsample_mean(&block)?;
                let spec = ArraySpec {
                    voxel_size: declared.voxel_size.clone(),
                    ..array.spec
                };
                Array::new(data, spec)?
            };
            batch.insert(key, array);
        }
        Ok(batch)
    }
}
