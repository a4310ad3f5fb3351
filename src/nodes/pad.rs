use crate::{
    batch::{Array, Batch},
    coord::Coordinate,
    error::{VoxweaveError, VoxweaveResult},
    filter::{Filter, PrepareCtx, SetupCtx},
    roi::Roi,
    spec::{ArrayKey, BatchRequest, RequestSpec},
};

/// Zero-pads managed arrays so they fit the requested shape. The upstream
/// request is clamped per axis to the nearest bounded upstream declaration,
/// so a too-large request pads rather than fails.
pub struct PadToRequestedSize {
    name: String,
    keys: Vec<ArrayKey>,
    target_shape: Option<Coordinate>,
}

impl PadToRequestedSize {
    pub fn new(keys: impl IntoIterator<Item = impl Into<ArrayKey>>) -> Self {
        Self {
            name: "pad_to_requested_size".to_string(),
            keys: keys.into_iter().map(Into::into).collect(),
            target_shape: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Restricts requests for the managed keys to exactly this shape
    /// (world units).
    pub fn with_target_shape(mut self, shape: Coordinate) -> Self {
        self.target_shape = Some(shape);
        self
    }
}

impl Filter for PadToRequestedSize {
    fn name(&self) -> &str {
        &self.name
    }

    fn autoskip(&self) -> bool {
        true
    }

    fn setup(&mut self, ctx: &mut SetupCtx<'_>) -> VoxweaveResult<()> {
        if self.keys.is_empty() {
            return Err(VoxweaveError::config(format!(
                "'{}' has no keys to pad",
                self.name
            )));
        }
        for key in &self.keys {
            let mut spec = ctx.upstream_spec(key)?.clone();
            // Padding can extend arbitrarily far; the deliverable extent is
            // no longer a bound.
            spec.roi = Roi::unbounded(spec.roi.dims());
            ctx.update(key.clone(), spec)?;
        }
        Ok(())
    }

    fn prepare(
        &mut self,
        request: &BatchRequest,
        ctx: &PrepareCtx<'_>,
    ) -> VoxweaveResult<BatchRequest> {
        let mut deps = BatchRequest::new(request.random_seed);
        for key in &self.keys {
            let Some(requested) = request.get(key) else {
                continue;
            };
            let requested_shape = requested.roi.bounded_shape()?;
            if let Some(target) = &self.target_shape
                && requested_shape != *target
            {
                return Err(VoxweaveError::negotiation(format!(
                    "'{}' is configured for target shape {target} but '{key}' was requested \
                     with shape {requested_shape}",
                    self.name
                )));
            }
            let bounded = ctx.resolve_bounded_roi(key)?;
            let deliverable = requested_shape.min(&bounded.bounded_shape()?);
            tracing::debug!(
                key = %key,
                requested = %requested_shape,
                deliverable = %deliverable,
                "clamping request shape"
            );
            deps.insert(
                key.clone(),
                RequestSpec {
                    roi: requested.roi.with_shape(&deliverable)?,
                    voxel_size: requested.voxel_size.clone(),
                },
            );
        }
        Ok(deps)
    }

    fn process(&mut self, worked: Batch, request: &BatchRequest) -> VoxweaveResult<Batch> {
        let mut out = Batch::new();
        for (key, array) in worked {
            let requested = request.get(&key).ok_or_else(|| {
                VoxweaveError::data_integrity(format!(
                    "'{}' fetched '{key}' that was never requested",
                    self.name
                ))
            })?;
            let target = requested
                .roi
                .divide(&array.spec.voxel_size)?
                .bounded_shape()?;
            let channels = array.channel_dims();
            let spatial = &array.data.shape()[channels..];

            let mut before = vec![0usize; channels];
            let mut after = vec![0usize; channels];
            for (axis, (&have, want)) in spatial.iter().zip(target.iter()).enumerate() {
                let diff = want - have as i64;
                if diff < 0 {
                    return Err(VoxweaveError::data_integrity(format!(
                        "'{}' received {have} voxels on axis {axis} of '{key}', more than \
                         the requested {want}",
                        self.name
                    )));
                }
                // Front-biased split: the extra voxel of an odd difference
                // goes before the data.
                before.push((diff as u64).div_ceil(2) as usize);
                after.push((diff / 2) as usize);
            }

            let data = array.data.pad(&before, &after, 0.0)?;
            let mut spec = array.spec.clone();
            spec.roi = requested.roi.clone();
            out.insert(key, Array::new(data, spec)?);
        }
        Ok(out)
    }
}
