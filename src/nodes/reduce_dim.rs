use crate::{
    batch::{Array, Batch},
    error::{VoxweaveError, VoxweaveResult},
    filter::{Filter, PrepareCtx, SetupCtx},
    roi::AxisSpan,
    spec::{ArrayKey, BatchRequest, RequestSpec},
};

/// How to collapse a lane of values into one.
#[derive(Clone, Copy, Debug)]
pub enum Projection {
    Max,
    Min,
    Mean,
    Sum,
    Custom(fn(&[f32]) -> f32),
}

impl Projection {
    fn apply(self, lane: &[f32]) -> f32 {
        match self {
            Projection::Max => lane.iter().copied().fold(f32::NEG_INFINITY, f32::max),
            Projection::Min => lane.iter().copied().fold(f32::INFINITY, f32::min),
            Projection::Mean => lane.iter().sum::<f32>() / lane.len() as f32,
            Projection::Sum => lane.iter().sum(),
            Projection::Custom(f) => f(lane),
        }
    }
}

/// Derives a lower-dimensional stream by projecting an input stream along
/// one spatial axis. The slab of the reduced axis to read is a fixed
/// configured window, independent of the requested output region.
pub struct ReduceDim {
    name: String,
    in_key: ArrayKey,
    out_key: ArrayKey,
    projection: Projection,
    axis: usize,
    ax_offset: i64,
    ax_size: i64,
}

impl ReduceDim {
    pub fn new(
        in_key: impl Into<ArrayKey>,
        out_key: impl Into<ArrayKey>,
        projection: Projection,
        axis: usize,
        ax_offset: i64,
        ax_size: i64,
    ) -> VoxweaveResult<Self> {
        if ax_size <= 0 {
            return Err(VoxweaveError::config(format!(
                "reduce window size must be positive, got {ax_size}"
            )));
        }
        Ok(Self {
            name: "reduce_dim".to_string(),
            in_key: in_key.into(),
            out_key: out_key.into(),
            projection,
            axis,
            ax_offset,
            ax_size,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Filter for ReduceDim {
    fn name(&self) -> &str {
        &self.name
    }

    fn autoskip(&self) -> bool {
        true
    }

    fn setup(&mut self, ctx: &mut SetupCtx<'_>) -> VoxweaveResult<()> {
        let spec = ctx.upstream_spec(&self.in_key)?.clone();
        if self.axis >= spec.voxel_size.dims() {
            return Err(VoxweaveError::config(format!(
                "'{}' reduces axis {} but '{}' has only {} spatial axes",
                self.name,
                self.axis,
                self.in_key,
                spec.voxel_size.dims()
            )));
        }
        let axis_voxel = spec.voxel_size[self.axis];
        if self.ax_size % axis_voxel != 0 || self.ax_offset % axis_voxel != 0 {
            return Err(VoxweaveError::config(format!(
                "'{}' window ({}, {}) is not aligned to voxel size {axis_voxel} on axis {}",
                self.name, self.ax_offset, self.ax_size, self.axis
            )));
        }

        let mut out_spec = spec;
        out_spec.roi = out_spec.roi.without_axis(self.axis);
        out_spec.voxel_size = out_spec.voxel_size.without_axis(self.axis);
        ctx.provide(self.out_key.clone(), out_spec)
    }

    fn prepare(
        &mut self,
        request: &BatchRequest,
        _ctx: &PrepareCtx<'_>,
    ) -> VoxweaveResult<BatchRequest> {
        let mut deps = BatchRequest::new(request.random_seed);
        if let Some(requested) = request.get(&self.out_key) {
            let roi = requested.roi.with_axis_inserted(
                self.axis,
                AxisSpan::Span {
                    offset: self.ax_offset,
                    size: self.ax_size,
                },
            );
            deps.insert(self.in_key.clone(), RequestSpec::new(roi));
        }
        Ok(deps)
    }

    fn process(&mut self, mut worked: Batch, request: &BatchRequest) -> VoxweaveResult<Batch> {
        let array = worked.take(&self.in_key)?;
        let requested = request.get(&self.out_key).ok_or_else(|| {
            VoxweaveError::data_integrity(format!(
                "'{}' has nothing to produce: '{}' was not requested",
                self.name, self.out_key
            ))
        })?;

        let tensor_axis = array.channel_dims() + self.axis;
        if tensor_axis >= array.data.ndim() {
            return Err(VoxweaveError::data_integrity(format!(
                "'{}' got data with {} dimensions, too few to reduce axis {}",
                self.name,
                array.data.ndim(),
                self.axis
            )));
        }
        let projection = self.projection;
        let data = array
            .data
            .project(tensor_axis, |lane| projection.apply(lane))?;

        let mut spec = array.spec.clone();
        spec.roi = requested.roi.clone();
        spec.voxel_size = spec.voxel_size.without_axis(self.axis);

        let mut out = Batch::new();
        out.insert(self.out_key.clone(), Array::new(data, spec)?);
        Ok(out)
    }
}
