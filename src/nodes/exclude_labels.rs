use std::collections::BTreeSet;

use crate::{
    batch::{Array, Batch},
    edt,
    error::{VoxweaveError, VoxweaveResult},
    filter::{Filter, PrepareCtx, SetupCtx},
    roi::Roi,
    spec::{ArrayKey, ArraySpec, BatchRequest, Dtype, RequestSpec},
    tensor::Tensor,
};

/// Rewrites unwanted label values to a background value and derives a
/// boolean inclusion mask, grown by a physical-unit context margin around
/// the kept labels. An upstream mask, if declared, is intersected rather
/// than replaced.
pub struct ExcludeLabels {
    name: String,
    labels_key: ArrayKey,
    mask_key: ArrayKey,
    exclude: BTreeSet<i64>,
    include_context: f64,
    background: f32,
    mask_upstream: bool,
}

impl ExcludeLabels {
    pub fn new(
        labels_key: impl Into<ArrayKey>,
        mask_key: impl Into<ArrayKey>,
        exclude: impl IntoIterator<Item = i64>,
        include_context: f64,
    ) -> VoxweaveResult<Self> {
        if !include_context.is_finite() || include_context < 0.0 {
            return Err(VoxweaveError::config(format!(
                "include context must be finite and non-negative, got {include_context}"
            )));
        }
        Ok(Self {
            name: "exclude_labels".to_string(),
            labels_key: labels_key.into(),
            mask_key: mask_key.into(),
            exclude: exclude.into_iter().collect(),
            include_context,
            background: 0.0,
            mask_upstream: false,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_background(mut self, background: f32) -> Self {
        self.background = background;
        self
    }
}

impl Filter for ExcludeLabels {
    fn name(&self) -> &str {
        &self.name
    }

    fn autoskip(&self) -> bool {
        true
    }

    fn setup(&mut self, ctx: &mut SetupCtx<'_>) -> VoxweaveResult<()> {
        let labels_spec = ctx.upstream_spec(&self.labels_key)?.clone();
        ctx.update(self.labels_key.clone(), labels_spec.clone())?;

        self.mask_upstream = ctx.upstream().contains_key(&self.mask_key);
        if self.mask_upstream {
            let mask_spec = ctx.upstream_spec(&self.mask_key)?.clone();
            ctx.update(self.mask_key.clone(), mask_spec)?;
        } else {
            let mask_spec = ArraySpec {
                interpolatable: false,
                dtype: Some(Dtype::Bool),
                ..labels_spec
            };
            ctx.provide(self.mask_key.clone(), mask_spec)?;
        }
        Ok(())
    }

    fn prepare(
        &mut self,
        request: &BatchRequest,
        _ctx: &PrepareCtx<'_>,
    ) -> VoxweaveResult<BatchRequest> {
        let labels_roi = request.get(&self.labels_key).map(|r| &r.roi);
        let mask_roi = request.get(&self.mask_key).map(|r| &r.roi);
        let fetch_roi: Roi = match (labels_roi, mask_roi) {
            (Some(l), Some(m)) => l.union_hull(m)?,
            (Some(l), None) => l.clone(),
            (None, Some(m)) => m.clone(),
            (None, None) => {
                return Err(VoxweaveError::negotiation(format!(
                    "'{}' was invoked without '{}' or '{}' in the request",
                    self.name, self.labels_key, self.mask_key
                )));
            }
        };

        let mut deps = BatchRequest::new(request.random_seed);
        deps.insert(self.labels_key.clone(), RequestSpec::new(fetch_roi));
        if self.mask_upstream && let Some(mask_roi) = mask_roi {
            deps.insert(self.mask_key.clone(), RequestSpec::new(mask_roi.clone()));
        }
        Ok(deps)
    }

    fn process(&mut self, mut worked: Batch, request: &BatchRequest) -> VoxweaveResult<Batch> {
        let mut labels = worked.take(&self.labels_key)?;
        if labels.channel_dims() != 0 {
            return Err(VoxweaveError::data_integrity(format!(
                "'{}' expects a scalar label volume for '{}', got shape {:?}",
                self.name,
                self.labels_key,
                labels.data.shape()
            )));
        }

        // Rewrite excluded labels and build the inclusion indicator in one
        // pass over the volume.
        let mut indicator = Tensor::zeros(labels.data.shape());
        let background = self.background;
        for (value, mark) in labels
            .data
            .data_mut()
            .iter_mut()
            .zip(indicator.data_mut().iter_mut())
        {
            if self.exclude.contains(&(*value as i64)) {
                *value = background;
            } else {
                *mark = 1.0;
            }
        }

        let sampling: Vec<f64> = labels.spec.voxel_size.iter().map(|v| v as f64).collect();
        let dist = edt::distance(&indicator, &sampling)?;
        let max_finite = dist
            .data()
            .iter()
            .copied()
            .filter(|d| d.is_finite())
            .fold(0.0f32, f32::max);
        tracing::debug!(node = %self.name, max_distance = max_finite, "distance to kept labels");

        // Kept voxels stay in regardless of the margin, so a zero context
        // yields exactly the indicator.
        let include_context = self.include_context as f32;
        let mask_data: Vec<f32> = indicator
            .data()
            .iter()
            .zip(dist.data())
            .map(|(&kept, &d)| {
                if kept != 0.0 || d < include_context {
                    1.0
                } else {
                    0.0
                }
            })
            .collect();
        let mask_spec = ArraySpec {
            roi: labels.spec.roi.clone(),
            voxel_size: labels.spec.voxel_size.clone(),
            interpolatable: false,
            dtype: Some(Dtype::Bool),
        };
        let mut mask = Array::new(
            Tensor::from_vec(labels.data.shape(), mask_data)?,
            mask_spec,
        )?;

        let mut out = Batch::new();
        if let Some(requested) = request.get(&self.mask_key) {
            if self.mask_upstream {
                // Intersection with the existing mask: never grows it.
                let existing = worked.take(&self.mask_key)?;
                mask = mask.crop_to(&existing.spec.roi)?;
                if mask.data.shape() != existing.data.shape() {
                    return Err(VoxweaveError::data_integrity(format!(
                        "'{}' cannot intersect masks of shapes {:?} and {:?}: '{}' lives \
                         on a different grid than '{}'",
                        self.name,
                        mask.data.shape(),
                        existing.data.shape(),
                        self.mask_key,
                        self.labels_key
                    )));
                }
                for (m, &e) in mask.data.data_mut().iter_mut().zip(existing.data.data()) {
                    if e == 0.0 {
                        *m = 0.0;
                    }
                }
            }
            out.insert(self.mask_key.clone(), mask.crop_to(&requested.roi)?);
        }
        if let Some(requested) = request.get(&self.labels_key) {
            out.insert(self.labels_key.clone(), labels.crop_to(&requested.roi)?);
        }
        Ok(out)
    }
}
