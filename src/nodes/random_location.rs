use rand::RngExt;

use crate::{
    batch::{Array, Batch},
    coord::Coordinate,
    error::{VoxweaveError, VoxweaveResult},
    filter::{Filter, PrepareCtx, SetupCtx},
    provider::derive_rng,
    roi::Roi,
    spec::{BatchRequest, RequestSpec},
};

/// Shifts every requested region by one random, voxel-aligned offset chosen
/// so that all of them land inside their upstream extents. Declares every
/// key unbounded: downstream nodes see a source that can be sampled
/// anywhere.
pub struct RandomLocation {
    name: String,
    pending_shift: Option<Coordinate>,
}

impl RandomLocation {
    pub fn new() -> Self {
        Self {
            name: "random_location".to_string(),
            pending_shift: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Default for RandomLocation {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter for RandomLocation {
    fn name(&self) -> &str {
        &self.name
    }

    fn setup(&mut self, ctx: &mut SetupCtx<'_>) -> VoxweaveResult<()> {
        let keys: Vec<_> = ctx.upstream().keys().cloned().collect();
        for key in keys {
            let mut spec = ctx.upstream_spec(&key)?.clone();
            spec.roi = Roi::unbounded(spec.roi.dims());
            ctx.update(key, spec)?;
        }
        Ok(())
    }

    fn prepare(
        &mut self,
        request: &BatchRequest,
        ctx: &PrepareCtx<'_>,
    ) -> VoxweaveResult<BatchRequest> {
        let mut rng = derive_rng(request.random_seed, &self.name);

        // Shifts must keep every key voxel-aligned, so the step is the lcm
        // of the requested keys' voxel sizes.
        let mut step: Option<Coordinate> = None;
        let mut lo: Option<Coordinate> = None;
        let mut hi: Option<Coordinate> = None;
        for (key, requested) in request.iter() {
            let voxel_size = ctx.upstream_spec(key)?.voxel_size.clone();
            step = Some(match step {
                None => voxel_size,
                Some(step) => step.lcm(&voxel_size),
            });

            let bounded = ctx.resolve_bounded_roi(key)?;
            let key_lo = &bounded.bounded_offset()? - &requested.roi.bounded_offset()?;
            let key_hi = &bounded.bounded_end()? - &requested.roi.bounded_end()?;
            lo = Some(match lo {
                None => key_lo,
                Some(lo) => lo.max(&key_lo),
            });
            hi = Some(match hi {
                None => key_hi,
                Some(hi) => hi.min(&key_hi),
            });
        }
        let (Some(step), Some(lo), Some(hi)) = (step, lo, hi) else {
            return Err(VoxweaveError::negotiation(format!(
                "'{}' was invoked with an empty request",
                self.name
            )));
        };

        let mut shift = Vec::with_capacity(step.dims());
        for axis in 0..step.dims() {
            let s = step[axis];
            let first = div_ceil(lo[axis], s);
            let last = div_floor(hi[axis], s);
            if last < first {
                return Err(VoxweaveError::negotiation(format!(
                    "'{}' found no shift on axis {axis}: requested extents exceed every \
                     upstream extent",
                    self.name
                )));
            }
            let pick = first + rng.random_range(0..=(last - first));
            shift.push(pick * s);
        }
        let shift = Coordinate::new(shift);
        tracing::debug!(node = %self.name, shift = %shift, "sampled location");

        let mut deps = BatchRequest::new(request.random_seed);
        for (key, requested) in request.iter() {
            deps.insert(
                key.clone(),
                RequestSpec {
                    roi: requested.roi.shift(&shift),
                    voxel_size: requested.voxel_size.clone(),
                },
            );
        }
        self.pending_shift = Some(shift);
        Ok(deps)
    }

    fn process(&mut self, worked: Batch, request: &BatchRequest) -> VoxweaveResult<Batch> {
        let shift = self.pending_shift.take().ok_or_else(|| {
            VoxweaveError::data_integrity(format!(
                "'{}' has no pending shift; process without prepare",
                self.name
            ))
        })?;
        let back = &Coordinate::zeros(shift.dims()) - &shift;
        let mut out = Batch::new();
        for (key, array) in worked {
            if !request.contains_key(&key) {
                continue;
            }
            let mut spec = array.spec.clone();
            spec.roi = spec.roi.shift(&back);
            out.insert(key, Array::new(array.data, spec)?);
        }
        Ok(out)
    }
}

fn div_floor(a: i64, b: i64) -> i64 {
    a.div_euclid(b)
}

fn div_ceil(a: i64, b: i64) -> i64 {
    -(-a).div_euclid(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_rounding_division() {
        assert_eq!(div_floor(7, 2), 3);
        assert_eq!(div_floor(-7, 2), -4);
        assert_eq!(div_ceil(7, 2), 4);
        assert_eq!(div_ceil(-7, 2), -3);
        assert_eq!(div_floor(6, 2), 3);
        assert_eq!(div_ceil(6, 2), 3);
    }
}
