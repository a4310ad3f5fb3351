use std::collections::BTreeSet;

use crate::{
    batch::Batch,
    error::{VoxweaveError, VoxweaveResult},
    provider::{BatchProvider, MAX_BOUND_HOPS, resolve_bounded_roi},
    roi::Roi,
    spec::{ArrayKey, ArraySpec, BatchRequest, RequestSpec, SpecMap},
};

/// Handed to a filter during setup. The filter declares new keys with
/// `provide` and takes ownership of upstream keys it modifies with `update`;
/// everything else passes through unchanged.
pub struct SetupCtx<'a> {
    upstream: &'a SpecMap,
    provides: Vec<(ArrayKey, ArraySpec)>,
    updates: Vec<(ArrayKey, ArraySpec)>,
}

impl<'a> SetupCtx<'a> {
    fn new(upstream: &'a SpecMap) -> Self {
        Self {
            upstream,
            provides: Vec::new(),
            updates: Vec::new(),
        }
    }

    pub fn upstream(&self) -> &SpecMap {
        self.upstream
    }

    pub fn upstream_spec(&self, key: &ArrayKey) -> VoxweaveResult<&ArraySpec> {
        self.upstream.get(key).ok_or_else(|| {
            VoxweaveError::config(format!("no upstream node declares key '{key}'"))
        })
    }

    pub fn provide(&mut self, key: ArrayKey, spec: ArraySpec) -> VoxweaveResult<()> {
        if self.upstream.contains_key(&key) {
            return Err(VoxweaveError::config(format!(
                "key '{key}' is already declared upstream"
            )));
        }
        spec.validate()?;
        self.provides.push((key, spec));
        Ok(())
    }

    pub fn update(&mut self, key: ArrayKey, spec: ArraySpec) -> VoxweaveResult<()> {
        if !self.upstream.contains_key(&key) {
            return Err(VoxweaveError::config(format!(
                "cannot update key '{key}': no upstream node declares it"
            )));
        }
        spec.validate()?;
        self.updates.push((key, spec));
        Ok(())
    }
}

/// Handed to a filter during prepare, for interrogating the upstream chain.
pub struct PrepareCtx<'a> {
    upstream: &'a dyn BatchProvider,
}

impl PrepareCtx<'_> {
    pub fn upstream_spec(&self, key: &ArrayKey) -> VoxweaveResult<&ArraySpec> {
        self.upstream.spec().get(key).ok_or_else(|| {
            VoxweaveError::negotiation(format!("no upstream node declares key '{key}'"))
        })
    }

    pub fn resolve_bounded_roi(&self, key: &ArrayKey) -> VoxweaveResult<Roi> {
        resolve_bounded_roi(self.upstream, key, MAX_BOUND_HOPS)
    }
}

/// The two-phase transform contract: `prepare` turns a downstream request
/// into the dependencies that must be fetched upstream, `process` turns the
/// fetched arrays into the produced ones. `FilterNode` handles everything
/// around those two calls.
pub trait Filter {
    fn name(&self) -> &str;

    /// When true, requests touching none of this filter's managed keys
    /// bypass it entirely.
    fn autoskip(&self) -> bool {
        false
    }

    fn setup(&mut self, ctx: &mut SetupCtx<'_>) -> VoxweaveResult<()>;

    fn prepare(
        &mut self,
        request: &BatchRequest,
        ctx: &PrepareCtx<'_>,
    ) -> VoxweaveResult<BatchRequest>;

    fn process(&mut self, worked: Batch, request: &BatchRequest) -> VoxweaveResult<Batch>;

    /// Attaches this filter to its upstream, yielding the composed node.
    fn over(self, upstream: impl BatchProvider + 'static) -> FilterNode<Self>
    where
        Self: Sized,
    {
        FilterNode::new(self, upstream)
    }
}

pub struct FilterNode<F: Filter> {
    filter: F,
    upstream: Box<dyn BatchProvider>,
    spec: SpecMap,
    provided: BTreeSet<ArrayKey>,
    updated: BTreeSet<ArrayKey>,
    is_setup: bool,
}

impl<F: Filter> FilterNode<F> {
    pub fn new(filter: F, upstream: impl BatchProvider + 'static) -> Self {
        Self {
            filter,
            upstream: Box::new(upstream),
            spec: SpecMap::new(),
            provided: BTreeSet::new(),
            updated: BTreeSet::new(),
            is_setup: false,
        }
    }

    fn manages(&self, key: &ArrayKey) -> bool {
        self.provided.contains(key) || self.updated.contains(key)
    }
}

impl<F: Filter> BatchProvider for FilterNode<F> {
    fn name(&self) -> &str {
        self.filter.name()
    }

    fn setup(&mut self) -> VoxweaveResult<()> {
        if self.is_setup {
            return Err(VoxweaveError::config(format!(
                "setup ran twice on '{}'",
                self.filter.name()
            )));
        }
        self.upstream.setup()?;

        let mut ctx = SetupCtx::new(self.upstream.spec());
        self.filter.setup(&mut ctx)?;
        let SetupCtx {
            provides, updates, ..
        } = ctx;

        for (key, spec) in &updates {
            self.updated.insert(key.clone());
            self.spec.declare(key.clone(), spec.clone())?;
        }
        for (key, spec) in self.upstream.spec().iter() {
            if !self.updated.contains(key) {
                self.spec.declare(key.clone(), spec.clone())?;
            }
        }
        for (key, spec) in provides {
            self.provided.insert(key.clone());
            self.spec.declare(key, spec)?;
        }

        self.is_setup = true;
        Ok(())
    }

    fn spec(&self) -> &SpecMap {
        &self.spec
    }

    fn upstreams(&self) -> Vec<&dyn BatchProvider> {
        vec![self.upstream.as_ref()]
    }

    fn provide(&mut self, request: &BatchRequest) -> VoxweaveResult<Batch> {
        if !self.is_setup {
            return Err(VoxweaveError::config(format!(
                "'{}' received a request before setup",
                self.filter.name()
            )));
        }

        if self.filter.autoskip() && !request.keys().any(|key| self.manages(key)) {
            tracing::debug!(filter = self.filter.name(), "autoskip");
            return self.upstream.request_batch(request);
        }

        // Passthrough keys go upstream as requested; managed keys are the
        // filter's business and travel only through its dependencies.
        let mut upstream_request = BatchRequest::new(request.random_seed);
        let mut passthrough_rois: Vec<(ArrayKey, Roi)> = Vec::new();
        for (key, requested) in request.iter() {
            if !self.manages(key) {
                upstream_request.insert(key.clone(), requested.clone());
                passthrough_rois.push((key.clone(), requested.roi.clone()));
            }
        }

        let deps = {
            let ctx = PrepareCtx {
                upstream: self.upstream.as_ref(),
            };
            self.filter.prepare(request, &ctx)?
        };

        let mut dep_rois: Vec<(ArrayKey, Roi)> = Vec::new();
        for (key, dep) in deps.iter() {
            if self.provided.contains(key) {
                return Err(VoxweaveError::negotiation(format!(
                    "'{}' requested its own provided key '{key}' upstream",
                    self.filter.name()
                )));
            }
            dep_rois.push((key.clone(), dep.roi.clone()));
            // A dependency colliding with a passthrough key fetches the
            // union hull once; both views are cropped back afterwards.
            let merged = match upstream_request.get(key) {
                Some(existing) => {
                    let voxel_size = match (&dep.voxel_size, &existing.voxel_size) {
                        (Some(dep_voxel), Some(pass_voxel)) if dep_voxel != pass_voxel => {
                            return Err(VoxweaveError::negotiation(format!(
                                "'{}' needs '{key}' at voxel size {dep_voxel} but the \
                                 request asks for {pass_voxel}",
                                self.filter.name()
                            )));
                        }
                        (Some(voxel), _) | (None, Some(voxel)) => Some(voxel.clone()),
                        (None, None) => None,
                    };
                    RequestSpec {
                        roi: existing.roi.union_hull(&dep.roi)?,
                        voxel_size,
                    }
                }
                None => dep.clone(),
            };
            upstream_request.insert(key.clone(), merged);
        }

        let upstream_batch = self.upstream.request_batch(&upstream_request)?;

        let mut worked = Batch::new();
        let mut passthrough = Batch::new();
        for (key, array) in upstream_batch {
            let dep_roi = dep_rois.iter().find(|(k, _)| *k == key).map(|(_, r)| r);
            let pass_roi = passthrough_rois
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, r)| r);
            match (dep_roi, pass_roi) {
                (Some(dep_roi), Some(pass_roi)) => {
                    worked.insert(key.clone(), array.crop_to(dep_roi)?);
                    passthrough.insert(key, array.crop_to(pass_roi)?);
                }
                (Some(dep_roi), None) => {
                    let array = if array.spec.roi == *dep_roi {
                        array
                    } else {
                        array.crop_to(dep_roi)?
                    };
                    worked.insert(key, array);
                }
                (None, Some(_)) => {
                    passthrough.insert(key, array);
                }
                (None, None) => {}
            }
        }

        let produced = self.filter.process(worked, request)?;

        let mut out = passthrough;
        for (key, array) in produced {
            out.insert(key, array);
        }
        Ok(out)
    }
}
