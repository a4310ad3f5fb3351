use crate::{
    batch::Batch,
    error::VoxweaveResult,
    provider::BatchProvider,
    spec::{BatchRequest, SpecMap},
};

/// Owns a composed node tree. Building runs the one-time bottom-up setup
/// pass; afterwards the pipeline answers requests until dropped.
pub struct Pipeline {
    root: Box<dyn BatchProvider>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("root", &self.root.name())
            .finish()
    }
}

impl Pipeline {
    #[tracing::instrument(skip_all)]
    pub fn build(root: impl BatchProvider + 'static) -> VoxweaveResult<Self> {
        let mut root: Box<dyn BatchProvider> = Box::new(root);
        root.setup()?;
        tracing::debug!(keys = root.spec().len(), "pipeline ready");
        Ok(Self { root })
    }

    pub fn spec(&self) -> &SpecMap {
        self.root.spec()
    }

    #[tracing::instrument(skip_all, fields(seed = request.random_seed))]
    pub fn request_batch(&mut self, request: &BatchRequest) -> VoxweaveResult<Batch> {
        self.root.request_batch(request)
    }
}
