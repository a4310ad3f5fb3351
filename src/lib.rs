#![forbid(unsafe_code)]

pub mod batch;
pub mod coord;
pub mod edt;
pub mod error;
pub mod filter;
pub mod nodes;
pub mod pipeline;
pub mod provider;
pub mod roi;
pub mod spec;
pub mod tensor;

pub use batch::{Array, Batch};
pub use coord::Coordinate;
pub use error::{VoxweaveError, VoxweaveResult};
pub use filter::{Filter, FilterNode, PrepareCtx, SetupCtx};
pub use nodes::{
    ArraySource, ExcludeLabels, PadToRequestedSize, Projection, RandomLocation, RandomOrder,
    ReduceDim,
};
pub use pipeline::Pipeline;
pub use provider::BatchProvider;
pub use roi::{AxisSpan, Roi};
pub use spec::{ArrayKey, ArraySpec, BatchRequest, Dtype, RequestSpec, SpecMap};
pub use tensor::Tensor;
