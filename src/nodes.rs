pub mod array_source;
pub mod exclude_labels;
pub mod pad;
pub mod random_location;
pub mod random_order;
pub mod reduce_dim;

pub use array_source::ArraySource;
pub use exclude_labels::ExcludeLabels;
pub use pad::PadToRequestedSize;
pub use random_location::RandomLocation;
pub use random_order::RandomOrder;
pub use reduce_dim::{Projection, ReduceDim};
