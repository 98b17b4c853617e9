// Per-record transformation stages: bucketing, masking, deduplication, and
// the transformer that composes them into one batch pass.

pub mod bucketize;
pub mod dedupe;
pub mod mask;
pub mod transform;

pub use bucketize::BracketScheme;
pub use transform::{RecordTransformer, RunState, TransformOutcome, TransformStats};
