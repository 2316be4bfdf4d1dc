//! Feature preprocessing.
//!
//! Each [`FeatureGroup`] dispatches its columns through an ordered list of
//! [`TransformStep`]s; the groups' outputs are concatenated in group order
//! (numeric first, then categorical) into one numeric row per input row.
//!
//! The fit/transform lifecycle is split across two types so a fitted
//! preprocessor cannot be refitted:
//!
//! ```text
//! PreprocessorBuilder ──build()──> UnfittedPipeline ──fit(train)──> FittedPipeline
//!                                                                   │
//!                                                    transform(train | test | new)
//! ```

mod builder;
mod pipeline;
mod steps;

pub use builder::PreprocessorBuilder;
pub use pipeline::{FeatureGroup, FittedGroup, FittedPipeline, UnfittedPipeline};
pub use steps::{BlockKind, FillValue, FittedStep, ImputeStrategy, TransformStep};
