//! Row transformers and the builder that assembles them into chains
//!
//! Each kind is registered in [`TRANSFORMERS`] with the command-line flag
//! that selects it and the priority used when no explicit order exists.

mod builder;
pub mod fake;
mod format;
mod null;
mod overwrite;
mod registry;

pub use builder::{Instruction, PipelineBuilder, TransformerConfig, group_consecutive};
pub use fake::FakeTransformer;
pub use format::FormatTransformer;
pub use null::NullTransformer;
pub use overwrite::OverwriteTransformer;
pub use registry::{TRANSFORMERS, TransformerDescriptor, find_flag, find_kind};

pub const NULL_PRIORITY: i32 = 10;
pub const OVERWRITE_PRIORITY: i32 = 20;
pub const FAKE_PRIORITY: i32 = 30;
pub const FORMAT_PRIORITY: i32 = 90;
