//! Probe invocation
//!
//! Builds the argument template for each run variant and streams the
//! probe's stdout back to the caller.

mod invoker;
mod variant;

pub(crate) use invoker::trim_line_ending;
pub use invoker::{launch, resolve_binary, ProbeExit, ProbeLines};
pub use variant::{builtin_variants, RunMode, RunSpec, BUILTIN_VARIANTS, DEFAULT_FLAGS};
