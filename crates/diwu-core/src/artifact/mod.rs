//! Worker artifact generation.

mod builder;
pub mod bundler;
pub mod epilogue;

pub use builder::ArtifactBuilder;
pub use bundler::{Bundler, CommandBundler, InlineBundler};
pub use epilogue::render_epilogue;
