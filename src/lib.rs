#![warn(clippy::all)]

pub mod bundler;
pub mod cli;
pub mod compat;
pub mod css;
pub mod error;
pub mod graph;
pub mod interner;
pub mod js;
pub mod linker;
pub mod logger;
pub mod options;
pub mod profiler;
pub mod renamer;
pub mod resolver;
pub mod runtime;
pub mod source;
pub mod sourcemap;
pub mod utils;

pub use bundler::{build, transform, BuildResult, OutputFile, TransformResult};
pub use error::{BindleError, Result};
pub use options::{BuildOptions, EntryPoint, Format, Loader, Platform, SourceMapMode, TransformOptions};
pub use profiler::Profiler;
