//! Parser and executor for shader test scripts. A script is loaded
//! into a [Script] and then run by an [Executor] against a
//! [Backend](backend::Backend) that does the actual rendering.

mod util;
mod lexer;
mod stream;
mod tolerance;
mod format;
mod vbo;
mod requirements;
mod shader_stage;
mod pipeline_key;
mod window_format;
mod logger;
mod pipeline_set;
mod tester;

pub mod value;
pub mod result;
pub mod source;
pub mod script;
pub mod config;
pub mod inspect;
pub mod backend;
pub mod recording;
pub mod compiler;
pub mod executor;

pub use config::Config;
pub use executor::{BackendFactory, Executor};
pub use format::{Format, VkFormat};
pub use requirements::{DeviceInfo, Requirements};
pub use script::Script;
pub use shader_stage::Stage;
pub use source::Source;
pub use window_format::WindowFormat;
