//! Prelude for convenient imports.
//!
//! ```rust
//! use stencil_render::prelude::*;
//!
//! let processor = Processor::new(TargetConfig::default());
//! assert_eq!(processor.state(), None);
//! ```

pub use crate::{
    emit_state, persist_lines, wrap, ConfigError, Message, ProcessError, Processor, RenderError,
    TargetConfig, WrappedValue,
};
