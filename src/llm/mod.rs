// LLM abstraction layer

pub mod google;
pub mod provider;

pub use provider::*;
pub use crate::types::*;
