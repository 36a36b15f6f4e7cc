// Utility functions

pub mod logger;
pub mod retry;
pub mod text;

pub use logger::*;
pub use retry::*;
pub use text::*;
