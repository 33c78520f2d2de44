//! Terminal UI: the interactive display sink and shared icons.

pub mod display;
pub mod icons;

pub use display::ConsoleSink;
