pub mod schemas;
pub mod text;

pub use schemas::*;
