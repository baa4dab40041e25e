//! Theme build entities.

pub mod model;

pub use model::ThemeVersion;
