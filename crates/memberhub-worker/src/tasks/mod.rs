//! Built-in task handlers.

pub mod documents;
pub mod theme;

pub use documents::SweepOrphanedBlobs;
pub use theme::RebuildTheme;
