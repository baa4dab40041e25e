//! PostgreSQL implementations of the store traits.

pub mod node;
pub mod task;
pub mod tenant;
pub mod theme;

pub use node::NodeRepository;
pub use task::TaskRepository;
pub use tenant::TenantRepository;
pub use theme::ThemeVersionRepository;
