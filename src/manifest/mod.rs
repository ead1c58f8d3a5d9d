//! Manifest module
//!
//! Decodes catalog manifests and flattens them into file tasks.

pub mod node;
pub mod task;
pub mod flatten;
pub mod layout;

pub use node::ManifestNode;
pub use task::{FileKind, FileTask, TaskStatus};
pub use flatten::ManifestFlattener;
pub use layout::{collect_work_ids, manifest_cache_path, parse_work_id, sanitize_name, work_root};
