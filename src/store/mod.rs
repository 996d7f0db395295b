//! Event store: CSV ingestion and the per-user / per-task data directory layout

pub mod layout;
pub mod loader;

pub use layout::{list_users, max_task_count, task_files_for_users, user_file_count};
pub use loader::{CombinedLoad, LoadReport, LoadedFile, Loader, SkippedFile};
