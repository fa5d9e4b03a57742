//! Naming and paging constants shared by the codec, iterator and transport.

/// Separates the caller-chosen id from the hex-encoded schedule time.
pub const TIMESTAMP_SEPARATOR: char = '_';

/// Separates the comparison key from the decimal version.
pub const VERSION_SEPARATOR: char = 'v';

/// Path segment between a queue path and a task id.
pub const TASKS_SEGMENT: &str = "/tasks/";

/// Maximum length of a task id (the last path segment of a task name).
pub const MAX_TASK_ID_LEN: usize = 500;

/// Largest page the remote queue returns from a single list call.
pub const MAX_PAGE_SIZE: i32 = 1000;

/// Page size used when the configuration does not set one.
pub const DEFAULT_PAGE_SIZE: i32 = MAX_PAGE_SIZE;

/// Version assigned to a task created without one.
pub const INITIAL_VERSION: u64 = 1;
