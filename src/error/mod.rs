mod types;

pub use types::{PathMutexError, Result};

// Re-export for convenience
pub use PathMutexError as Error;
