//! Error types for the acceleration-structure store.

use thiserror::Error;

/// Errors that can occur when managing shapes and instances.
///
/// Tree construction itself never fails; degenerate input produces degenerate
/// trees. Errors only arise at the instancing layer.
#[derive(Error, Debug)]
pub enum AccelError {
    /// The instance transform cannot be inverted.
    #[error("instance transform is singular and cannot be inverted")]
    SingularTransform,

    /// A shape id did not resolve to a registered shape.
    #[error("unknown shape id {0}")]
    UnknownShape(u32),

    /// An instance id did not resolve to a registered instance.
    #[error("unknown instance id {0}")]
    UnknownInstance(u32),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, AccelError>;
