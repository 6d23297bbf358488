pub mod errors;
pub mod shutdown;
pub mod tracing;

pub use errors::{McpError, McpResult};
pub use shutdown::ShutdownCoordinator;
