pub mod http;
pub mod stdio;
pub mod traits;

pub use http::HttpTransport;
pub use stdio::StdioTransport;
pub use traits::Transport;
