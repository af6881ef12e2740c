pub mod agent;
pub mod config;
pub mod demo_agent;
pub mod error;
pub mod exec;
pub mod handlers;
pub mod http;
pub mod ids;
pub mod model;
pub mod registry;
pub mod store;
pub mod stream_adapter;

pub use agent::{Agent, AgentBuilder};
pub use error::RuntimeError;
pub use exec::{CancelToken, ChunkStream, ExecRun};
