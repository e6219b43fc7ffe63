pub mod http_client;
pub mod memory_sink;
pub mod tracing_sink;
