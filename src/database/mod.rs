pub mod connection;
pub mod operations;
pub mod sink;

pub use operations::store_observation_summary;
pub use sink::PostgresSink;
