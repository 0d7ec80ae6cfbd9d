pub mod config;
pub mod config_parser;
pub mod domain;
pub mod error;
pub mod kafka;
pub mod metrics;
pub mod processor;
pub mod retry;
pub mod runtime;
pub mod shutdown;

pub use config::*;
pub use config_parser::*;
pub use domain::*;
pub use error::*;
pub use kafka::*;
pub use metrics::*;
pub use processor::*;
pub use retry::*;
pub use runtime::*;
pub use shutdown::*;
