pub mod producer;
pub mod consumer;
pub mod streams;
pub mod rocksdb_store;

pub use producer::*;
pub use consumer::*;
pub use streams::*;
pub use rocksdb_store::*;
