pub mod artifacts;
pub mod binance;
pub mod embeddings;
pub mod factory;
pub mod http;
pub mod mock;
pub mod vector_store;
