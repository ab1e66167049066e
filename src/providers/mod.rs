pub mod blockchain;
pub mod embedding;
pub mod http;
