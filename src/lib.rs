pub mod aggregate;
pub mod checkpoint;
pub mod config;
pub mod crawl;
pub mod dataset;
pub mod error;
pub mod export;
pub mod extract;
pub mod fetch;
pub mod http_client;
pub mod model;
pub mod pairing;
pub mod pipeline;
pub mod rolling;
pub mod team_names;
