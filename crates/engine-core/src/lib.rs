pub mod context;
pub mod cross_mapping;
pub mod error;
pub mod mapper;
pub mod metrics;
pub mod state;
