pub mod error;
pub mod item;
pub mod processor;
pub mod reader;
pub mod writer;
