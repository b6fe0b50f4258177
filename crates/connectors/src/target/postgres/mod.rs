pub mod queries;
pub mod session;
pub mod store;
pub(crate) mod utils;

pub use store::PgTargetStore;
