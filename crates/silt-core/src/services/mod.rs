//! Service layer for silt

mod store;

pub use store::StoreService;
