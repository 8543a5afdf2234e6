pub mod catalog;
pub mod selection;
pub mod storage;

pub use catalog::{Tenant, TenantCatalog};
pub use selection::TenantSelectionStore;
pub use storage::{FileTier, MemoryTier, SelectionTier};
