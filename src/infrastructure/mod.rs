pub mod memory_store;
pub mod store;
pub mod supabase_store;

pub use memory_store::MemoryStore;
pub use store::ContentStore;
pub use supabase_store::SupabaseStore;
