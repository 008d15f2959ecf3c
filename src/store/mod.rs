//! Data store modules for Supabase integration

pub mod avatars;
pub mod legacy;
pub mod memories;
pub mod profiles;
pub mod shares;
pub mod supabase;

pub use avatars::AvatarStore;
pub use legacy::LegacyStore;
pub use memories::MemoryStore;
pub use profiles::ProfileStore;
pub use shares::ShareStore;
pub use supabase::{SupabaseClient, SupabaseError};
