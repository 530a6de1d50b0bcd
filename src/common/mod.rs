mod cache;
pub mod path;
mod version;

pub use cache::MemCache;
pub use version::Version;
