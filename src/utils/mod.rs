mod time;

pub use time::*;

/// Generate a node id.
pub fn longid() -> String {
    nanoid::nanoid!()
}

/// Generate a webhook path / webhook id.
pub fn new_uuid() -> String {
    ::uuid::Uuid::new_v4().to_string()
}
