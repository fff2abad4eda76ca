mod error;
mod keys;
mod traits;

pub use error::{KvError, Result};
pub use keys::{KeyPrefix, Namespace};
pub use traits::{ttl_secs, KeyTtl, KeyValueStore};
