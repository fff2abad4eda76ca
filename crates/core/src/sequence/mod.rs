mod types;

pub use types::IncrementOptions;
