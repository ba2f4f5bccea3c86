mod error;
pub mod hash_id;
pub mod lengths;
pub mod speed_estimator;

pub use error::Error;
pub use hash_id::{Id, Id20};

pub type Result<T> = std::result::Result<T, Error>;
