pub mod crypto;
pub mod file;

pub use crypto::*;
pub use file::*;
