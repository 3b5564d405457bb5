pub mod admin;
pub mod artifact;
pub mod delivery;
pub mod outfit;
pub mod user;

pub use admin::*;
pub use artifact::*;
pub use delivery::*;
pub use outfit::*;
pub use user::*;
