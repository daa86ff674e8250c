pub mod gamification;
pub mod transaction;
pub mod user;

pub use gamification::*;
pub use transaction::*;
pub use user::*;
