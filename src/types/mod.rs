pub mod account;
pub mod strategy;
pub mod subscription;
pub mod system;

pub use account::*;
pub use strategy::*;
pub use subscription::*;
pub use system::*;
