//! Request handlers.

pub mod artifacts;
pub mod health;
pub mod processing;
pub mod reels;

pub use artifacts::*;
pub use health::*;
pub use processing::*;
pub use reels::*;
