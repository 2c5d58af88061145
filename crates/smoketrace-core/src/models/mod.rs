//! Data models for decoded trace exports

mod attribute;
mod export;
pub mod proto;
mod span;

pub use attribute::*;
pub use export::*;
pub use span::*;
