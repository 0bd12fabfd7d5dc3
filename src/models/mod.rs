pub mod portfolio;
pub mod tag;
pub mod trade;

pub use portfolio::*;
pub use tag::*;
pub use trade::*;
