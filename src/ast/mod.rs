pub mod expression;
pub mod trace;

pub use expression::*;
pub use trace::*;
