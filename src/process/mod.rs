pub mod conversion;
pub mod definition;
pub mod instance;

pub use conversion::*;
pub use definition::*;
pub use instance::*;
