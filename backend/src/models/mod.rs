pub mod resource;
pub mod suite;

pub use resource::*;
pub use suite::*;
