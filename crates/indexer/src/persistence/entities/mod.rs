pub mod directory;
pub mod measurement;

pub use directory::*;
pub use measurement::*;
