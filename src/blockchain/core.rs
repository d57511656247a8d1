// core.rs splits responsibilities into submodules for easier maintenance.
pub mod chain;
pub mod hash;
pub mod validation;

pub use chain::*;
pub use hash::*;
pub use validation::*;
