//! Test support for bisim: graph fixtures, splitter and event mocks, and
//! partition assertions.

pub mod assertions;
pub mod graphs;
pub mod mock;

pub use assertions::*;
pub use graphs::*;
pub use mock::*;
