//! the test_utils folder here will share fixtures and fake collaborators
//! between the unit tests of every module
mod common;
mod mock;

pub use common::*;
pub use mock::*;
