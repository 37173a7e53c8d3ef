//! Common test utilities for tubeaudio-dl integration tests

#[allow(dead_code)]
pub mod fixtures;
#[allow(dead_code)]
pub mod scripted;

#[allow(unused_imports)]
pub use fixtures::*;
pub use scripted::*;
