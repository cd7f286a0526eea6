//! Step definition modules for Cucumber feature tests.

pub mod codec;
pub mod counter;
pub mod profile;
