//! CI script used for baton.
//!
//! Runs the same checks locally that CI runs: formatting, lints, builds, docs,
//! and the integration, shuttle, loom and miri test suites.

mod ci;
mod commands;
mod prepare;

pub use self::{ci::*, prepare::*};

fn main() {
    argh::from_env::<CI>().run();
}
