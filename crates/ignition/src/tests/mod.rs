//! Test suites for the ignition boot sequence.

pub(crate) mod support;
