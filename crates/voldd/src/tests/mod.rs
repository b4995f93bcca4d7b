//! Test suites for the daemon startup.

mod support;
