//! Test suites for the lifecycle controller and the detached instance.

mod support;
