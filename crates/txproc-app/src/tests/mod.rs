//! Test suites for bootstrap and the dispatch loop.

mod support;
