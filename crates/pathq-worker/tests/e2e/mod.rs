//! End-to-end tests for planning and execution through the query catalogue.

mod fixtures;
mod plan_exec_tests;
mod resume_tests;
