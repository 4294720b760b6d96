//! Integration test suite for Weft.
//!
//! These tests run whole projects through the public API, with in-process
//! workers that record when they ran.
//!
//! # Test Categories
//!
//! - `project_run`: Ordering, concurrency and input routing
//! - `subtasks`: Subtask splitting, isolation and combination
//! - `failures`: Error propagation and run abort

mod fixtures;

mod failures;
mod subtasks;
