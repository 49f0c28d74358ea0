#![allow(clippy::unwrap_used)]
//! Integration tests for the file-backed calendar store.

mod concurrency;
mod helpers;
mod lifecycle;
mod persistence;
mod range_query;
