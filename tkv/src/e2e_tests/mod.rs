//! End-to-end tests at the `TimeKv` operation level.
//!
//! Each test file covers a specific scenario against a fresh in-memory store,
//! using deterministic records and timestamps.

#![cfg(test)]

mod helpers;

mod test_bulk_set;
mod test_concurrent_writers;
mod test_crud;
mod test_faults;
mod test_fetch_page;
mod test_fetch_page_consistent;
mod test_paginate_store;
