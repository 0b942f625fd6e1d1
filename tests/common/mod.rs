//! Common test utilities for synoptic.
//!
//! NetCDF fixture writers, PNG helpers and assertions shared by the
//! integration tests.

#![allow(dead_code)]

pub mod assertions;
pub mod image_utils;
pub mod test_data;
