//! Shared utilities for the smpq CLI

pub mod format;
