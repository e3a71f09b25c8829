//! Predict endpoint load tester
//!
//! This library provides the core of the predict-loadtest harness, which
//! fans out concurrent classification requests against a remote predict
//! endpoint, times each one, and summarizes the run as a CSV file and a
//! console report.

pub mod config;
pub mod harness;
pub mod models;
pub mod services;
pub mod telemetry;
