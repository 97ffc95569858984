//! The `utils` module provides a collection of utility functions and common
//! definitions used across the `hubsub` application.
//!
//! It centralizes the error types shared by the hubs and the transport, and
//! the tracing subscriber setup used by the binary and the tests.

pub mod error;
pub mod logging;

pub use error::{DeliveryError, HubError};
