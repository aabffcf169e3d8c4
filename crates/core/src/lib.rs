//! Core voting logic for agora: lifecycle control, the cast protocol and tallies.

pub mod services;

pub use services::*;
