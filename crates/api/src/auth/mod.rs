//! Authentication primitives.
//!
//! Tokens are issued elsewhere; this service only validates them. See
//! [`jwt`].

pub mod jwt;
