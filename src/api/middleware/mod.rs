//! HTTP middleware. Only request access logging; the service runs without
//! an authentication layer.

pub mod access;
