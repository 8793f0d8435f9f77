//! Murmur core
//!
//! Platform-agnostic building blocks of the pass-through filter: the
//! one-pole low-pass engine, the atomically published filter parameters,
//! the collaborator traits for capture devices and device lookup, and the
//! TOML configuration layer. Real-time plumbing and CPAL integration live in
//! `murmur-infra`.

pub mod domain;
