//! layerpack-lib: content-addressed packing of function archives and
//! dependency layers.
//!
//! This crate provides:
//! - `fingerprint`: file and string digests with a per-session cache
//! - `deps`: the dependency closure of a compiled entry point
//! - `store`: existence checks and uploads against a blob store
//! - `pack`: the layer and function packers built on the above
//! - `compile`: the bundler boundary, with esbuild and passthrough strategies

pub mod archive;
pub mod compile;
pub mod config;
pub mod consts;
pub mod deps;
pub mod fingerprint;
pub mod pack;
pub mod paths;
pub mod process;
pub mod reporter;
pub mod store;
