//! `sarstac-core` normalizes SAR STAC item metadata from several commercial
//! providers into one tabular schema.
//!
//! This crate includes:
//! - **Value model**: the storage-safe [`value::Value`] type and its normalizer.
//! - **Resolvers**: field extractors, provider asset and link resolvers.
//! - **Flattening**: one raw item to one flat record, for map and analysis-ready output.
//! - **Unification**: column-level type consistency over a batch of records.
//! - **Provider Registry**: the closed set of providers and the rule tables they select.
//! - **Operations**: concurrent fetch, per-item failure isolation, cleaning, partitioning
//!   and `GeoJSON` output.
//!
//! The `providers` module exposes the static provider registry consumed by the CLI.

pub mod assets;
pub mod batch;
pub mod clean;
pub mod error;
pub mod extract;
pub mod flatten;
pub mod geometry;
pub mod links;
pub mod operations;
pub mod providers;
pub mod types;
pub mod unify;
pub mod utils;
pub mod value;
pub mod writer;
