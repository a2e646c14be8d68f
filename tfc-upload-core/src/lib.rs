#![doc = "tfc-upload-core: core logic library for tfc-upload."]

//! Packages a configuration tree into a gzip-compressed tar archive, uploads it
//! as a configuration version to a remote workspace service, and tracks the
//! resulting run.
//!
//! # Usage
//! Drive [`pipeline::upload_configuration`] with a [`config::UploadConfig`] and
//! implementations of the traits in [`contract`]. Transport lives in the CLI crate.

pub mod api;
pub mod archive;
pub mod config;
pub mod contract;
pub mod error;
pub mod hardlinks;
pub mod pipeline;
pub mod select;
pub mod toolchain;
pub mod tracker;
pub mod upload;
pub mod vcs;

pub use error::{UploadError, UploadResult};
