//! Concrete backends for the [`TryOnGenerator`](crate::generation::TryOnGenerator) and
//! [`UploadRelay`](crate::upload_relay::UploadRelay) seams.
//!
//! Each submodule speaks one vendor's API while conforming to the Drape contracts.

pub mod replicate;
