//! Pipeline stages for processing one document.
//!
//! Each submodule implements one collaborator of the orchestrator in
//! [`crate::process`]. The network-facing ones sit behind traits so tests
//! and callers can swap them.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ archive ┐
//!      └──▶ transport (POST) ──▶ decode ──▶ [poll: transport (GET) ──▶ decode]* ──▶ transport (GET result)
//! ```
//!
//! 1. [`input`]    : validate the local path and read the document bytes
//! 2. [`archive`]  : optional best-effort upload of the source to object storage
//! 3. [`transport`]: authenticated HTTP requests; never retries
//! 4. [`decode`]   : service XML into a [`crate::task::TaskRecord`] or a typed error

pub mod archive;
pub mod decode;
pub mod input;
pub mod transport;
