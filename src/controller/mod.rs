//! # Controller
//!
//! Core reconciliation modules.
//!
//! - `backoff`: exponential backoff for watch re-opens
//! - `dispatcher`: routes watch notifications to the reconciler
//! - `filter`: exact and regex name lists
//! - `reconciler`: idempotent replica create, update and delete
//! - `rules`: SecretSyncRule matching

pub mod backoff;
pub mod dispatcher;
pub mod filter;
pub mod reconciler;
pub mod rules;
