//! Encrypted prompt versioning store.
//!
//! [`PromptStore`] is the only component that sees prompt plaintext: it
//! encrypts on the way into the database and decrypts on the way out, keeps
//! the per-template version history append-only, and reports every access to
//! the security monitor.

pub mod analytics;
pub mod store;

pub use analytics::{PerformanceReport, VersionPerformance};
pub use store::{
    Actor, PromptStore, PromptTemplateSummary, PromptVersionSummary, StoreError, TestRun,
};
