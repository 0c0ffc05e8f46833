//! Run-scoped context for pipeline execution.
//!
//! This module provides:
//! - The [`RunContext`] passed by reference into every stage
//! - The [`MetadataStore`] replacing process-wide environment mutation
//! - Run identity and an injectable clock

mod clock;
#[cfg(test)]
mod context_tests;
mod identity;
mod metadata;
mod run;

pub use clock::{Clock, FixedClock, SystemClock};
pub use identity::RunIdentity;
pub use metadata::{MetadataStore, RELEASE_FILE_KEY, TIMESTAMP_KEY, VERSION_KEY};
pub use run::RunContext;
