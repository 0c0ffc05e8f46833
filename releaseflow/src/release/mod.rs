//! Release artifact naming, packaging and publishing.

mod archive;
mod descriptor;
#[cfg(feature = "github")]
mod github;
mod publisher;

pub use archive::{collect_assets, list_directory, resolve_inputs, write_archive, ArchiveSummary};
pub use descriptor::{
    default_input_patterns, format_timestamp, release_file_name, InputPattern,
    ReleaseArtifactDescriptor, ARCHIVE_EXTENSION, DEFAULT_ARTIFACT_NAME, TIMESTAMP_FORMAT,
};
#[cfg(feature = "github")]
pub use github::GithubReleasePublisher;
#[cfg(test)]
pub use publisher::MockReleasePublisher;
pub use publisher::{publisher_from_config, DryRunPublisher, PublishReceipt, ReleasePublisher};
