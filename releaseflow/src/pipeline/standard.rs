//! The stock release pipeline.

use super::{Fatality, Pipeline, PipelineBuilder, StagePredicate, StageSpec};
use crate::config::{Config, StageSettings};
use crate::errors::PipelineValidationError;
use crate::release::ReleasePublisher;
use crate::stages::{
    CommandKind, CommandStage, ComputeReleaseMetadataStage, ListBuildOutputStage, PackageArtifactStage,
    PublishReleaseStage, Stage,
};
use std::sync::Arc;

/// Stage names as they appear in reports and logs.
pub mod stage_names {
    /// Installs or updates the toolchain.
    pub const TOOLCHAIN_SETUP: &str = "ToolchainSetup";
    /// Prints toolchain versions.
    pub const TOOLCHAIN_INFO: &str = "ToolchainInfo";
    /// Formatting and lint gates.
    pub const LINT: &str = "Lint";
    /// Type check and tests.
    pub const TEST: &str = "Test";
    /// Optimized build.
    pub const BUILD: &str = "Build";
    /// Derives `TIMESTAMP` and `RELEASE_FILE`.
    pub const COMPUTE_RELEASE_METADATA: &str = "ComputeReleaseMetadata";
    /// Lists the build output directory.
    pub const LIST_BUILD_OUTPUT: &str = "ListBuildOutput";
    /// Writes the release archive.
    pub const PACKAGE_ARTIFACT: &str = "PackageArtifact";
    /// Publishes the release.
    pub const PUBLISH_RELEASE: &str = "PublishRelease";

    /// All stage names in pipeline order.
    pub const ALL: [&str; 9] = [
        TOOLCHAIN_SETUP,
        TOOLCHAIN_INFO,
        LINT,
        TEST,
        BUILD,
        COMPUTE_RELEASE_METADATA,
        LIST_BUILD_OUTPUT,
        PACKAGE_ARTIFACT,
        PUBLISH_RELEASE,
    ];
}

use stage_names as n;

/// Name of the stock pipeline.
pub const RELEASE_PIPELINE_NAME: &str = "release";

fn spec(
    runner: Arc<dyn Stage>,
    predicate: StagePredicate,
    settings: &StageSettings,
    default_timeout_secs: Option<u64>,
) -> StageSpec {
    StageSpec::new(runner)
        .with_predicate(predicate)
        .with_fatality(Fatality::from_best_effort(settings.best_effort))
        .with_timeout(settings.timeout(default_timeout_secs))
}

/// Builds the nine-stage release pipeline from configuration.
///
/// Stages 1-5 always run; stages 6-9 run only on release tags.
///
/// # Errors
///
/// Returns an error if a stage spec is invalid (e.g. a zero timeout).
pub fn release_pipeline(
    config: &Config,
    publisher: Arc<dyn ReleasePublisher>,
) -> Result<Pipeline, PipelineValidationError> {
    let stages = &config.stages;
    let artifact = &config.artifact;
    let default_timeout = config.pipeline.default_timeout_secs;
    let inputs = artifact.effective_inputs();

    let command = |name: &str, kind: CommandKind, settings: &StageSettings| -> StageSpec {
        let runner = CommandStage::new(name, kind, settings.commands.clone())
            .with_shell(config.pipeline.shell.clone());
        spec(Arc::new(runner), StagePredicate::Always, settings, default_timeout)
    };

    let mut metadata = ComputeReleaseMetadataStage::new(n::COMPUTE_RELEASE_METADATA, &artifact.name, inputs.clone());
    if let Some(env_file) = &artifact.env_file {
        metadata = metadata.with_env_file(env_file);
    }

    PipelineBuilder::new(RELEASE_PIPELINE_NAME)
        .spec(command(n::TOOLCHAIN_SETUP, CommandKind::Toolchain, &stages.toolchain_setup))?
        .spec(command(n::TOOLCHAIN_INFO, CommandKind::Toolchain, &stages.toolchain_info))?
        .spec(command(n::LINT, CommandKind::Check, &stages.lint))?
        .spec(command(n::TEST, CommandKind::Check, &stages.test))?
        .spec(command(n::BUILD, CommandKind::Check, &stages.build))?
        .spec(spec(
            Arc::new(metadata),
            StagePredicate::ReleaseTag,
            &stages.compute_release_metadata,
            default_timeout,
        ))?
        .spec(spec(
            Arc::new(ListBuildOutputStage::new(n::LIST_BUILD_OUTPUT, &artifact.output_dir)),
            StagePredicate::ReleaseTag,
            &stages.list_build_output,
            default_timeout,
        ))?
        .spec(spec(
            Arc::new(PackageArtifactStage::new(
                n::PACKAGE_ARTIFACT,
                &artifact.output_dir,
                &artifact.release_dir,
                inputs,
            )),
            StagePredicate::ReleaseTag,
            &stages.package_artifact,
            default_timeout,
        ))?
        .spec(spec(
            Arc::new(PublishReleaseStage::new(
                n::PUBLISH_RELEASE,
                &artifact.release_dir,
                artifact.asset_glob.clone(),
                publisher,
            )),
            StagePredicate::ReleaseTag,
            &stages.publish_release,
            default_timeout,
        ))?
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;
    use crate::release::DryRunPublisher;
    use crate::trigger::{EventKind, TriggerContext};
    use std::time::Duration;

    #[test]
    fn test_release_pipeline_order() {
        let pipeline = release_pipeline(&Config::default(), Arc::new(DryRunPublisher)).unwrap();
        assert_eq!(pipeline.name(), "release");
        assert_eq!(pipeline.stage_names(), stage_names::ALL.to_vec());
    }

    #[test]
    fn test_plan_for_branch_and_tag() {
        let pipeline = release_pipeline(&Config::default(), Arc::new(DryRunPublisher)).unwrap();

        let branch = pipeline.plan(&TriggerContext::new(EventKind::Push, "refs/heads/main"));
        let runs: Vec<bool> = branch.iter().map(|p| p.runs).collect();
        assert_eq!(runs, vec![true, true, true, true, true, false, false, false, false]);

        let tag = pipeline.plan(&TriggerContext::new(EventKind::TagPush, "refs/tags/v2.0.1"));
        assert!(tag.iter().all(|p| p.runs));
    }

    #[test]
    fn test_settings_flow_into_specs() {
        let config = load_config_from_str(
            r#"
[pipeline]
default_timeout_secs = 900

[stages.toolchain_info]
best_effort = true

[stages.list_build_output]
best_effort = true
timeout_secs = 10
"#,
        )
        .unwrap();
        let pipeline = release_pipeline(&config, Arc::new(DryRunPublisher)).unwrap();
        let specs = pipeline.stages();

        assert_eq!(specs[0].fatality, Fatality::Gating);
        assert_eq!(specs[1].fatality, Fatality::BestEffort);
        assert_eq!(specs[6].fatality, Fatality::BestEffort);
        assert_eq!(specs[6].timeout, Some(Duration::from_secs(10)));
        assert_eq!(specs[2].timeout, Some(Duration::from_secs(900)));
    }
}
