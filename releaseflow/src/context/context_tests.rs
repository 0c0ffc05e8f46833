//! Tests for the run context.

#[cfg(test)]
mod tests {
    use crate::context::{FixedClock, RunContext, RunIdentity, RELEASE_FILE_KEY};
    use crate::cancellation::CancellationToken;
    use crate::events::CollectingEventSink;
    use crate::trigger::{EventKind, TriggerContext};
    use chrono::{TimeZone, Utc};
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    fn tag_ctx() -> RunContext {
        RunContext::new(TriggerContext::new(EventKind::TagPush, "refs/tags/v1.4.0"))
    }

    #[test]
    fn test_run_context_defaults() {
        let ctx = tag_ctx();
        assert!(ctx.trigger().is_release_tag());
        assert!(ctx.metadata().is_empty());
        assert_eq!(ctx.workdir(), Path::new("."));
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn test_resolve_path() {
        let ctx = tag_ctx().with_workdir("/work/gen_inds");
        assert_eq!(
            ctx.resolve_path(Path::new("target/release")),
            PathBuf::from("/work/gen_inds/target/release")
        );
        assert_eq!(ctx.resolve_path(Path::new("/tmp/out")), PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_custom_identity_and_clock() {
        let identity = RunIdentity::new().with_external_id("42");
        let instant = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap();
        let ctx = tag_ctx()
            .with_identity(identity.clone())
            .with_clock(Arc::new(FixedClock(instant)));

        assert_eq!(ctx.identity(), &identity);
        assert_eq!(ctx.clock().now(), instant);
    }

    #[test]
    fn test_shared_cancellation() {
        let token = Arc::new(CancellationToken::new());
        let ctx = tag_ctx().with_cancellation(token.clone());

        token.cancel("job cancelled");
        assert!(ctx.is_cancelled());
        assert_eq!(ctx.cancellation().reason().as_deref(), Some("job cancelled"));
    }

    #[test]
    fn test_metadata_visible_through_context() {
        let ctx = tag_ctx();
        ctx.metadata().export(RELEASE_FILE_KEY, "gen_inds_v1.4.0.tar.gz").unwrap();
        assert_eq!(
            ctx.metadata().require(RELEASE_FILE_KEY).unwrap(),
            "gen_inds_v1.4.0.tar.gz"
        );
    }

    #[tokio::test]
    async fn test_emit_carries_run_id_and_stage() {
        let sink = Arc::new(CollectingEventSink::new());
        let ctx = tag_ctx().with_event_sink(sink.clone());

        ctx.emit("pipeline.started", serde_json::json!({"ref": "refs/tags/v1.4.0"}))
            .await;
        ctx.emit_stage("stage.started", "Lint", serde_json::Value::Null).await;

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.run_id == ctx.identity().run_id));
        assert_eq!(events[0].stage, None);
        assert_eq!(events[1].stage.as_deref(), Some("Lint"));
    }

    #[test]
    fn test_debug_lists_exports() {
        let ctx = tag_ctx();
        ctx.metadata().export("VERSION", "v1.4.0").unwrap();
        let debug = format!("{ctx:?}");
        assert!(debug.contains("v1.4.0"));
        assert!(debug.contains("RunContext"));
    }
}
