//! Trigger context: the event that started a run.
//!
//! A [`TriggerContext`] is created once per run and never mutated. Whether
//! the run is a release is decided here, from the ref name alone.

use crate::errors::ConfigError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Prefix carried by tag refs.
pub const TAG_REF_PREFIX: &str = "refs/tags/";

/// Prefix carried by branch refs.
pub const BRANCH_REF_PREFIX: &str = "refs/heads/";

/// The kind of event that started a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Push to a named branch.
    Push,
    /// Pull request targeting a named branch.
    PullRequest,
    /// Push of a tag ref.
    TagPush,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Push => write!(f, "push"),
            Self::PullRequest => write!(f, "pull_request"),
            Self::TagPush => write!(f, "tag_push"),
        }
    }
}

impl FromStr for EventKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "push" => Ok(Self::Push),
            "pull_request" | "pr" => Ok(Self::PullRequest),
            "tag_push" | "tag" => Ok(Self::TagPush),
            other => Err(ConfigError::Validation(format!(
                "unknown event kind '{other}' (expected push, pull_request or tag_push)"
            ))),
        }
    }
}

/// Returns the tag name if `ref_name` is a tag ref.
#[must_use]
pub fn strip_tag_prefix(ref_name: &str) -> Option<&str> {
    ref_name.strip_prefix(TAG_REF_PREFIX)
}

/// Returns the version string for a ref: the ref with any `refs/tags/` prefix removed.
#[must_use]
pub fn version_from_ref(ref_name: &str) -> &str {
    strip_tag_prefix(ref_name).unwrap_or(ref_name)
}

/// Decides which refs count as release tags.
///
/// Any `refs/tags/*` ref qualifies unless a pattern is configured, in which
/// case the stripped tag name must also match it.
#[derive(Debug, Clone, Default)]
pub struct ReleaseTagMatcher {
    pattern: Option<Regex>,
}

impl ReleaseTagMatcher {
    /// Matches every tag ref.
    #[must_use]
    pub fn any_tag() -> Self {
        Self::default()
    }

    /// Matches tag refs whose tag name matches `pattern`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if the pattern is not a valid regex.
    pub fn with_pattern(pattern: &str) -> Result<Self, ConfigError> {
        let regex = Regex::new(pattern).map_err(|e| {
            ConfigError::Validation(format!("invalid release tag pattern '{pattern}': {e}"))
        })?;
        Ok(Self {
            pattern: Some(regex),
        })
    }

    /// Builds a matcher from an optional pattern.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if the pattern is not a valid regex.
    pub fn from_option(pattern: Option<&str>) -> Result<Self, ConfigError> {
        pattern.map_or_else(|| Ok(Self::any_tag()), Self::with_pattern)
    }

    /// Returns true if `ref_name` is a release tag.
    #[must_use]
    pub fn matches(&self, ref_name: &str) -> bool {
        strip_tag_prefix(ref_name).is_some_and(|tag| {
            !tag.is_empty() && self.pattern.as_ref().map_or(true, |re| re.is_match(tag))
        })
    }
}

/// The event that started a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerContext {
    event_kind: EventKind,
    ref_name: String,
    is_release_tag: bool,
}

impl TriggerContext {
    /// Creates a trigger context treating every tag ref as a release tag.
    #[must_use]
    pub fn new(event_kind: EventKind, ref_name: impl Into<String>) -> Self {
        Self::with_matcher(event_kind, ref_name, &ReleaseTagMatcher::any_tag())
    }

    /// Creates a trigger context with a custom release-tag matcher.
    #[must_use]
    pub fn with_matcher(
        event_kind: EventKind,
        ref_name: impl Into<String>,
        matcher: &ReleaseTagMatcher,
    ) -> Self {
        let ref_name = ref_name.into();
        let is_release_tag = matcher.matches(&ref_name);
        Self {
            event_kind,
            ref_name,
            is_release_tag,
        }
    }

    /// Builds a trigger context from an optional event kind and a ref.
    ///
    /// Without an event kind, a tag ref means [`EventKind::TagPush`] and any
    /// other ref means [`EventKind::Push`]. For a tag push, a bare tag name
    /// such as `v2.0.1` is read as `refs/tags/v2.0.1`. A tag push that still
    /// does not resolve to a release tag is logged as a warning.
    #[must_use]
    pub fn from_parts(
        event_kind: Option<EventKind>,
        ref_name: &str,
        matcher: &ReleaseTagMatcher,
    ) -> Self {
        let ref_name = match event_kind {
            Some(EventKind::TagPush) if !ref_name.starts_with("refs/") => {
                format!("{TAG_REF_PREFIX}{ref_name}")
            }
            _ => ref_name.to_string(),
        };
        let event_kind = event_kind.unwrap_or(if strip_tag_prefix(&ref_name).is_some() {
            EventKind::TagPush
        } else {
            EventKind::Push
        });

        let trigger = Self::with_matcher(event_kind, ref_name, matcher);
        if trigger.event_kind == EventKind::TagPush && !trigger.is_release_tag {
            if strip_tag_prefix(&trigger.ref_name).is_some() {
                warn!(ref_name = %trigger.ref_name, "tag does not match the release tag pattern; release stages will be skipped");
            } else {
                warn!(ref_name = %trigger.ref_name, "tag push with a non-tag ref; release stages will be skipped");
            }
        }
        trigger
    }

    /// Builds a trigger context from GitHub Actions style variables.
    ///
    /// Reads `GITHUB_EVENT_NAME` and `GITHUB_REF` through `lookup`. A push
    /// whose ref is a tag ref is reported as [`EventKind::TagPush`].
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if a variable is missing or the event
    /// name is not one the pipeline handles.
    pub fn from_ci_env<F>(lookup: F, matcher: &ReleaseTagMatcher) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let event = lookup("GITHUB_EVENT_NAME")
            .ok_or_else(|| ConfigError::Validation("GITHUB_EVENT_NAME is not set".into()))?;
        let ref_name = lookup("GITHUB_REF")
            .ok_or_else(|| ConfigError::Validation("GITHUB_REF is not set".into()))?;

        let mut event_kind: EventKind = event.parse()?;
        if event_kind == EventKind::Push && strip_tag_prefix(&ref_name).is_some() {
            event_kind = EventKind::TagPush;
        }

        Ok(Self::with_matcher(event_kind, ref_name, matcher))
    }

    /// Returns the event kind.
    #[must_use]
    pub fn event_kind(&self) -> EventKind {
        self.event_kind
    }

    /// Returns the ref name.
    #[must_use]
    pub fn ref_name(&self) -> &str {
        &self.ref_name
    }

    /// Returns true if this run builds a release.
    #[must_use]
    pub fn is_release_tag(&self) -> bool {
        self.is_release_tag
    }

    /// Returns the tag name for release runs.
    #[must_use]
    pub fn release_tag(&self) -> Option<&str> {
        if self.is_release_tag {
            strip_tag_prefix(&self.ref_name)
        } else {
            None
        }
    }

    /// Returns the version derived from the ref name.
    #[must_use]
    pub fn version(&self) -> &str {
        version_from_ref(&self.ref_name)
    }
}

impl fmt::Display for TriggerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.event_kind, self.ref_name)
    }
}
