//! Floating tag resolution
//!
//! Computes the desired target of every floating tag (`latest`, `next`, `vN`, `vN.latest`,
//! `vN.next`) from the immutable release tags, and diffs it against what the repository
//! currently has. Pure: the caller applies the returned actions.

use crate::domain::{FloatingTag, TagRef, Version};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;
use tracing::warn;

fn release_tag_prefix() -> Option<&'static Regex> {
    static PREFIX: OnceLock<Option<Regex>> = OnceLock::new();
    PREFIX
        .get_or_init(|| Regex::new(r"^v\d+\.\d+\.\d+").ok())
        .as_ref()
}

/// Change required to bring a floating tag to its computed target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagAction {
    None,
    Update,
    Delete,
}

impl fmt::Display for TagAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagAction::None => f.write_str("-"),
            TagAction::Update => f.write_str("update"),
            TagAction::Delete => f.write_str("delete"),
        }
    }
}

/// What a floating tag currently points at
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TagTarget {
    /// Tag does not exist
    #[default]
    Absent,
    /// Tag points at a commit that is not a release
    NonRelease,
    Release(Version),
}

/// Resolution result for one floating tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTag {
    pub tag: FloatingTag,
    /// Computed target, `None` when no release qualifies
    pub version: Option<Version>,
    pub current: TagTarget,
    pub action: TagAction,
}

/// Sorted resolution output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedTags {
    tags: Vec<ResolvedTag>,
}

impl ResolvedTags {
    pub fn iter(&self) -> impl Iterator<Item = &ResolvedTag> {
        self.tags.iter()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn get(&self, tag: FloatingTag) -> Option<&ResolvedTag> {
        self.tags.iter().find(|resolved| resolved.tag == tag)
    }

    /// Computed target of a floating tag
    pub fn target(&self, tag: FloatingTag) -> Option<&Version> {
        self.get(tag).and_then(|resolved| resolved.version.as_ref())
    }

    /// Tags needing an update or delete
    pub fn pending(&self) -> impl Iterator<Item = &ResolvedTag> {
        self.tags
            .iter()
            .filter(|resolved| resolved.action != TagAction::None)
    }

    pub fn is_up_to_date(&self) -> bool {
        self.pending().next().is_none()
    }
}

#[derive(Default)]
struct TagState {
    version: Option<Version>,
    current: TagTarget,
}

/// Resolves floating tags from the repository's tag set
#[derive(Debug, Clone, Copy, Default)]
pub struct TagResolver {
    major_tag_enabled: bool,
}

impl TagResolver {
    pub fn new(major_tag_enabled: bool) -> Self {
        TagResolver { major_tag_enabled }
    }

    pub fn resolve(&self, tags: &[TagRef]) -> ResolvedTags {
        let mut states: BTreeMap<FloatingTag, TagState> = BTreeMap::new();

        for tag in tags {
            if release_tag_prefix().is_some_and(|re| re.is_match(&tag.name)) {
                match Version::parse(&tag.name) {
                    Ok(version) => record_release(&mut states, version),
                    Err(e) => warn!(tag = %tag.name, error = %e, "Skipping unparsable release tag"),
                }
            } else if let Ok(floating) = FloatingTag::parse(&tag.name) {
                states.entry(floating).or_default().current = match &tag.release {
                    Some(version) => TagTarget::Release(version.clone()),
                    None => TagTarget::NonRelease,
                };
            }
        }

        let tags = states
            .into_iter()
            .filter_map(|(tag, state)| self.decide(tag, state))
            .collect();

        ResolvedTags { tags }
    }

    fn decide(&self, tag: FloatingTag, state: TagState) -> Option<ResolvedTag> {
        let major_disallowed = tag.is_major_tag() && !self.major_tag_enabled;

        let action = match (&state.current, &state.version) {
            (TagTarget::Absent, _) if major_disallowed => return None,
            (TagTarget::Absent, None) => return None,
            (TagTarget::Absent, Some(_)) => TagAction::Update,
            _ if major_disallowed => TagAction::Delete,
            (_, None) => TagAction::Delete,
            (TagTarget::NonRelease, Some(_)) => TagAction::Update,
            (TagTarget::Release(current), Some(target)) if current != target => TagAction::Update,
            _ => TagAction::None,
        };

        Some(ResolvedTag {
            tag,
            version: state.version,
            current: state.current,
            action,
        })
    }
}

fn raise(states: &mut BTreeMap<FloatingTag, TagState>, tag: FloatingTag, version: &Version) {
    let state = states.entry(tag).or_default();
    if state.version.as_ref().map_or(true, |current| version > current) {
        state.version = Some(version.clone());
    }
}

fn record_release(states: &mut BTreeMap<FloatingTag, TagState>, version: Version) {
    let major = version.major;

    raise(states, FloatingTag::Next, &version);
    raise(states, FloatingTag::MajorNext(major), &version);

    if version.is_stable() {
        raise(states, FloatingTag::Latest, &version);
        raise(states, FloatingTag::MajorLatest(major), &version);

        let major_latest = states
            .get(&FloatingTag::MajorLatest(major))
            .and_then(|state| state.version.clone());
        states.entry(FloatingTag::Major(major)).or_default().version = major_latest;
    }
}
