//! Floating tag selection for a new release and application of resolved tags

use crate::analyzer::{ResolvedTags, TagAction};
use crate::domain::{FloatingTag, Releases, Version};
use crate::error::{MonorelError, Result};
use crate::git::{PushOptions, Repository};
use tracing::info;

/// Floating tags the new release takes over
///
/// `releases` are the releases existing before `version`.
pub fn select_floating_tags(
    version: &Version,
    releases: &Releases,
    major_tag_enabled: bool,
) -> Vec<FloatingTag> {
    let major = version.major;
    let supersedes = |existing: Option<&Version>| existing.map_or(true, |v| version > v);
    let mut tags = Vec::new();

    if version.is_stable() && supersedes(releases.last_stable_release()) {
        tags.push(FloatingTag::Latest);
    }
    if supersedes(releases.last_release()) {
        tags.push(FloatingTag::Next);
    }
    if version.is_stable() && supersedes(releases.last_major_stable_release(major)) {
        if major_tag_enabled {
            tags.push(FloatingTag::Major(major));
        }
        tags.push(FloatingTag::MajorLatest(major));
    }
    if supersedes(releases.last_major_release(major)) {
        tags.push(FloatingTag::MajorNext(major));
    }

    tags
}

/// Annotation of a floating tag pointing at `version`
pub fn floating_tag_message(tag: FloatingTag, version: &Version) -> String {
    format!("Floating tag {} -> {}\n", tag, version.tag_name())
}

/// Point every floating tag in `tags` at `version`, moving existing ones
pub fn set_floating_tags(
    repository: &dyn Repository,
    tags: &[FloatingTag],
    version: &Version,
) -> Result<()> {
    for tag in tags {
        repository.create_annotated_tag(
            &tag.to_string(),
            &version.tag_name(),
            &floating_tag_message(*tag, version),
            true,
        )?;
    }
    Ok(())
}

/// Ref spec pushing a tag update, or deleting the remote tag
fn push_ref(tag: FloatingTag, action: TagAction) -> Option<String> {
    match action {
        TagAction::Update => Some(format!("refs/tags/{}", tag)),
        TagAction::Delete => Some(format!(":refs/tags/{}", tag)),
        TagAction::None => None,
    }
}

/// Apply pending resolver actions locally, then push them atomically to `remote`
///
/// # Returns
/// * `Ok(Vec<String>)` - Applied changes, e.g. `update latest -> v1.2.0`
pub fn apply_resolved_tags(
    repository: &dyn Repository,
    resolved: &ResolvedTags,
    remote: Option<&str>,
) -> Result<Vec<String>> {
    let mut applied = Vec::new();
    let mut refs = Vec::new();

    for pending in resolved.pending() {
        let name = pending.tag.to_string();
        match (pending.action, &pending.version) {
            (TagAction::Update, Some(version)) => {
                repository.create_annotated_tag(
                    &name,
                    &version.tag_name(),
                    &floating_tag_message(pending.tag, version),
                    true,
                )?;
                applied.push(format!("update {} -> {}", name, version.tag_name()));
            }
            (TagAction::Update, None) => {
                return Err(MonorelError::tag(format!("No target for tag {}", name)));
            }
            (TagAction::Delete, _) => {
                repository.delete_tag(&name)?;
                applied.push(format!("delete {}", name));
            }
            (TagAction::None, _) => continue,
        }
        refs.extend(push_ref(pending.tag, pending.action));
    }

    if let Some(remote) = remote.filter(|_| !refs.is_empty()) {
        info!(remote, count = refs.len(), "Pushing floating tags");
        repository.push(
            remote,
            &refs,
            PushOptions {
                atomic: true,
                force: true,
                set_upstream: false,
            },
        )?;
    }

    Ok(applied)
}
