//! Analysis engine: floating tag resolution, commit classification and changelog rendering

pub mod changelog;
pub mod lint;
pub mod render;
pub mod tag_resolver;

pub use changelog::{
    Changelog, ChangelogBuilder, ChangelogGroup, CommitTypeConfig, CommitTypes, GroupKind,
};
pub use lint::{ChangelogLinter, MarkdownNormalizer};
pub use render::{markdown_to_text, ChangelogRenderer};
pub use tag_resolver::{ResolvedTag, ResolvedTags, TagAction, TagResolver, TagTarget};
