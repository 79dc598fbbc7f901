// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Azure tag construction, ownership checks and three-way tag merging.
//!
//! # Three-way merge
//!
//! Tags on an Azure resource can be edited by anyone. To converge without
//! clobbering foreign tags, the controller remembers the tags it applied last
//! time (`L`), compares them with the tags it wants now (`D`) and the tags Azure
//! reports (`O`):
//!
//! - keys in `L` but not in `D` are deleted
//! - keys in `D` whose value in `O` is missing or different are merged
//! - every other key in `O` is left alone
//!
//! ```rust
//! use capz_core::tags::{tags_changed, Tags};
//!
//! fn tags(pairs: &[(&str, &str)]) -> Tags {
//!     pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
//! }
//!
//! let last = tags(&[("a", "1"), ("b", "2")]);
//! let desired = tags(&[("a", "1"), ("c", "3")]);
//! let observed = tags(&[("a", "1"), ("b", "2"), ("x", "9")]);
//!
//! let diff = tags_changed(&last, &desired, &observed);
//! assert!(diff.changed);
//! assert_eq!(diff.create_or_update, Some(tags(&[("c", "3")])));
//! assert_eq!(diff.delete, Some(tags(&[("b", "2")])));
//! assert_eq!(diff.new_annotation, desired);
//! ```

use crate::labels::{LIFECYCLE_OWNED, TAG_CLUSTER_PREFIX, TAG_NAME, TAG_ROLE};
use std::collections::BTreeMap;

/// Azure tags, ordered for deterministic requests and annotations.
pub type Tags = BTreeMap<String, String>;

/// Result of [`tags_changed`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TagsDiff {
    /// True when either patch is present.
    pub changed: bool,
    /// Tags to merge into the resource. `None` when nothing needs merging.
    pub create_or_update: Option<Tags>,
    /// Tags to delete from the resource. `None` when nothing needs deleting.
    pub delete: Option<Tags>,
    /// Value to store as the new last-applied annotation (always the desired tags).
    pub new_annotation: Tags,
}

/// Computes the patches that bring `observed` in line with `desired`, given the
/// tags applied last time.
#[must_use]
pub fn tags_changed(last_applied: &Tags, desired: &Tags, observed: &Tags) -> TagsDiff {
    let deleted: Tags = last_applied
        .iter()
        .filter(|(k, _)| !desired.contains_key(*k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let created_or_updated: Tags = desired
        .iter()
        .filter(|(k, v)| observed.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let changed = !deleted.is_empty() || !created_or_updated.is_empty();
    TagsDiff {
        changed,
        create_or_update: (!created_or_updated.is_empty()).then_some(created_or_updated),
        delete: (!deleted.is_empty()).then_some(deleted),
        new_annotation: desired.clone(),
    }
}

/// Applies a [`TagsDiff`] to a tag set, producing what Azure would report after
/// both patches land.
#[must_use]
pub fn apply_diff(observed: &Tags, diff: &TagsDiff) -> Tags {
    let mut result = observed.clone();
    if let Some(deleted) = &diff.delete {
        for key in deleted.keys() {
            result.remove(key);
        }
    }
    if let Some(merged) = &diff.create_or_update {
        result.extend(merged.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    result
}

/// The cluster-ownership tag key for `cluster_name`.
#[must_use]
pub fn cluster_tag_key(cluster_name: &str) -> String {
    format!("{TAG_CLUSTER_PREFIX}{cluster_name}")
}

/// True when `tags` mark the resource as owned by `cluster_name`.
#[must_use]
pub fn is_owned(tags: &Tags, cluster_name: &str) -> bool {
    tags.get(&cluster_tag_key(cluster_name))
        .is_some_and(|v| v == LIFECYCLE_OWNED)
}

/// Inputs to [`build_tags`].
#[derive(Clone, Debug)]
pub struct BuildParams<'a> {
    /// Owning cluster.
    pub cluster_name: &'a str,
    /// `owned` or `shared`.
    pub lifecycle: &'a str,
    /// Value for the `Name` tag; omitted when empty.
    pub name: &'a str,
    /// Value for the role tag; omitted when empty.
    pub role: &'a str,
    /// User supplied tags. They never override the ownership tags.
    pub additional: &'a Tags,
}

/// Builds the tags every created resource carries.
#[must_use]
pub fn build_tags(params: &BuildParams<'_>) -> Tags {
    let mut tags = params.additional.clone();
    tags.insert(
        cluster_tag_key(params.cluster_name),
        params.lifecycle.to_string(),
    );
    if !params.role.is_empty() {
        tags.insert(TAG_ROLE.to_string(), params.role.to_string());
    }
    if !params.name.is_empty() {
        tags.insert(TAG_NAME.to_string(), params.name.to_string());
    }
    tags
}

#[cfg(test)]
#[path = "tags_tests.rs"]
mod tags_tests;
