//! Sidebar planning.
//!
//! The pure half of the sidebar engine: where a new category goes, how
//! orphans merge into the built-ins, which fields an update may change and
//! which favorites a change adds or removes. The store applies the results
//! inside its transactions.

use std::collections::HashSet;

use crate::domain::entities::{
    SidebarCategory, SidebarCategoryType, SidebarCategoryWithChannels, SIDEBAR_SORT_ORDER_STEP,
};

/// The three built-ins for `(user, team)` in their initial order.
pub fn initial_categories(user_id: &str, team_id: &str) -> Vec<SidebarCategory> {
    SidebarCategoryType::built_ins()
        .iter()
        .enumerate()
        .map(|(i, kind)| SidebarCategory::built_in(*kind, user_id, team_id, i as i64 * SIDEBAR_SORT_ORDER_STEP))
        .collect()
}

/// Index at which a new custom category is inserted: right after favorites
/// when favorites is first, otherwise at the top.
pub fn new_category_position(ordered: &[SidebarCategory]) -> usize {
    match ordered.first() {
        Some(first) if first.category_type == SidebarCategoryType::Favorites => 1,
        _ => 0,
    }
}

/// `(id, sort_order)` for consecutive positions.
pub fn renumber(ids: &[String]) -> Vec<(String, i64)> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| (id.clone(), i as i64 * SIDEBAR_SORT_ORDER_STEP))
        .collect()
}

/// Assigned channels in order, then orphans not already listed.
pub fn merge_orphans(assigned: &[String], orphans: &[String]) -> Vec<String> {
    let mut seen: HashSet<&str> = assigned.iter().map(String::as_str).collect();
    let mut merged = assigned.to_vec();
    for id in orphans {
        if seen.insert(id.as_str()) {
            merged.push(id.clone());
        }
    }
    merged
}

/// Whether `requested` is a permutation of `current`.
pub fn is_same_category_set(current: &[String], requested: &[String]) -> bool {
    if current.len() != requested.len() {
        return false;
    }
    let current: HashSet<&str> = current.iter().map(String::as_str).collect();
    let requested_set: HashSet<&str> = requested.iter().map(String::as_str).collect();
    requested_set.len() == requested.len() && current == requested_set
}

/// Apply the writable parts of `update` to `original`.
///
/// Identity, owner, team and type never change. Only custom categories can
/// be renamed. Duplicate channel ids collapse to their first occurrence.
pub fn apply_update(
    original: &SidebarCategoryWithChannels,
    update: &SidebarCategoryWithChannels,
) -> SidebarCategoryWithChannels {
    let mut next = original.clone();
    next.category.sorting = update.category.sorting;
    next.category.muted = update.category.muted;
    next.category.collapsed = update.category.collapsed;
    if original.category_type() == SidebarCategoryType::Custom && !update.category.display_name.is_empty() {
        next.category.display_name = update.category.display_name.clone();
    }

    let mut seen = HashSet::new();
    next.channel_ids = update
        .channel_ids
        .iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect();
    next
}

/// Drop ids that are not among the user's direct or group channels.
pub fn retain_known_channels(channel_ids: &[String], known: &HashSet<String>) -> Vec<String> {
    channel_ids
        .iter()
        .filter(|id| known.contains(*id))
        .cloned()
        .collect()
}

/// Channels added to and removed from favorites between two states.
pub fn favorites_diff(before: &[String], after: &[String]) -> (Vec<String>, Vec<String>) {
    let before_set: HashSet<&str> = before.iter().map(String::as_str).collect();
    let after_set: HashSet<&str> = after.iter().map(String::as_str).collect();
    let added = after
        .iter()
        .filter(|id| !before_set.contains(id.as_str()))
        .cloned()
        .collect();
    let removed = before
        .iter()
        .filter(|id| !after_set.contains(id.as_str()))
        .cloned()
        .collect();
    (added, removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::SidebarCategorySorting;
    use pretty_assertions::assert_eq;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn custom(id: &str, name: &str, channels: &[&str]) -> SidebarCategoryWithChannels {
        SidebarCategoryWithChannels {
            category: SidebarCategory {
                id: id.into(),
                user_id: "u1".into(),
                team_id: "t1".into(),
                category_type: SidebarCategoryType::Custom,
                display_name: name.into(),
                ..Default::default()
            },
            channel_ids: ids(channels),
        }
    }

    #[test]
    fn test_initial_categories_order() {
        let cats = initial_categories("u1", "t1");
        let orders: Vec<i64> = cats.iter().map(|c| c.sort_order).collect();
        assert_eq!(orders, vec![0, 10, 20]);
        assert_eq!(cats[0].id, "favorites_u1_t1");
        assert_eq!(cats[2].display_name, "Direct Messages");
    }

    #[test]
    fn test_new_category_goes_after_favorites() {
        let cats = initial_categories("u1", "t1");
        assert_eq!(new_category_position(&cats), 1);

        let mut moved = cats.clone();
        moved.swap(0, 1);
        assert_eq!(new_category_position(&moved), 0);
    }

    #[test]
    fn test_renumber() {
        assert_eq!(
            renumber(&ids(&["a", "b", "c"])),
            vec![("a".to_string(), 0), ("b".to_string(), 10), ("c".to_string(), 20)]
        );
    }

    #[test]
    fn test_merge_orphans_appends_unlisted() {
        assert_eq!(
            merge_orphans(&ids(&["c3"]), &ids(&["c2", "c3", "c1"])),
            ids(&["c3", "c2", "c1"])
        );
    }

    #[test]
    fn test_same_category_set() {
        let current = ids(&["a", "b", "c"]);
        assert!(is_same_category_set(&current, &ids(&["c", "a", "b"])));
        assert!(!is_same_category_set(&current, &ids(&["a", "b"])));
        assert!(!is_same_category_set(&current, &ids(&["a", "b", "d"])));
        assert!(!is_same_category_set(&current, &ids(&["a", "a", "b"])));
    }

    #[test]
    fn test_apply_update_ignores_read_only_fields() {
        let original = SidebarCategoryWithChannels {
            category: SidebarCategory::built_in(SidebarCategoryType::Channels, "u1", "t1", 10),
            channel_ids: ids(&["c1"]),
        };
        let mut update = custom("other", "Renamed", &["c2", "c2", "c1"]);
        update.category.user_id = "u2".into();
        update.category.muted = true;
        update.category.sorting = SidebarCategorySorting::Alphabetical;

        let next = apply_update(&original, &update);
        assert_eq!(next.category.id, "channels_u1_t1");
        assert_eq!(next.category.user_id, "u1");
        assert_eq!(next.category.category_type, SidebarCategoryType::Channels);
        assert_eq!(next.category.display_name, "Channels");
        assert!(next.category.muted);
        assert_eq!(next.category.sorting, SidebarCategorySorting::Alphabetical);
        assert_eq!(next.channel_ids, ids(&["c2", "c1"]));
    }

    #[test]
    fn test_apply_update_renames_custom() {
        let original = custom("x", "Old", &[]);
        let next = apply_update(&original, &custom("x", "New", &["c9"]));
        assert_eq!(next.category.display_name, "New");
        assert_eq!(next.channel_ids, ids(&["c9"]));
    }

    #[test]
    fn test_retain_known_channels() {
        let known: HashSet<String> = ids(&["dm1", "gm1"]).into_iter().collect();
        assert_eq!(
            retain_known_channels(&ids(&["dm1", "bogus", "gm1"]), &known),
            ids(&["dm1", "gm1"])
        );
    }

    #[test]
    fn test_favorites_diff() {
        let (added, removed) = favorites_diff(&ids(&["a", "b"]), &ids(&["b", "c"]));
        assert_eq!(added, ids(&["c"]));
        assert_eq!(removed, ids(&["a"]));
    }
}
