//! Layered filter pipeline over the sorted forest.
//!
//! Stages run in a fixed order: status, sections-only, favorites-only, text
//! search. Each stage is bottom-up: a parent survives if it matches directly
//! or keeps at least one child. Disabled stages pass the forest through.

use std::collections::{BTreeSet, HashSet};

use crate::criteria::FilterCriteria;
use crate::schema::{walk, Node};

/// Run the whole pipeline. The input forest is left untouched.
pub fn apply_filters(forest: &[Node], criteria: &FilterCriteria) -> Vec<Node> {
    if criteria.is_empty() {
        return forest.to_vec();
    }

    let favorites = favorite_projects(forest);

    let mut nodes = filter_by_status(forest, &criteria.status_ids);
    if criteria.only_sections {
        nodes = flatten_sections(&nodes);
    }
    if criteria.only_favorites {
        nodes = keep_favorites(&nodes, &favorites);
    }
    search(&nodes, &criteria.search_query)
}

/// Keep sections whose status is selected. Empty selection is a no-op.
pub fn filter_by_status(nodes: &[Node], status_ids: &BTreeSet<String>) -> Vec<Node> {
    if status_ids.is_empty() {
        return nodes.to_vec();
    }
    nodes
        .iter()
        .filter_map(|node| match node {
            Node::Section(section) => section
                .status_id
                .as_ref()
                .filter(|id| status_ids.contains(*id))
                .map(|_| node.clone()),
            _ => {
                let children = filter_by_status(node.children(), status_ids);
                (!children.is_empty()).then(|| node.with_children(children))
            }
        })
        .collect()
}

/// Every section of the forest as one flat list, in traversal order.
pub fn flatten_sections(nodes: &[Node]) -> Vec<Node> {
    let mut sections = Vec::new();
    walk(nodes, &mut |node| {
        if matches!(node, Node::Section(_)) {
            sections.push(node.clone());
        }
    });
    sections
}

/// Keep favorite project subtrees whole, plus the ancestors leading to them.
/// Loose sections (after flattening) survive when their project is a favorite.
pub fn keep_favorites(nodes: &[Node], favorites: &HashSet<String>) -> Vec<Node> {
    nodes
        .iter()
        .filter_map(|node| match node {
            Node::Project(project) => project.is_favorite.then(|| node.clone()),
            Node::Section(section) => favorites
                .contains(&section.project_id)
                .then(|| node.clone()),
            _ => {
                let children = keep_favorites(node.children(), favorites);
                (!children.is_empty()).then(|| node.with_children(children))
            }
        })
        .collect()
}

/// Case-insensitive substring search. A directly matching node is kept with
/// its children as they are; otherwise it survives only through matching
/// descendants.
pub fn search(nodes: &[Node], query: &str) -> Vec<Node> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return nodes.to_vec();
    }
    search_lowered(nodes, &needle)
}

fn search_lowered(nodes: &[Node], needle: &str) -> Vec<Node> {
    nodes
        .iter()
        .filter_map(|node| {
            if matches_text(node, needle) {
                return Some(node.clone());
            }
            let children = search_lowered(node.children(), needle);
            (!children.is_empty()).then(|| node.with_children(children))
        })
        .collect()
}

fn matches_text(node: &Node, needle: &str) -> bool {
    let hit = |text: &str| text.to_lowercase().contains(needle);
    if hit(node.name()) {
        return true;
    }
    match node {
        Node::Section(section) => [
            &section.responsible_name,
            &section.project_name,
            &section.stage_name,
            &section.department_name,
        ]
        .into_iter()
        .flatten()
        .any(|text| hit(text.as_str())),
        _ => false,
    }
}

fn favorite_projects(nodes: &[Node]) -> HashSet<String> {
    let mut favorites = HashSet::new();
    walk(nodes, &mut |node| {
        if let Node::Project(project) = node {
            if project.is_favorite {
                favorites.insert(project.id.clone());
            }
        }
    });
    favorites
}
