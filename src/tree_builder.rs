//! Reconstruct the navigator forest from flat tree rows.
//!
//! Single pass over the rows with one id→node map per level, then a linking
//! pass that attaches objects to stages, stages to projects, and projects to
//! their grouping bucket.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::schema::{
    GroupNode, GroupingMode, Node, ObjectNode, ProjectNode, Row, SectionNode, StageNode,
    NO_CLIENT_ID, NO_CLIENT_NAME, NO_MANAGER_ID, NO_MANAGER_NAME,
};

/// Insertion-ordered id→node map for one level.
struct Level<T> {
    order: Vec<String>,
    items: HashMap<String, T>,
}

impl<T> Level<T> {
    fn new() -> Self {
        Self {
            order: Vec::new(),
            items: HashMap::new(),
        }
    }

    fn upsert(&mut self, id: &str, make: impl FnOnce() -> T) -> &mut T {
        if !self.items.contains_key(id) {
            self.order.push(id.to_string());
        }
        self.items.entry(id.to_string()).or_insert_with(make)
    }

    fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    fn into_ordered(mut self) -> Vec<T> {
        self.order
            .iter()
            .filter_map(|id| self.items.remove(id))
            .collect()
    }
}

/// Build the forest for `mode`.
///
/// Every entity id appears once at its level and every section once under
/// the object named by its row. Rows referencing a missing parent are dropped.
pub fn build_forest(rows: &[Row], mode: GroupingMode) -> Vec<Node> {
    let mut clients: Level<GroupNode> = Level::new();
    let mut managers: Level<GroupNode> = Level::new();
    let mut projects: Level<ProjectNode> = Level::new();
    let mut stages: Level<StageNode> = Level::new();
    let mut objects: Level<ObjectNode> = Level::new();
    let mut sections_by_object: HashMap<String, Vec<Node>> = HashMap::new();
    let mut seen_sections: HashSet<String> = HashSet::new();
    let mut dropped = 0usize;

    for row in rows {
        let Some(project_id) = row.project_id.as_deref() else {
            dropped += 1;
            continue;
        };

        if mode == GroupingMode::ByClient {
            if let Some(client_id) = row.client_id.as_deref() {
                clients.upsert(client_id, || GroupNode {
                    id: client_id.to_string(),
                    name: row.client_name.clone().unwrap_or_default(),
                    children: Vec::new(),
                });
            }
        }

        if let Some(manager_id) = row.manager_id.as_deref() {
            managers.upsert(manager_id, || GroupNode {
                id: manager_id.to_string(),
                name: row.manager_name.clone().unwrap_or_default(),
                children: Vec::new(),
            });
        }

        let project = projects.upsert(project_id, || ProjectNode {
            id: project_id.to_string(),
            name: row.project_name.clone().unwrap_or_default(),
            manager_id: row.manager_id.clone(),
            client_id: row.client_id.clone(),
            project_status: row.project_status.clone(),
            is_favorite: false,
            children: Vec::new(),
        });
        // A later row without the flag never downgrades a favorite.
        project.is_favorite |= row.is_favorite;

        let Some(stage_id) = row.stage_id.as_deref() else {
            continue;
        };
        stages.upsert(stage_id, || StageNode {
            id: stage_id.to_string(),
            name: row.stage_name.clone().unwrap_or_default(),
            project_id: project_id.to_string(),
            children: Vec::new(),
        });

        let Some(object_id) = row.object_id.as_deref() else {
            if row.section_id.is_some() {
                dropped += 1;
            }
            continue;
        };
        objects.upsert(object_id, || ObjectNode {
            id: object_id.to_string(),
            name: row.object_name.clone().unwrap_or_default(),
            stage_id: stage_id.to_string(),
            children: Vec::new(),
        });

        if let Some(section_id) = row.section_id.as_deref() {
            if seen_sections.insert(section_id.to_string()) {
                sections_by_object
                    .entry(object_id.to_string())
                    .or_default()
                    .push(Node::Section(section_from_row(section_id, object_id, project_id, row)));
            }
        }
    }

    // objects → stages
    let mut objects_by_stage: HashMap<String, Vec<Node>> = HashMap::new();
    for mut object in objects.into_ordered() {
        object.children = sections_by_object.remove(&object.id).unwrap_or_default();
        if stages.contains(&object.stage_id) {
            objects_by_stage
                .entry(object.stage_id.clone())
                .or_default()
                .push(Node::Object(object));
        } else {
            dropped += 1;
        }
    }

    // stages → projects
    let mut stages_by_project: HashMap<String, Vec<Node>> = HashMap::new();
    for mut stage in stages.into_ordered() {
        stage.children = objects_by_stage.remove(&stage.id).unwrap_or_default();
        if projects.contains(&stage.project_id) {
            stages_by_project
                .entry(stage.project_id.clone())
                .or_default()
                .push(Node::Stage(stage));
        } else {
            dropped += 1;
        }
    }

    let projects: Vec<ProjectNode> = projects
        .into_ordered()
        .into_iter()
        .map(|mut project| {
            project.children = stages_by_project.remove(&project.id).unwrap_or_default();
            project
        })
        .collect();

    if dropped > 0 {
        debug!("Tree builder dropped {} rows with missing parents", dropped);
    }

    match mode {
        GroupingMode::Flat => projects.into_iter().map(Node::Project).collect(),
        GroupingMode::ByManager => group_projects(
            projects,
            managers,
            |p| p.manager_id.as_deref(),
            Bucket::Prepend(NO_MANAGER_ID, NO_MANAGER_NAME),
            Node::Manager,
        ),
        GroupingMode::ByClient => group_projects(
            projects,
            clients,
            |p| p.client_id.as_deref(),
            Bucket::Append(NO_CLIENT_ID, NO_CLIENT_NAME),
            Node::Client,
        ),
    }
}

/// Where the sentinel bucket goes among the roots.
enum Bucket {
    Prepend(&'static str, &'static str),
    Append(&'static str, &'static str),
}

fn group_projects(
    projects: Vec<ProjectNode>,
    mut groups: Level<GroupNode>,
    key: impl Fn(&ProjectNode) -> Option<&str>,
    bucket: Bucket,
    wrap: fn(GroupNode) -> Node,
) -> Vec<Node> {
    let mut orphans = Vec::new();
    for project in projects {
        match key(&project).and_then(|id| groups.items.get_mut(id)) {
            Some(group) => group.children.push(Node::Project(project)),
            None => orphans.push(Node::Project(project)),
        }
    }

    let mut roots: Vec<Node> = groups
        .into_ordered()
        .into_iter()
        .filter(|g| !g.children.is_empty())
        .map(wrap)
        .collect();

    if orphans.is_empty() {
        return roots;
    }
    let sentinel = |id: &str, name: &str| {
        wrap(GroupNode {
            id: id.to_string(),
            name: name.to_string(),
            children: orphans,
        })
    };
    match bucket {
        Bucket::Prepend(id, name) => roots.insert(0, sentinel(id, name)),
        Bucket::Append(id, name) => roots.push(sentinel(id, name)),
    }
    roots
}

fn section_from_row(id: &str, object_id: &str, project_id: &str, row: &Row) -> SectionNode {
    SectionNode {
        id: id.to_string(),
        name: row.section_name.clone().unwrap_or_default(),
        object_id: object_id.to_string(),
        project_id: project_id.to_string(),
        start_date: row.section_start_date.clone(),
        end_date: row.section_end_date.clone(),
        responsible_name: row.responsible_name.clone(),
        status_id: row.status_id.clone(),
        status_name: row.status_name.clone(),
        status_color: row.status_color.clone(),
        department_name: row.department_name.clone(),
        project_name: row.project_name.clone(),
        stage_name: row.stage_name.clone(),
    }
}
