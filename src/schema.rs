//! Row and node types for the project navigator.
//!
//! A [`Row`] is one denormalized record from the tree read-model. A [`Node`]
//! is one element of the reconstructed forest, tagged by hierarchy level.

use serde::{Deserialize, Serialize};

/// Id of the synthetic manager bucket holding projects without a manager.
pub const NO_MANAGER_ID: &str = "__no_manager__";
/// Id of the synthetic client bucket holding projects without a client.
pub const NO_CLIENT_ID: &str = "__no_client__";

pub const NO_MANAGER_NAME: &str = "No manager";
pub const NO_CLIENT_NAME: &str = "No client";

/// One record of the tree read-model: a project × stage × object × section
/// combination carrying every ancestor's attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    #[serde(default)]
    pub manager_id: Option<String>,
    #[serde(default)]
    pub manager_name: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub project_status: Option<String>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub is_favorite: bool,
    #[serde(default)]
    pub stage_id: Option<String>,
    #[serde(default)]
    pub stage_name: Option<String>,
    #[serde(default)]
    pub object_id: Option<String>,
    #[serde(default)]
    pub object_name: Option<String>,
    #[serde(default)]
    pub section_id: Option<String>,
    #[serde(default)]
    pub section_name: Option<String>,
    #[serde(default)]
    pub section_start_date: Option<String>, // YYYY-MM-DD
    #[serde(default)]
    pub section_end_date: Option<String>, // YYYY-MM-DD
    #[serde(default)]
    pub responsible_name: Option<String>,
    #[serde(default)]
    pub status_id: Option<String>,
    #[serde(default)]
    pub status_name: Option<String>,
    #[serde(default)]
    pub status_color: Option<String>,
    #[serde(default)]
    pub department_name: Option<String>,
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

/// Top-level tree shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupingMode {
    Flat,
    ByManager,
    ByClient,
}

/// Hierarchy level of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Client,
    Manager,
    Project,
    Stage,
    Object,
    Section,
}

/// A node of the navigator forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    Client(GroupNode),
    Manager(GroupNode),
    Project(ProjectNode),
    Stage(StageNode),
    Object(ObjectNode),
    Section(SectionNode),
}

/// Client or manager bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupNode {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectNode {
    pub id: String,
    pub name: String,
    pub manager_id: Option<String>,
    pub client_id: Option<String>,
    pub project_status: Option<String>,
    pub is_favorite: bool,
    #[serde(default)]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageNode {
    pub id: String,
    pub name: String,
    pub project_id: String,
    #[serde(default)]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectNode {
    pub id: String,
    pub name: String,
    pub stage_id: String,
    #[serde(default)]
    pub children: Vec<Node>,
}

/// Leaf node. Carries the cached display fields patched in place by
/// status commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionNode {
    pub id: String,
    pub name: String,
    pub object_id: String,
    pub project_id: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub responsible_name: Option<String>,
    pub status_id: Option<String>,
    pub status_name: Option<String>,
    pub status_color: Option<String>,
    pub department_name: Option<String>,
    pub project_name: Option<String>,
    pub stage_name: Option<String>,
}

impl Node {
    pub fn id(&self) -> &str {
        match self {
            Node::Client(n) | Node::Manager(n) => &n.id,
            Node::Project(n) => &n.id,
            Node::Stage(n) => &n.id,
            Node::Object(n) => &n.id,
            Node::Section(n) => &n.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Node::Client(n) | Node::Manager(n) => &n.name,
            Node::Project(n) => &n.name,
            Node::Stage(n) => &n.name,
            Node::Object(n) => &n.name,
            Node::Section(n) => &n.name,
        }
    }

    #[cfg(test)]
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Client(_) => NodeKind::Client,
            Node::Manager(_) => NodeKind::Manager,
            Node::Project(_) => NodeKind::Project,
            Node::Stage(_) => NodeKind::Stage,
            Node::Object(_) => NodeKind::Object,
            Node::Section(_) => NodeKind::Section,
        }
    }

    /// Children of a non-leaf node; sections always return an empty slice.
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Client(n) | Node::Manager(n) => &n.children,
            Node::Project(n) => &n.children,
            Node::Stage(n) => &n.children,
            Node::Object(n) => &n.children,
            Node::Section(_) => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::Client(n) | Node::Manager(n) => Some(&mut n.children),
            Node::Project(n) => Some(&mut n.children),
            Node::Stage(n) => Some(&mut n.children),
            Node::Object(n) => Some(&mut n.children),
            Node::Section(_) => None,
        }
    }

    pub fn has_children(&self) -> bool {
        !self.children().is_empty()
    }

    /// True for the "no manager" / "no client" buckets.
    pub fn is_sentinel(&self) -> bool {
        match self {
            Node::Manager(n) => n.id == NO_MANAGER_ID,
            Node::Client(n) => n.id == NO_CLIENT_ID,
            _ => false,
        }
    }

    /// Clone of this node with `children` in place of its own.
    pub fn with_children(&self, children: Vec<Node>) -> Node {
        let mut node = self.clone_shallow();
        if let Some(slot) = node.children_mut() {
            *slot = children;
        }
        node
    }

    /// Clone without descendants.
    pub fn clone_shallow(&self) -> Node {
        match self {
            Node::Client(n) => Node::Client(GroupNode {
                id: n.id.clone(),
                name: n.name.clone(),
                children: Vec::new(),
            }),
            Node::Manager(n) => Node::Manager(GroupNode {
                id: n.id.clone(),
                name: n.name.clone(),
                children: Vec::new(),
            }),
            Node::Project(n) => Node::Project(n.clone_fields()),
            Node::Stage(n) => Node::Stage(StageNode {
                id: n.id.clone(),
                name: n.name.clone(),
                project_id: n.project_id.clone(),
                children: Vec::new(),
            }),
            Node::Object(n) => Node::Object(ObjectNode {
                id: n.id.clone(),
                name: n.name.clone(),
                stage_id: n.stage_id.clone(),
                children: Vec::new(),
            }),
            Node::Section(n) => Node::Section(n.clone()),
        }
    }
}

impl ProjectNode {
    fn clone_fields(&self) -> ProjectNode {
        ProjectNode {
            id: self.id.clone(),
            name: self.name.clone(),
            manager_id: self.manager_id.clone(),
            client_id: self.client_id.clone(),
            project_status: self.project_status.clone(),
            is_favorite: self.is_favorite,
            children: Vec::new(),
        }
    }
}

/// Recursively find a node by id.
pub fn find_node<'a>(nodes: &'a [Node], id: &str) -> Option<&'a Node> {
    for node in nodes {
        if node.id() == id {
            return Some(node);
        }
        if let Some(found) = find_node(node.children(), id) {
            return Some(found);
        }
    }
    None
}

/// Depth-first visit of every node, parents before children.
pub fn walk_mut(nodes: &mut [Node], visit: &mut dyn FnMut(&mut Node)) {
    for node in nodes.iter_mut() {
        visit(node);
        if let Some(children) = node.children_mut() {
            walk_mut(children, visit);
        }
    }
}

/// Depth-first visit of every node, parents before children.
pub fn walk(nodes: &[Node], visit: &mut dyn FnMut(&Node)) {
    for node in nodes {
        visit(node);
        walk(node.children(), visit);
    }
}
