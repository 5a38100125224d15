//! Row builders shared by unit tests.

use crate::schema::Row;

pub struct RowBuilder(Row);

/// Start a row for project `id` named `name`.
pub fn row(id: &str, name: &str) -> RowBuilder {
    RowBuilder(Row {
        project_id: Some(id.to_string()),
        project_name: Some(name.to_string()),
        ..Default::default()
    })
}

impl RowBuilder {
    pub fn manager(mut self, id: &str, name: &str) -> Self {
        self.0.manager_id = Some(id.to_string());
        self.0.manager_name = Some(name.to_string());
        self
    }

    pub fn client(mut self, id: &str, name: &str) -> Self {
        self.0.client_id = Some(id.to_string());
        self.0.client_name = Some(name.to_string());
        self
    }

    pub fn favorite(mut self) -> Self {
        self.0.is_favorite = true;
        self
    }

    pub fn stage(mut self, id: &str, name: &str) -> Self {
        self.0.stage_id = Some(id.to_string());
        self.0.stage_name = Some(name.to_string());
        self
    }

    pub fn object(mut self, id: &str, name: &str) -> Self {
        self.0.object_id = Some(id.to_string());
        self.0.object_name = Some(name.to_string());
        self
    }

    pub fn section(mut self, id: &str, name: &str) -> Self {
        self.0.section_id = Some(id.to_string());
        self.0.section_name = Some(name.to_string());
        self
    }

    pub fn status(mut self, id: &str, name: &str, color: &str) -> Self {
        self.0.status_id = Some(id.to_string());
        self.0.status_name = Some(name.to_string());
        self.0.status_color = Some(color.to_string());
        self
    }

    pub fn responsible(mut self, name: &str) -> Self {
        self.0.responsible_name = Some(name.to_string());
        self
    }

    pub fn department(mut self, name: &str) -> Self {
        self.0.department_name = Some(name.to_string());
        self
    }

    pub fn build(self) -> Row {
        self.0
    }
}

/// Two managers, two projects, one section per object.
///
/// ```text
/// m1 Alice ─ p1 "Project 10" ─ s1 "Stage 1" ─ o1 "Object A" ─ x1 "Section 2"  (st-plan)
///                                                          └ x2 "Section 10" (st-done)
/// m2 Bob   ─ p2 "Project 2"  ─ s2 "Stage 1" ─ o2 "Object B" ─ x3 "Roof"       (st-plan)
/// ```
pub fn sample_rows() -> Vec<Row> {
    vec![
        row("p1", "Project 10")
            .manager("m1", "Alice")
            .client("c1", "Acme")
            .stage("s1", "Stage 1")
            .object("o1", "Object A")
            .section("x1", "Section 2")
            .status("st-plan", "Plan", "#aaaaaa")
            .responsible("Ivanov")
            .build(),
        row("p1", "Project 10")
            .manager("m1", "Alice")
            .client("c1", "Acme")
            .stage("s1", "Stage 1")
            .object("o1", "Object A")
            .section("x2", "Section 10")
            .status("st-done", "Done", "#00ff00")
            .department("Structural")
            .build(),
        row("p2", "Project 2")
            .manager("m2", "Bob")
            .stage("s2", "Stage 1")
            .object("o2", "Object B")
            .section("x3", "Roof")
            .status("st-plan", "Plan", "#aaaaaa")
            .build(),
    ]
}
