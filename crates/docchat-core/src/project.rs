use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{AttachedDocument, CoreError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProjectState {
    #[default]
    Draft,
    Published,
    Archived,
}

impl ProjectState {
    pub const ALL: &[ProjectState] = &[
        ProjectState::Draft,
        ProjectState::Published,
        ProjectState::Archived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectState::Draft => "DRAFT",
            ProjectState::Published => "PUBLISHED",
            ProjectState::Archived => "ARCHIVED",
        }
    }
}

impl fmt::Display for ProjectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ProjectState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(ProjectState::Draft),
            "PUBLISHED" => Ok(ProjectState::Published),
            "ARCHIVED" => Ok(ProjectState::Archived),
            _ => Err(CoreError::InvalidInput(format!("unknown project state: {s}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_type: Option<String>,
    #[serde(default)]
    pub state: ProjectState,
    #[serde(default)]
    pub documents: Vec<AttachedDocument>,
}

impl Project {
    /// Merge the `Some` fields of `update` into this record. Timestamps
    /// are left to the caller.
    pub fn apply(&mut self, update: &UpdateProject) {
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(description) = &update.description {
            self.description = Some(description.clone());
        }
        if let Some(access_type) = &update.access_type {
            self.access_type = Some(access_type.clone());
        }
        if let Some(state) = update.state {
            self.state = state;
        }
    }

    pub fn document(&self, document_id: &str) -> Option<&AttachedDocument> {
        self.documents.iter().find(|d| d.id == document_id)
    }
}

/// Accept an id written either as a JSON string or as a number.
pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }
    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProject {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ProjectState>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Project {
        let now = Utc::now();
        Project {
            id: "p1".into(),
            name: "Foo".into(),
            description: Some("first".into()),
            created_at: now,
            updated_at: now,
            access_type: None,
            state: ProjectState::Draft,
            documents: vec![],
        }
    }

    #[test]
    fn apply_merges_only_present_fields() {
        let mut project = sample();
        project.apply(&UpdateProject {
            name: Some("Bar".into()),
            ..Default::default()
        });
        assert_eq!(project.name, "Bar");
        assert_eq!(project.description.as_deref(), Some("first"));
        assert_eq!(project.state, ProjectState::Draft);

        project.apply(&UpdateProject {
            state: Some(ProjectState::Published),
            access_type: Some("internal".into()),
            ..Default::default()
        });
        assert_eq!(project.name, "Bar");
        assert_eq!(project.state, ProjectState::Published);
        assert_eq!(project.access_type.as_deref(), Some("internal"));
    }

    #[test]
    fn legacy_records_without_state_or_documents_load() {
        let raw = r#"{"id":"abc","name":"Old","createdAt":"2024-01-02T03:04:05.000Z",
            "updatedAt":"2024-01-02T03:04:05.000Z"}"#;
        let project: Project = serde_json::from_str(raw).unwrap();
        assert_eq!(project.state, ProjectState::Draft);
        assert!(project.documents.is_empty());
        assert!(project.description.is_none());
        assert_eq!(project.created_at, project.updated_at);
    }

    #[test]
    fn numeric_ids_load_as_text() {
        let raw = r#"[{"id":7,"name":"Legacy","createdAt":"2024-01-02T03:04:05.000Z",
            "updatedAt":"2024-01-02T03:04:05.000Z"},
            {"id":"b2","name":"Current","createdAt":"2024-01-02T03:04:05.000Z",
            "updatedAt":"2024-01-02T03:04:05.000Z"}]"#;
        let projects: Vec<Project> = serde_json::from_str(raw).unwrap();
        assert_eq!(projects[0].id, "7");
        assert_eq!(projects[1].id, "b2");
        let json = serde_json::to_value(&projects[0]).unwrap();
        assert_eq!(json["id"], "7");
    }

    #[test]
    fn state_serializes_upper_case() {
        let json = serde_json::to_value(ProjectState::Archived).unwrap();
        assert_eq!(json, "ARCHIVED");
        assert_eq!("published".parse::<ProjectState>().unwrap(), ProjectState::Published);
        assert!("deleted".parse::<ProjectState>().is_err());
        for state in ProjectState::ALL {
            assert_eq!(state.to_string().parse::<ProjectState>().unwrap(), *state);
        }
    }
}
