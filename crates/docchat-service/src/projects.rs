use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use docchat_core::document::file_extension;
use docchat_core::project::{CreateProject, UpdateProject};
use docchat_core::{AttachedDocument, Project, ProjectState};
use docchat_store::{document_key, documents_prefix, messages_key, KeyValueStore, PROJECTS_KEY};

use crate::ServiceError;

/// A file to attach to a project.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub name: String,
    pub description: Option<String>,
    pub document_type: String,
    pub data: Bytes,
}

/// The project list, persisted as one JSON array under `PROJECTS_KEY`.
pub struct ProjectService {
    store: Arc<dyn KeyValueStore>,
    projects: Vec<Project>,
}

impl ProjectService {
    /// Read the stored project list. A list that fails to parse is logged
    /// and treated as empty.
    pub async fn open(store: Arc<dyn KeyValueStore>) -> Result<Self, ServiceError> {
        let mut service = Self {
            store,
            projects: Vec::new(),
        };
        service.reload().await?;
        Ok(service)
    }

    pub async fn reload(&mut self) -> Result<(), ServiceError> {
        self.projects = match self.store.get_opt(PROJECTS_KEY).await? {
            Some(raw) => match serde_json::from_slice::<Vec<Project>>(&raw) {
                Ok(projects) => projects,
                Err(e) => {
                    tracing::error!(error = %e, "failed to parse stored projects");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        tracing::debug!(count = self.projects.len(), "loaded projects");
        Ok(())
    }

    pub fn list(&self) -> &[Project] {
        &self.projects
    }

    pub fn get(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub async fn create(&mut self, input: &CreateProject) -> Result<Project, ServiceError> {
        let now = Utc::now();
        let project = Project {
            id: uuid::Uuid::new_v4().to_string(),
            name: input.name.clone(),
            description: input.description.clone(),
            created_at: now,
            updated_at: now,
            access_type: None,
            state: ProjectState::Draft,
            documents: Vec::new(),
        };
        let mut next = self.projects.clone();
        next.push(project.clone());
        self.save(&next).await?;
        self.projects = next;
        tracing::info!(id = %project.id, name = %project.name, "created project");
        Ok(project)
    }

    /// Merge `update` into the matching project and stamp a new
    /// `updated_at`. Returns `None` when no project has this id.
    pub async fn update(
        &mut self,
        id: &str,
        update: &UpdateProject,
    ) -> Result<Option<Project>, ServiceError> {
        let Some(index) = self.projects.iter().position(|p| p.id == id) else {
            return Ok(None);
        };
        let mut next = self.projects.clone();
        let project = &mut next[index];
        project.apply(update);
        project.updated_at = advance(project.updated_at);
        let updated = project.clone();
        self.save(&next).await?;
        self.projects = next;
        Ok(Some(updated))
    }

    pub async fn publish(&mut self, id: &str) -> Result<Option<Project>, ServiceError> {
        self.set_state(id, ProjectState::Published).await
    }

    pub async fn archive(&mut self, id: &str) -> Result<Option<Project>, ServiceError> {
        self.set_state(id, ProjectState::Archived).await
    }

    async fn set_state(
        &mut self,
        id: &str,
        state: ProjectState,
    ) -> Result<Option<Project>, ServiceError> {
        let update = UpdateProject {
            state: Some(state),
            ..Default::default()
        };
        self.update(id, &update).await
    }

    /// Remove a project together with its message history and document
    /// bytes. Unknown ids are a no-op.
    pub async fn delete(&mut self, id: &str) -> Result<(), ServiceError> {
        if self.get(id).is_none() {
            return Ok(());
        }
        let next: Vec<Project> = self.projects.iter().filter(|p| p.id != id).cloned().collect();
        self.save(&next).await?;
        self.projects = next;

        self.store.delete(&messages_key(id)).await?;
        for key in self.store.list(&documents_prefix(id)).await? {
            self.store.delete(&key).await?;
        }
        tracing::info!(id, "deleted project");
        Ok(())
    }

    pub async fn attach_document(
        &mut self,
        project_id: &str,
        doc: NewDocument,
    ) -> Result<AttachedDocument, ServiceError> {
        let filename = storage_filename(&doc.name)?;
        let index = self.index_of(project_id)?;

        let document_id = uuid::Uuid::new_v4().to_string();
        let store_key = document_key(project_id, &document_id, &filename);
        let document = AttachedDocument {
            id: document_id,
            name: doc.name.clone(),
            description: doc.description,
            uploaded_at: Utc::now(),
            document_type: doc.document_type,
            file_extension: file_extension(&doc.name),
            size: doc.data.len() as u64,
            store_key,
        };
        self.store.put(&document.store_key, doc.data).await?;

        let mut next = self.projects.clone();
        let project = &mut next[index];
        project.documents.push(document.clone());
        project.updated_at = advance(project.updated_at);
        if let Err(e) = self.save(&next).await {
            // Drop the bytes of a record that was never saved.
            if let Err(cleanup) = self.store.delete(&document.store_key).await {
                tracing::warn!(key = %document.store_key, error = %cleanup, "failed to remove orphaned document");
            }
            return Err(e);
        }
        self.projects = next;
        tracing::debug!(project_id, document_id = %document.id, size = document.size, "attached document");
        Ok(document)
    }

    pub async fn read_document(
        &self,
        project_id: &str,
        document_id: &str,
    ) -> Result<Bytes, ServiceError> {
        let project = self
            .get(project_id)
            .ok_or_else(|| ServiceError::NotFound(format!("project {project_id}")))?;
        let document = project
            .document(document_id)
            .ok_or_else(|| ServiceError::NotFound(format!("document {document_id}")))?;
        Ok(self.store.get(&document.store_key).await?)
    }

    pub async fn remove_document(
        &mut self,
        project_id: &str,
        document_id: &str,
    ) -> Result<(), ServiceError> {
        let index = self.index_of(project_id)?;
        let mut next = self.projects.clone();
        let project = &mut next[index];
        let Some(pos) = project.documents.iter().position(|d| d.id == document_id) else {
            return Err(ServiceError::NotFound(format!("document {document_id}")));
        };
        let document = project.documents.remove(pos);
        project.updated_at = advance(project.updated_at);
        self.save(&next).await?;
        self.projects = next;
        self.store.delete(&document.store_key).await?;
        Ok(())
    }

    fn index_of(&self, project_id: &str) -> Result<usize, ServiceError> {
        self.projects
            .iter()
            .position(|p| p.id == project_id)
            .ok_or_else(|| ServiceError::NotFound(format!("project {project_id}")))
    }

    /// Persist `projects` as the full list. Callers assign it to `self`
    /// only after this succeeds.
    async fn save(&self, projects: &[Project]) -> Result<(), ServiceError> {
        let json = serde_json::to_vec(projects)?;
        self.store.put(PROJECTS_KEY, Bytes::from(json)).await?;
        tracing::debug!(count = projects.len(), "saved projects");
        Ok(())
    }
}

/// The current time, or one millisecond past `previous` if the clock has
/// not moved beyond it.
fn advance(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::milliseconds(1)
    }
}

fn storage_filename(name: &str) -> Result<String, ServiceError> {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        return Err(ServiceError::InvalidInput(format!(
            "invalid document name: {name:?}"
        )));
    }
    Ok(cleaned)
}
