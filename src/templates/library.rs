use super::defaults::{default_templates, is_default_id};
use super::{PromptTemplate, TemplateError, TemplateStore};
use chrono::Utc;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// Partial update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct TemplateUpdate {
    pub name: Option<String>,
    pub content: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
}

/// Import record; only name and content are required.
#[derive(Debug, Deserialize)]
struct ImportedTemplate {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

/// Bucket for templates without a category in [`TemplateStats`]
pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateStats {
    pub total: usize,
    pub default: usize,
    pub custom: usize,
    pub by_category: BTreeMap<String, usize>,
}

/// Built-in templates plus user templates, optionally backed by a JSON file
/// that holds the user templates only.
#[derive(Debug, Clone)]
pub struct TemplateLibrary {
    templates: Vec<PromptTemplate>,
    path: Option<PathBuf>,
}

impl TemplateLibrary {
    pub fn new() -> Self {
        Self {
            templates: default_templates(),
            path: None,
        }
    }

    /// Built-ins plus the user templates stored at `path`. A missing file is
    /// not an error; it is created on the first [`save`](Self::save).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TemplateError> {
        let path = path.as_ref().to_path_buf();
        let mut library = Self {
            templates: default_templates(),
            path: Some(path.clone()),
        };

        if path.exists() {
            let content = fs::read_to_string(&path)?;
            let custom: Vec<PromptTemplate> = serde_json::from_str(&content)?;
            info!("Loaded {} user templates from {:?}", custom.len(), path);
            library.templates.extend(
                custom
                    .into_iter()
                    .filter(|t| !is_default_id(&t.id))
                    .map(|t| PromptTemplate {
                        is_default: false,
                        ..t
                    }),
            );
        } else {
            debug!("Template file {:?} does not exist yet", path);
        }
        Ok(library)
    }

    pub fn save(&self) -> Result<(), TemplateError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let custom: Vec<&PromptTemplate> = self.custom_templates().collect();
        fs::write(path, serde_json::to_string_pretty(&custom)?)?;
        Ok(())
    }

    pub fn custom_templates(&self) -> impl Iterator<Item = &PromptTemplate> {
        self.templates.iter().filter(|t| !t.is_default)
    }

    pub fn find(&self, id: &str) -> Option<&PromptTemplate> {
        self.templates.iter().find(|t| t.id == id)
    }

    fn find_mut(&mut self, id: &str) -> Result<&mut PromptTemplate, TemplateError> {
        self.templates
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| TemplateError::NotFound(id.to_string()))
    }

    pub fn add(
        &mut self,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<PromptTemplate, TemplateError> {
        let name = name.into();
        let content = content.into();
        if name.trim().is_empty() || content.trim().is_empty() {
            return Err(TemplateError::InvalidFormat(
                "name and content are required".to_string(),
            ));
        }

        let now = Utc::now();
        let template = PromptTemplate {
            id: Uuid::new_v4().to_string(),
            name,
            content,
            is_default: false,
            created_at: now,
            updated_at: now,
            description: None,
            category: None,
        };
        self.templates.push(template.clone());
        Ok(template)
    }

    pub fn update(&mut self, id: &str, update: TemplateUpdate) -> Result<PromptTemplate, TemplateError> {
        let template = self.find_mut(id)?;
        if template.is_default && update.content.is_some() {
            return Err(TemplateError::DefaultImmutable(id.to_string()));
        }

        if let Some(name) = update.name {
            template.name = name;
        }
        if let Some(content) = update.content {
            template.content = content;
        }
        if update.description.is_some() {
            template.description = update.description;
        }
        if update.category.is_some() {
            template.category = update.category;
        }
        template.updated_at = Utc::now();
        Ok(template.clone())
    }

    pub fn delete(&mut self, id: &str) -> Result<(), TemplateError> {
        let template = self.find_mut(id)?;
        if template.is_default {
            return Err(TemplateError::DefaultImmutable(id.to_string()));
        }
        self.templates.retain(|t| t.id != id);
        Ok(())
    }

    /// Copy any template, built-ins included, as an editable user template.
    pub fn duplicate(&mut self, id: &str) -> Result<PromptTemplate, TemplateError> {
        let original = self
            .find(id)
            .ok_or_else(|| TemplateError::NotFound(id.to_string()))?;
        let now = Utc::now();
        let copy = PromptTemplate {
            id: Uuid::new_v4().to_string(),
            name: format!("{} (copy)", original.name),
            is_default: false,
            created_at: now,
            updated_at: now,
            ..original.clone()
        };
        self.templates.push(copy.clone());
        Ok(copy)
    }

    pub fn search(&self, query: &str) -> Vec<&PromptTemplate> {
        let query = query.to_lowercase();
        self.templates
            .iter()
            .filter(|t| {
                t.name.to_lowercase().contains(&query)
                    || t.content.to_lowercase().contains(&query)
                    || t.description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&query))
            })
            .collect()
    }

    /// Distinct categories in use, sorted.
    pub fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = self
            .templates
            .iter()
            .filter_map(|t| t.category.clone())
            .collect();
        categories.sort();
        categories.dedup();
        categories
    }

    pub fn by_category(&self, category: &str) -> Vec<&PromptTemplate> {
        self.templates
            .iter()
            .filter(|t| t.category.as_deref() == Some(category))
            .collect()
    }

    pub fn stats(&self) -> TemplateStats {
        let mut stats = TemplateStats {
            total: self.templates.len(),
            ..Default::default()
        };
        for template in &self.templates {
            if template.is_default {
                stats.default += 1;
            } else {
                stats.custom += 1;
            }
            let category = template.category.as_deref().unwrap_or(UNCATEGORIZED);
            *stats.by_category.entry(category.to_string()).or_default() += 1;
        }
        stats
    }

    /// Drop every user template and restore the built-ins, renames
    /// included. Persists when the library is file-backed.
    pub fn reset_to_defaults(&mut self) -> Result<(), TemplateError> {
        let dropped = self.custom_templates().count();
        self.templates = default_templates();
        self.save()?;
        info!("Reset templates to defaults, dropped {} user templates", dropped);
        Ok(())
    }

    pub fn export_json(&self) -> Result<String, TemplateError> {
        Ok(serde_json::to_string_pretty(&self.templates)?)
    }

    /// Import templates from a JSON array. Imported templates are never
    /// built-ins; ids that collide with existing ones are regenerated. With
    /// `replace`, existing user templates are dropped first.
    pub fn import_json(&mut self, json: &str, replace: bool) -> Result<usize, TemplateError> {
        let imported: Vec<ImportedTemplate> = serde_json::from_str(json)
            .map_err(|e| TemplateError::InvalidFormat(format!("expected an array of templates: {}", e)))?;

        if imported
            .iter()
            .any(|t| t.name.trim().is_empty() || t.content.trim().is_empty())
        {
            return Err(TemplateError::InvalidFormat(
                "every template needs a name and content".to_string(),
            ));
        }

        if replace {
            self.templates.retain(|t| t.is_default);
        }

        let now = Utc::now();
        let count = imported.len();
        for item in imported {
            let id = item
                .id
                .filter(|id| !id.is_empty() && self.find(id).is_none())
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            self.templates.push(PromptTemplate {
                id,
                name: item.name,
                content: item.content,
                is_default: false,
                created_at: now,
                updated_at: now,
                description: item.description,
                category: item.category,
            });
        }
        Ok(count)
    }
}

impl Default for TemplateLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateStore for TemplateLibrary {
    fn get(&self, id: &str) -> Option<PromptTemplate> {
        self.find(id).cloned()
    }

    fn list(&self) -> Vec<PromptTemplate> {
        self.templates.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_present() {
        let library = TemplateLibrary::new();
        let all = library.list();
        assert_eq!(all.len(), 6);
        assert!(all.iter().all(|t| t.is_default));
        assert!(library.get("summary").is_some());
    }

    #[test]
    fn test_default_content_is_immutable() {
        let mut library = TemplateLibrary::new();

        let err = library
            .update(
                "summary",
                TemplateUpdate {
                    content: Some("new".to_string()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, TemplateError::DefaultImmutable(_)));

        let renamed = library
            .update(
                "summary",
                TemplateUpdate {
                    name: Some("Short summary".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(renamed.name, "Short summary");

        assert!(matches!(
            library.delete("summary"),
            Err(TemplateError::DefaultImmutable(_))
        ));
    }

    #[test]
    fn test_custom_template_lifecycle() {
        let mut library = TemplateLibrary::new();
        let created = library.add("Datasets", "List the datasets used.").unwrap();
        assert!(!created.is_default);

        library
            .update(
                &created.id,
                TemplateUpdate {
                    content: Some("List every dataset.".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(library.get(&created.id).unwrap().content, "List every dataset.");

        let copy = library.duplicate("methodology").unwrap();
        assert_eq!(copy.name, "Research methods (copy)");
        assert!(!copy.is_default);

        library.delete(&created.id).unwrap();
        assert!(library.get(&created.id).is_none());
        assert!(matches!(library.delete("missing"), Err(TemplateError::NotFound(_))));
        assert!(library.add(" ", "x").is_err());
    }

    #[test]
    fn test_import_never_creates_defaults() {
        let mut library = TemplateLibrary::new();
        let json = r#"[
            {"id": "summary", "name": "Mine", "content": "Custom summary", "is_default": true},
            {"name": "Other", "content": "Other content"}
        ]"#;

        assert_eq!(library.import_json(json, false).unwrap(), 2);
        assert_eq!(library.custom_templates().count(), 2);
        // built-in content untouched, colliding id regenerated
        assert!(library.get("summary").unwrap().is_default);

        assert!(library.import_json(r#"{"name": "x"}"#, false).is_err());
        assert!(library.import_json(r#"[{"name": "x"}]"#, false).is_err());

        library.import_json(r#"[{"name": "Only", "content": "c"}]"#, true).unwrap();
        assert_eq!(library.custom_templates().count(), 1);
    }

    #[test]
    fn test_save_and_load_user_templates() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("templates.json");

        let mut library = TemplateLibrary::load(&path).unwrap();
        let created = library.add("Figures", "Describe each figure.").unwrap();
        library.save().unwrap();

        let reloaded = TemplateLibrary::load(&path).unwrap();
        assert_eq!(reloaded.list().len(), 7);
        assert_eq!(reloaded.get(&created.id).unwrap().name, "Figures");
        assert_eq!(reloaded.search("figure").len(), 1);
    }

    #[test]
    fn test_categories_and_stats() {
        let mut library = TemplateLibrary::new();
        let builtin_categories = library.categories();
        assert!(!builtin_categories.is_empty());

        let custom = library.add("Datasets", "List the datasets used.").unwrap();
        library
            .update(
                &custom.id,
                TemplateUpdate {
                    category: Some("Data".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        library.add("Scratch", "Anything goes.").unwrap();

        assert!(library.categories().contains(&"Data".to_string()));
        let data = library.by_category("Data");
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].name, "Datasets");
        assert!(library.by_category("nothing here").is_empty());

        let stats = library.stats();
        assert_eq!(stats.total, 8);
        assert_eq!(stats.default, 6);
        assert_eq!(stats.custom, 2);
        assert_eq!(stats.by_category.get("Data"), Some(&1));
        assert_eq!(stats.by_category.get(UNCATEGORIZED), Some(&1));
        assert_eq!(stats.by_category.values().sum::<usize>(), stats.total);
    }

    #[test]
    fn test_reset_to_defaults_persists() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("templates.json");

        let mut library = TemplateLibrary::load(&path).unwrap();
        library.add("Figures", "Describe each figure.").unwrap();
        library
            .update(
                "summary",
                TemplateUpdate {
                    name: Some("Renamed".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        library.save().unwrap();

        library.reset_to_defaults().unwrap();
        let names: Vec<(String, String)> = library.list().into_iter().map(|t| (t.id, t.name)).collect();
        let defaults: Vec<(String, String)> = default_templates().into_iter().map(|t| (t.id, t.name)).collect();
        assert_eq!(names, defaults);

        let reloaded = TemplateLibrary::load(&path).unwrap();
        assert_eq!(reloaded.custom_templates().count(), 0);
        assert_eq!(reloaded.stats().total, 6);
    }
}
