//! Pluggable sources of resource catalog entries and content.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::mcp::resources::models::{
    ReadResourceResult, ResourceContents, ResourceEntry, ResourceTemplate,
};
use crate::utils::error::{McpError, McpResult};

/// Provider of resource catalog entries and content.
///
/// `read` returns `None` for URIs the provider does not own, letting the
/// manager fall through to the next provider in registration order.
#[async_trait]
pub trait ResourceProvider: Send + Sync + std::fmt::Debug {
    /// Lists the resources this provider exposes.
    async fn list(&self) -> McpResult<Vec<ResourceEntry>>;

    /// Reads a resource by URI; `None` when the URI is not this provider's.
    async fn read(&self, uri: &str) -> McpResult<Option<ReadResourceResult>>;

    /// Lists the URI templates this provider exposes.
    async fn templates(&self) -> McpResult<Vec<ResourceTemplate>> {
        Ok(Vec::new())
    }
}

/// Fixed in-memory provider, useful for tests and static catalogs.
#[derive(Debug, Default)]
pub struct StaticProvider {
    entries: Vec<ResourceEntry>,
    contents: HashMap<String, ReadResourceResult>,
    templates: Vec<ResourceTemplate>,
}

impl StaticProvider {
    /// Creates an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a text resource.
    pub fn with_text(mut self, uri: &str, name: &str, mime_type: Option<&str>, text: &str) -> Self {
        self.entries.push(ResourceEntry {
            uri: uri.to_string(),
            name: name.to_string(),
            description: None,
            mime_type: mime_type.map(str::to_string),
        });
        self.contents.insert(
            uri.to_string(),
            ReadResourceResult {
                contents: vec![ResourceContents::Text {
                    uri: uri.to_string(),
                    mime_type: mime_type.map(str::to_string),
                    text: text.to_string(),
                }],
            },
        );
        self
    }

    /// Adds a URI template.
    pub fn with_template(mut self, uri_template: &str, name: &str) -> Self {
        self.templates.push(ResourceTemplate {
            uri_template: uri_template.to_string(),
            name: name.to_string(),
            description: None,
            mime_type: None,
        });
        self
    }
}

#[async_trait]
impl ResourceProvider for StaticProvider {
    async fn list(&self) -> McpResult<Vec<ResourceEntry>> {
        Ok(self.entries.clone())
    }

    async fn read(&self, uri: &str) -> McpResult<Option<ReadResourceResult>> {
        Ok(self.contents.get(uri).cloned())
    }

    async fn templates(&self) -> McpResult<Vec<ResourceTemplate>> {
        Ok(self.templates.clone())
    }
}

/// Provider serving files below a base directory as `file:///` resources.
#[derive(Debug)]
pub struct FileSystemProvider {
    base_dir: PathBuf,
    mime_types: HashMap<String, String>,
}

impl FileSystemProvider {
    /// Creates a provider rooted at `base_dir`.
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            mime_types: Self::default_mime_types(),
        }
    }

    fn default_mime_types() -> HashMap<String, String> {
        let mut mime_types = HashMap::new();
        mime_types.insert("txt".to_string(), "text/plain".to_string());
        mime_types.insert("md".to_string(), "text/markdown".to_string());
        mime_types.insert("rs".to_string(), "text/x-rust".to_string());
        mime_types.insert("py".to_string(), "text/x-python".to_string());
        mime_types.insert("js".to_string(), "text/javascript".to_string());
        mime_types.insert("html".to_string(), "text/html".to_string());
        mime_types.insert("css".to_string(), "text/css".to_string());
        mime_types.insert("json".to_string(), "application/json".to_string());
        mime_types.insert("yaml".to_string(), "application/yaml".to_string());
        mime_types.insert("toml".to_string(), "application/toml".to_string());
        mime_types.insert("png".to_string(), "image/png".to_string());
        mime_types.insert("jpg".to_string(), "image/jpeg".to_string());
        mime_types.insert("svg".to_string(), "image/svg+xml".to_string());
        mime_types
    }

    fn path_to_uri(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.base_dir).unwrap_or(path);
        format!("file:///{}", relative.to_string_lossy().replace('\\', "/"))
    }

    fn uri_to_path(&self, uri: &str) -> McpResult<Option<PathBuf>> {
        let Some(relative) = uri.strip_prefix("file:///") else {
            return Ok(None);
        };
        let full_path = self.base_dir.join(relative);
        // Reject any path escaping the base directory.
        if !full_path.starts_with(&self.base_dir) || relative.split('/').any(|c| c == "..") {
            return Err(McpError::InvalidParams(format!(
                "uri escapes the provider root: {}",
                uri
            )));
        }
        Ok(Some(full_path))
    }

    fn mime_type_for(&self, path: &Path) -> Option<String> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.mime_types.get(ext))
            .cloned()
    }

    fn is_text(mime_type: Option<&str>) -> bool {
        mime_type.is_some_and(|m| {
            m.starts_with("text/") || m.ends_with("json") || m.ends_with("yaml") || m.ends_with("xml")
        })
    }

    fn walk(&self, dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
        if dir.is_dir() {
            for entry in std::fs::read_dir(dir)? {
                let path = entry?.path();
                if path.is_dir() {
                    self.walk(&path, out)?;
                } else if path.is_file() {
                    out.push(path);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceProvider for FileSystemProvider {
    async fn list(&self) -> McpResult<Vec<ResourceEntry>> {
        let mut files = Vec::new();
        self.walk(&self.base_dir, &mut files)?;
        files.sort();

        Ok(files
            .iter()
            .map(|path| ResourceEntry {
                uri: self.path_to_uri(path),
                name: path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("unnamed")
                    .to_string(),
                description: None,
                mime_type: self.mime_type_for(path),
            })
            .collect())
    }

    async fn read(&self, uri: &str) -> McpResult<Option<ReadResourceResult>> {
        let Some(path) = self.uri_to_path(uri)? else {
            return Ok(None);
        };
        if !path.is_file() {
            return Ok(None);
        }

        let mime_type = self.mime_type_for(&path);
        let contents = if Self::is_text(mime_type.as_deref()) {
            let text = tokio::fs::read_to_string(&path).await?;
            ResourceContents::Text {
                uri: uri.to_string(),
                mime_type,
                text,
            }
        } else {
            let bytes = tokio::fs::read(&path).await?;
            ResourceContents::Blob {
                uri: uri.to_string(),
                mime_type,
                blob: BASE64.encode(bytes),
            }
        };

        Ok(Some(ReadResourceResult {
            contents: vec![contents],
        }))
    }
}
