//! A local directory exposed as a folder tree.
//!
//! Entity ids are paths relative to the root, with `/` separators; the
//! root itself has the empty id. Each listing walks exactly one level.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

use crate::error::ProviderError;
use crate::models::{EntityKind, RemoteEntity};
use crate::provider::FolderService;

pub struct FsTreeProvider {
    root: PathBuf,
    exclude: GlobSet,
    follow_symlinks: bool,
}

impl FsTreeProvider {
    pub fn new(
        root: impl Into<PathBuf>,
        exclude_globs: &[String],
        follow_symlinks: bool,
    ) -> Result<Self, ProviderError> {
        let mut excludes = vec![
            "**/.git/**".to_string(),
            "**/target/**".to_string(),
            "**/node_modules/**".to_string(),
        ];
        excludes.extend(exclude_globs.iter().cloned());

        Ok(Self {
            root: root.into(),
            exclude: build_globset(&excludes)?,
            follow_symlinks,
        })
    }

    fn relative_id(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn is_excluded(&self, id: &str, is_dir: bool) -> bool {
        // Match a child path so directory globs like `**/.git/**` also
        // exclude the directory entry itself.
        self.exclude.is_match(id) || (is_dir && self.exclude.is_match(format!("{}/_", id)))
    }
}

fn to_utc(time: std::io::Result<SystemTime>) -> Option<DateTime<Utc>> {
    time.ok().map(DateTime::<Utc>::from)
}

#[async_trait]
impl FolderService for FsTreeProvider {
    fn root_id(&self) -> &str {
        ""
    }

    async fn list_children(&self, folder_id: &str) -> Result<Vec<RemoteEntity>, ProviderError> {
        let dir = if folder_id.is_empty() {
            self.root.clone()
        } else {
            self.root.join(folder_id)
        };
        if !dir.is_dir() {
            return Err(ProviderError::UnknownFolder(folder_id.to_string()));
        }

        let walker = WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(self.follow_symlinks)
            .sort_by_file_name();

        let mut children = Vec::new();
        for entry in walker {
            let entry = entry?;
            let file_type = entry.file_type();
            let kind = if file_type.is_dir() {
                EntityKind::Folder
            } else if file_type.is_file() {
                EntityKind::File
            } else {
                continue;
            };

            let path = entry.path();
            let id = self.relative_id(path);
            if self.is_excluded(&id, kind == EntityKind::Folder) {
                continue;
            }

            let metadata = entry.metadata()?;
            let updated_at = to_utc(metadata.modified())
                .unwrap_or_else(|| DateTime::<Utc>::from(SystemTime::UNIX_EPOCH));
            let title = entry.file_name().to_string_lossy().to_string();

            children.push(RemoteEntity {
                kind,
                id,
                title: Some(title),
                summary: None,
                url: Some(format!("file://{}", path.display())),
                mime_type: None,
                created_at: to_utc(metadata.created()),
                updated_at,
                parents: Vec::new(),
                authors: Vec::new(),
                categories: Vec::new(),
                media: Vec::new(),
                photo: None,
            });
        }

        Ok(children)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, ProviderError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
