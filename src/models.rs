//! Core data models used throughout the harvester.
//!
//! These types are the provider-neutral view of remote content that flows
//! from a provider client into the entity mappers. Providers normalise their
//! wire formats into [`RemoteEntity`] before the crawl sees them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a remote entity is, as far as the mappers care.
///
/// Document sub-kinds are kept distinct because they select different
/// type tags and mimetype overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Text,
    Presentation,
    Spreadsheet,
    Drawing,
    Pdf,
    Folder,
    Photo,
    Album,
    File,
}

/// An author or owner descriptor as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Medium of one media content attached to a photo entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Medium {
    Image,
    Video,
    Audio,
    Document,
    Executable,
    #[serde(other)]
    Unknown,
}

/// One media content of a photo entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaContent {
    pub medium: Medium,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// Camera and image attributes carried by photo entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhotoAttributes {
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub exposure: Option<f64>,
    #[serde(default)]
    pub focal_length: Option<f64>,
    #[serde(default)]
    pub fstop: Option<f64>,
    #[serde(default)]
    pub iso: Option<u32>,
    #[serde(default)]
    pub flash: Option<bool>,
    #[serde(default)]
    pub make: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// A remote entity observed during a crawl.
///
/// Read-only view supplied by a provider client. Timestamps are already
/// normalised to UTC; `updated_at` is the value compared against the
/// stored watermark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEntity {
    pub kind: EntityKind,
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub media: Vec<MediaContent>,
    #[serde(default)]
    pub photo: Option<PhotoAttributes>,
}

impl RemoteEntity {
    /// True unless some attached media content is not an image.
    ///
    /// Entries without any media contents count as images.
    pub fn is_image(&self) -> bool {
        self.media.iter().all(|m| m.medium == Medium::Image)
    }

    /// Content type of the first media content, falling back to the
    /// entity's own reported mimetype.
    pub fn media_type(&self) -> Option<&str> {
        self.media
            .first()
            .and_then(|m| m.content_type.as_deref())
            .or(self.mime_type.as_deref())
    }
}

/// Kind of principal an access rule grants access to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeType {
    /// Anyone; the entry is public.
    Default,
    /// Everyone in a domain.
    Domain,
    User,
    Group,
}

/// One sharing entry of a remote entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRule {
    pub scope_type: ScopeType,
    #[serde(default)]
    pub scope_value: Option<String>,
}

impl AccessRule {
    /// The principal this rule names, if it is a specific user or group.
    pub fn principal(&self) -> Option<&str> {
        match self.scope_type {
            ScopeType::Default | ScopeType::Domain => None,
            ScopeType::User | ScopeType::Group => self
                .scope_value
                .as_deref()
                .filter(|v| !v.trim().is_empty()),
        }
    }
}
