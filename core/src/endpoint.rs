//! The closed set of paths the WebClipper service exposes.
//!
//! # Design
//! Paths are matched segment by segment against an enumeration rather than by
//! substring, so `notestag/` or `notes/a/b/c` never sneak through. Endpoint
//! methods construct `Endpoint` values directly; `FromStr` exists for the
//! string-typed `JoplinApi::query_raw` entry point.

use std::fmt;
use std::str::FromStr;

use crate::error::{ApiError, Result};

/// Top-level resource segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Notes,
    Folders,
    Tags,
    Resources,
    Version,
    Ping,
}

impl Resource {
    pub const ALL: [Resource; 6] = [
        Resource::Notes,
        Resource::Folders,
        Resource::Tags,
        Resource::Resources,
        Resource::Version,
        Resource::Ping,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Resource::Notes => "notes",
            Resource::Folders => "folders",
            Resource::Tags => "tags",
            Resource::Resources => "resources",
            Resource::Version => "version",
            Resource::Ping => "ping",
        }
    }
}

impl FromStr for Resource {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self> {
        Resource::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| {
                ApiError::invalid(format!(
                    "request unexpected: {s:?} is not one of notes, folders, tags, resources, version, ping"
                ))
            })
    }
}

/// One concrete API path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Notes,
    Note(String),
    NoteTags(String),
    Folders,
    Folder(String),
    FolderNotes(String),
    Tags,
    Tag(String),
    TagNotes(String),
    TagNote { tag_id: String, note_id: String },
    Resources,
    Resource(String),
    ResourceFile(String),
    Version,
    Ping,
}

impl Endpoint {
    pub fn resource(&self) -> Resource {
        match self {
            Endpoint::Notes | Endpoint::Note(_) | Endpoint::NoteTags(_) => Resource::Notes,
            Endpoint::Folders | Endpoint::Folder(_) | Endpoint::FolderNotes(_) => Resource::Folders,
            Endpoint::Tags | Endpoint::Tag(_) | Endpoint::TagNotes(_) | Endpoint::TagNote { .. } => {
                Resource::Tags
            }
            Endpoint::Resources | Endpoint::Resource(_) | Endpoint::ResourceFile(_) => {
                Resource::Resources
            }
            Endpoint::Version => Resource::Version,
            Endpoint::Ping => Resource::Ping,
        }
    }

    /// Item ids this path carries, in path order.
    pub fn ids(&self) -> Vec<&str> {
        match self {
            Endpoint::Notes
            | Endpoint::Folders
            | Endpoint::Tags
            | Endpoint::Resources
            | Endpoint::Version
            | Endpoint::Ping => Vec::new(),
            Endpoint::Note(id)
            | Endpoint::NoteTags(id)
            | Endpoint::Folder(id)
            | Endpoint::FolderNotes(id)
            | Endpoint::Tag(id)
            | Endpoint::TagNotes(id)
            | Endpoint::Resource(id)
            | Endpoint::ResourceFile(id) => vec![id.as_str()],
            Endpoint::TagNote { tag_id, note_id } => vec![tag_id.as_str(), note_id.as_str()],
        }
    }

    /// Reject ids that would not survive as a single path segment. An empty
    /// id collapses into the collection path and dot segments are resolved
    /// away by URL normalization, both of which change which path is hit.
    pub fn validate(&self) -> Result<()> {
        match self.ids().into_iter().find(|id| id.is_empty() || is_dot_segment(id)) {
            Some(id) => Err(ApiError::invalid(format!(
                "id {id:?} is not a valid {} path segment",
                self.resource().as_str()
            ))),
            None => Ok(()),
        }
    }

    /// Path segments relative to the base URL. Collections end with an empty
    /// segment so the URL keeps its trailing slash (`notes/`).
    pub fn segments(&self) -> Vec<&str> {
        let root = self.resource().as_str();
        match self {
            Endpoint::Notes
            | Endpoint::Folders
            | Endpoint::Tags
            | Endpoint::Resources
            | Endpoint::Version
            | Endpoint::Ping => vec![root, ""],
            Endpoint::Note(id) | Endpoint::Folder(id) | Endpoint::Tag(id) | Endpoint::Resource(id) => {
                vec![root, id.as_str()]
            }
            Endpoint::NoteTags(id) => vec![root, id.as_str(), "tags"],
            Endpoint::FolderNotes(id) | Endpoint::TagNotes(id) => vec![root, id.as_str(), "notes"],
            Endpoint::TagNote { tag_id, note_id } => vec![root, tag_id.as_str(), "notes", note_id.as_str()],
            Endpoint::ResourceFile(id) => vec![root, id.as_str(), "file"],
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments().join("/"))
    }
}

impl FromStr for Endpoint {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim_matches('/');
        let parts: Vec<&str> = trimmed.split('/').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(ApiError::invalid(format!("malformed path {s:?}")));
        }
        let resource: Resource = parts[0].parse()?;
        let id = |i: usize| parts[i].to_string();

        let endpoint = match (resource, &parts[1..]) {
            (Resource::Notes, []) => Endpoint::Notes,
            (Resource::Notes, [_]) => Endpoint::Note(id(1)),
            (Resource::Notes, [_, "tags"]) => Endpoint::NoteTags(id(1)),
            (Resource::Folders, []) => Endpoint::Folders,
            (Resource::Folders, [_]) => Endpoint::Folder(id(1)),
            (Resource::Folders, [_, "notes"]) => Endpoint::FolderNotes(id(1)),
            (Resource::Tags, []) => Endpoint::Tags,
            (Resource::Tags, [_]) => Endpoint::Tag(id(1)),
            (Resource::Tags, [_, "notes"]) => Endpoint::TagNotes(id(1)),
            (Resource::Tags, [_, "notes", _]) => Endpoint::TagNote {
                tag_id: id(1),
                note_id: id(3),
            },
            (Resource::Resources, []) => Endpoint::Resources,
            (Resource::Resources, [_]) => Endpoint::Resource(id(1)),
            (Resource::Resources, [_, "file"]) => Endpoint::ResourceFile(id(1)),
            (Resource::Version, []) => Endpoint::Version,
            (Resource::Ping, []) => Endpoint::Ping,
            _ => return Err(ApiError::invalid(format!("unsupported path {s:?}"))),
        };
        endpoint.validate()?;
        Ok(endpoint)
    }
}

// `.`, `..` and their percent-encoded spellings, which URL parsing treats alike.
fn is_dot_segment(segment: &str) -> bool {
    let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
    decoded == "." || decoded == ".."
}
