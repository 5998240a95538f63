//! # Sources Descriptor (`drift-sources` v0)
//!
//! A local, offline-friendly description of where `drift fetch` should
//! look for package repositories. Directory sources only; each carries a
//! stable user-chosen id and an integer priority (lower is preferred).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{PkgError, PkgResult};

pub const SOURCES_FORMAT: &str = "drift-sources";
pub const SOURCES_VERSION: u32 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirSource {
    pub kind: String,
    pub id: String,
    pub priority: i64,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcesV0 {
    pub format: String,
    pub version: u32,
    pub sources: Vec<DirSource>,
}

impl SourcesV0 {
    /// Sources in deterministic selection order: by (priority, id).
    pub fn sorted_sources(&self) -> Vec<&DirSource> {
        let mut out: Vec<&DirSource> = self.sources.iter().collect();
        out.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
        out
    }

    pub fn source_by_id(&self, id: &str) -> Option<&DirSource> {
        self.sources.iter().find(|s| s.id == id)
    }
}

pub fn load_sources_v0(path: &Path) -> PkgResult<SourcesV0> {
    let text = std::fs::read_to_string(path)?;
    let sources: SourcesV0 = serde_json::from_str(text.trim_end_matches('\n'))?;
    if sources.format != SOURCES_FORMAT || sources.version != SOURCES_VERSION {
        return Err(PkgError::Format(
            "unsupported sources format/version".to_string(),
        ));
    }
    for source in &sources.sources {
        if source.kind != "dir" {
            return Err(PkgError::Format(
                "unsupported source kind (dir sources only)".to_string(),
            ));
        }
        if source.id.is_empty() {
            return Err(PkgError::Format("source entry must have an id".to_string()));
        }
        if source.path.as_os_str().is_empty() {
            return Err(PkgError::Format(
                "dir source must have a path string".to_string(),
            ));
        }
    }
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sources_sort_by_priority_then_id() {
        let sources = SourcesV0 {
            format: SOURCES_FORMAT.to_string(),
            version: 0,
            sources: vec![
                DirSource {
                    kind: "dir".to_string(),
                    id: "b".to_string(),
                    priority: 0,
                    path: PathBuf::from("/b"),
                },
                DirSource {
                    kind: "dir".to_string(),
                    id: "a".to_string(),
                    priority: 0,
                    path: PathBuf::from("/a"),
                },
                DirSource {
                    kind: "dir".to_string(),
                    id: "c".to_string(),
                    priority: -1,
                    path: PathBuf::from("/c"),
                },
            ],
        };
        let ids: Vec<&str> = sources
            .sorted_sources()
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn non_dir_kind_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drift-sources.json");
        std::fs::write(
            &path,
            serde_json::json!({
                "format": "drift-sources",
                "version": 0,
                "sources": [{"kind": "http", "id": "x", "priority": 0, "path": "/x"}],
            })
            .to_string(),
        )
        .unwrap();
        let err = load_sources_v0(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported source kind"));
    }
}
