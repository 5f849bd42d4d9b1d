//! Page template store.
//!
//! Loads up to `preset.page_limit` template files from `preset.page_dir`
//! at startup and renders them with `{{key}}` placeholder substitution.
//! Handlers reach the store through the portal; it is read-only after load.

use std::{
    collections::HashMap,
    fs,
    path::Path,
};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum PageError {
    #[error("failed to read page directory `{path}`: {source}")]
    Dir {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to read page `{path}`: {source}")]
    File {
        path: String,
        source: std::io::Error,
    },
}

/// An in-memory set of named page templates, keyed by file stem.
#[derive(Debug, Default)]
pub struct PageStore {
    pages: HashMap<String, String>,
}

impl PageStore {
    /// A store with no pages. Rendering always misses.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads `.html`/`.htm` files from `dir`, at most `limit` of them.
    ///
    /// A missing directory degrades to an empty store so a pageless
    /// deployment does not have to create one.
    pub fn load(dir: &Path, limit: usize) -> Result<Self, PageError> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!(dir = %dir.display(), "page directory missing, no pages loaded");
                return Ok(Self::empty());
            }
            Err(err) => {
                return Err(PageError::Dir {
                    path: dir.display().to_string(),
                    source: err,
                });
            }
        };

        let mut pages = HashMap::new();
        for entry in entries {
            let entry = entry.map_err(|err| PageError::Dir {
                path: dir.display().to_string(),
                source: err,
            })?;
            let path = entry.path();

            let is_page = matches!(
                path.extension().and_then(|ext| ext.to_str()),
                Some("html" | "htm")
            );
            if !is_page {
                continue;
            }
            if pages.len() == limit {
                warn!(dir = %dir.display(), limit, "page limit reached, remaining pages skipped");
                break;
            }

            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let body = fs::read_to_string(&path).map_err(|err| PageError::File {
                path: path.display().to_string(),
                source: err,
            })?;
            pages.insert(name.to_string(), body);
        }

        info!(dir = %dir.display(), count = pages.len(), "pages loaded");
        Ok(Self { pages })
    }

    /// Raw template body.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pages.get(name).map(String::as_str)
    }

    /// Renders a template, replacing every `{{key}}` with its value.
    /// Returns `None` when the template is not loaded.
    pub fn render(&self, name: &str, vars: &[(&str, &str)]) -> Option<String> {
        let mut body = self.get(name)?.to_owned();
        for (key, value) in vars {
            body = body.replace(&format!("{{{{{key}}}}}"), value);
        }
        Some(body)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}
