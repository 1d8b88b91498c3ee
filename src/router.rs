//! Destination taxonomy and file routing.
//!
//! The storage root holds one folder per dataset category plus a fallback
//! bucket. [`route`] is a pure lookup from a filename to a category; the
//! filesystem side ([`ensure_category_dirs`], [`place_file`],
//! [`sort_directory`]) only ever moves files into folders that already exist.
//!
//! The table is data: [`Taxonomy::load`] reads it from JSON, and
//! [`Taxonomy::default`] carries the 24 ANAC open-data categories.
//!
//! ```json
//! {
//!   "fallback": "altro_json",
//!   "categories": [
//!     { "name": "aggiudicazioni_json", "keywords": ["aggiudicazioni"] }
//!   ]
//! }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::fs_util;

/// Default fallback bucket for files no category claims.
pub const DEFAULT_FALLBACK: &str = "altro_json";

/// Default storage root for sorted files.
pub const DEFAULT_STORAGE_ROOT: &str = "/database/JSON";

/// Built-in table: folder name, then keywords in matching order.
const ANAC_CATEGORIES: &[(&str, &[&str])] = &[
    ("aggiudicatari_json", &["aggiudicatari"]),
    ("aggiudicazioni_json", &["aggiudicazioni", "aggiudicazione"]),
    ("avvio-contratto_json", &["avvio_contratto", "avvio"]),
    (
        "bandi-cig-modalita-realizzazio_json",
        &["bandi_cig_modalita", "modalita_realizzazione"],
    ),
    ("bando_cig_json", &["bando_cig", "bandi_cig"]),
    (
        "categorie-dpcm-aggregazione_json",
        &["categorie_dpcm", "dpcm_aggregazione"],
    ),
    ("categorie-opera_json", &["categorie_opera", "categorie_opere"]),
    (
        "centri-di-costo_json",
        &["centri_di_costo", "centro_di_costo", "centri_costo"],
    ),
    ("collaudo_json", &["collaudo", "collaudi"]),
    ("cup_json", &["cup"]),
    ("fine-contratto_json", &["fine_contratto"]),
    (
        "fonti-finanziamento_json",
        &["fonti_finanziamento", "finanziamenti"],
    ),
    ("indicatori-pnrrpnc_json", &["indicatori_pnrr", "indicatori"]),
    ("lavorazioni_json", &["lavorazioni"]),
    (
        "misurepremiali-pnrrpnc_json",
        &["misurepremiali", "misure_premiali"],
    ),
    ("partecipanti_json", &["partecipanti"]),
    ("pubblicazioni_json", &["pubblicazioni"]),
    ("quadro-economico_json", &["quadro_economico"]),
    ("smartcig_json", &["smartcig"]),
    ("sospensioni_json", &["sospensioni"]),
    ("stati-avanzamento_json", &["stati_avanzamento", "avanzamento"]),
    ("stazioni-appaltanti_json", &["stazioni_appaltanti"]),
    ("subappalti_json", &["subappalti", "subappalto"]),
    ("varianti_json", &["varianti", "variante"]),
];

/// Errors loading a taxonomy or moving files into it.
#[derive(Debug, Error)]
pub enum RouterError {
    /// A file or folder could not be read, created or moved.
    #[error("IO error on {path}: {source}")]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The taxonomy file is not valid JSON for the expected shape.
    #[error("malformed taxonomy {path}: {source}")]
    Parse {
        /// Taxonomy file.
        path: PathBuf,
        /// JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The taxonomy parsed but is unusable.
    #[error("invalid taxonomy: {reason}")]
    Invalid {
        /// What is wrong.
        reason: String,
    },
}

impl RouterError {
    /// Creates an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }
}

/// One destination folder and the keywords that select it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Folder name under the storage root.
    pub name: String,
    /// Keywords matched against normalized filenames.
    pub keywords: Vec<String>,
}

/// Ordered category table plus fallback bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taxonomy {
    /// Categories, matched in order.
    pub categories: Vec<Category>,
    /// Folder for files no category matches.
    #[serde(default = "default_fallback")]
    pub fallback: String,
}

fn default_fallback() -> String {
    DEFAULT_FALLBACK.to_string()
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self {
            categories: ANAC_CATEGORIES
                .iter()
                .map(|(name, keywords)| Category {
                    name: (*name).to_string(),
                    keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
                })
                .collect(),
            fallback: default_fallback(),
        }
    }
}

impl Taxonomy {
    /// Parses and validates a taxonomy from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Parse`] (with an empty path) for bad JSON and
    /// [`RouterError::Invalid`] when validation fails.
    pub fn from_json(text: &str) -> Result<Self, RouterError> {
        let taxonomy: Self = serde_json::from_str(text).map_err(|source| RouterError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        taxonomy.validate()?;
        Ok(taxonomy)
    }

    /// Loads and validates a taxonomy file.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Io`] if the file cannot be read,
    /// [`RouterError::Parse`] for bad JSON and [`RouterError::Invalid`] when
    /// validation fails.
    pub fn load(path: &Path) -> Result<Self, RouterError> {
        let text = std::fs::read_to_string(path).map_err(|e| RouterError::io(path, e))?;
        let taxonomy: Self = serde_json::from_str(&text).map_err(|source| RouterError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        taxonomy.validate()?;
        Ok(taxonomy)
    }

    /// Checks folder names are usable and unique and keywords non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), RouterError> {
        if self.categories.is_empty() {
            return Err(RouterError::invalid("no categories defined"));
        }
        let mut seen = HashSet::new();
        for name in self
            .categories
            .iter()
            .map(|c| c.name.as_str())
            .chain(std::iter::once(self.fallback.as_str()))
        {
            if !is_plain_folder_name(name) {
                return Err(RouterError::invalid(format!(
                    "`{name}` is not a plain folder name"
                )));
            }
            if !seen.insert(name) {
                return Err(RouterError::invalid(format!("duplicate folder `{name}`")));
            }
        }
        if let Some(category) = self
            .categories
            .iter()
            .find(|c| c.keywords.iter().all(|k| normalize(k).is_empty()))
        {
            return Err(RouterError::invalid(format!(
                "category `{}` has no keywords",
                category.name
            )));
        }
        Ok(())
    }

    /// Every folder the storage root must contain, fallback last.
    pub fn folder_names(&self) -> impl Iterator<Item = &str> {
        self.categories
            .iter()
            .map(|c| c.name.as_str())
            .chain(std::iter::once(self.fallback.as_str()))
    }

    /// Category for `filename`, or the fallback bucket.
    #[must_use]
    pub fn route_or_fallback(&self, filename: &str) -> &str {
        route(filename, self).unwrap_or(&self.fallback)
    }

    /// Category for a file path: its name first, then its parent folder
    /// (archives extract into a folder named after the archive), then the
    /// fallback bucket.
    #[must_use]
    pub fn route_path(&self, path: &Path) -> &str {
        let name = path.file_name().map(|n| n.to_string_lossy());
        let parent = path
            .parent()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy());
        name.as_deref()
            .and_then(|n| route(n, self))
            .or_else(|| parent.as_deref().and_then(|p| route(p, self)))
            .unwrap_or(&self.fallback)
    }
}

fn is_plain_folder_name(name: &str) -> bool {
    !name.trim().is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
}

/// Lowercases and folds `-` and spaces to `_`.
fn normalize(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect()
}

/// True when `keyword` occurs in `haystack` at the start of a word.
fn matches_at_word_start(haystack: &str, keyword: &str) -> bool {
    if keyword.is_empty() {
        return false;
    }
    haystack.match_indices(keyword).any(|(idx, _)| {
        haystack[..idx]
            .chars()
            .next_back()
            .is_none_or(|prev| !prev.is_alphanumeric())
    })
}

/// Returns the first category whose keyword appears in `filename`.
///
/// Matching is case-insensitive, treats `-` as `_`, and only accepts a
/// keyword where a word starts (so `cup` matches `cup_2023.json` but not
/// `occupazione.json`). Pure: no filesystem access.
#[must_use]
pub fn route<'a>(filename: &str, taxonomy: &'a Taxonomy) -> Option<&'a str> {
    let name = normalize(filename);
    taxonomy
        .categories
        .iter()
        .find(|category| {
            category
                .keywords
                .iter()
                .any(|keyword| matches_at_word_start(&name, &normalize(keyword)))
        })
        .map(|category| category.name.as_str())
}

/// Creates every category folder and the fallback under `root`.
///
/// # Errors
///
/// Returns [`RouterError::Io`] for the first folder that cannot be created.
#[instrument(level = "debug", skip(taxonomy), fields(root = %root.display()))]
pub fn ensure_category_dirs(root: &Path, taxonomy: &Taxonomy) -> Result<(), RouterError> {
    for name in taxonomy.folder_names() {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).map_err(|e| RouterError::io(&dir, e))?;
    }
    debug!(
        folders = taxonomy.categories.len() + 1,
        "category folders ready"
    );
    Ok(())
}

/// Moves `file` into its category folder under `root`.
///
/// The folder must already exist (see [`ensure_category_dirs`]). A file with
/// the same name in the target is replaced.
///
/// # Errors
///
/// Returns [`RouterError::Io`] if the target folder is missing or the move
/// fails.
pub fn place_file(file: &Path, root: &Path, taxonomy: &Taxonomy) -> Result<PathBuf, RouterError> {
    let category = taxonomy.route_path(file);
    let folder = root.join(category);
    if !folder.is_dir() {
        return Err(RouterError::io(
            &folder,
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "category folder does not exist",
            ),
        ));
    }
    let Some(name) = file.file_name() else {
        return Err(RouterError::io(
            file,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
        ));
    };
    let target = folder.join(name);
    fs_util::move_file(file, &target).map_err(|e| RouterError::io(file, e))?;
    debug!(from = %file.display(), to = %target.display(), category, "file sorted");
    Ok(target)
}

/// Outcome of sorting a directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortSummary {
    /// Files moved, with their new paths.
    pub moved: Vec<PathBuf>,
    /// Of those, how many landed in the fallback bucket.
    pub uncategorized: usize,
    /// Files that could not be moved.
    pub failed: Vec<(PathBuf, String)>,
}

/// Sorts every `.json` file below `source` into the taxonomy under `root`.
///
/// Category folders are created first. Per-file failures are collected,
/// not raised.
///
/// # Errors
///
/// Returns [`RouterError::Io`] if the category folders cannot be created or
/// `source` cannot be listed.
#[instrument(skip(taxonomy), fields(source = %source.display(), root = %root.display()))]
pub fn sort_directory(
    source: &Path,
    root: &Path,
    taxonomy: &Taxonomy,
) -> Result<SortSummary, RouterError> {
    ensure_category_dirs(root, taxonomy)?;

    let mut files = Vec::new();
    collect_json_files(source, &mut files)?;
    let root_folders: Vec<PathBuf> = taxonomy.folder_names().map(|n| root.join(n)).collect();

    let mut summary = SortSummary::default();
    for file in files {
        if root_folders.iter().any(|folder| file.starts_with(folder)) {
            continue;
        }
        let fallback = taxonomy.route_path(&file) == taxonomy.fallback;
        match place_file(&file, root, taxonomy) {
            Ok(target) => {
                if fallback {
                    summary.uncategorized += 1;
                }
                summary.moved.push(target);
            }
            Err(error) => {
                warn!(file = %file.display(), error = %error, "could not sort file");
                summary.failed.push((file, error.to_string()));
            }
        }
    }

    info!(
        moved = summary.moved.len(),
        uncategorized = summary.uncategorized,
        failed = summary.failed.len(),
        "directory sorted"
    );
    Ok(summary)
}

fn collect_json_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), RouterError> {
    let entries = std::fs::read_dir(dir).map_err(|e| RouterError::io(dir, e))?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .collect();
    paths.sort();
    for path in paths {
        if path.is_dir() {
            collect_json_files(&path, out)?;
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"))
        {
            out.push(path);
        }
    }
    Ok(())
}
