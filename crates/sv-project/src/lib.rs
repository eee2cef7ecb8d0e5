//! Source file registry for the SystemVerilog analysis frontend.
//!
//! A [`Project`] owns every opened source file, hands out stable
//! [`FileId`]s, resolves `` `include `` paths against its include roots,
//! and caches each file's parse so repeated opens and re-inclusions reuse
//! the same handle. Files can come from disk or be registered in memory
//! (tests, tooling).

use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sv_syntax::SyntaxTree;
use thiserror::Error;

pub use sv_diagnostics::FileId;

/// Errors from opening or parsing project files.
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("{path}: file not found")]
    FileNotFound { path: String },

    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: {message}")]
    Parse { path: String, message: String },
}

/// Outcome of the (idempotent) parse of one file.
#[derive(Debug, Clone, Default)]
enum ParseState {
    #[default]
    NotParsed,
    Parsed(Arc<SyntaxTree>),
    Failed(String),
}

/// One opened source file.
#[derive(Debug)]
pub struct SourceFile {
    referenced_path: String,
    resolved_path: PathBuf,
    text: Arc<str>,
    parse_state: ParseState,
    is_translation_unit: bool,
}

impl SourceFile {
    /// The name by which this file was opened (include string or unit name).
    #[must_use]
    pub fn referenced_path(&self) -> &str {
        &self.referenced_path
    }

    /// The filesystem path the reference resolved to. Virtual files keep
    /// their referenced name here.
    #[must_use]
    pub fn resolved_path(&self) -> &Path {
        &self.resolved_path
    }

    /// Raw contents.
    #[must_use]
    pub fn text(&self) -> &Arc<str> {
        &self.text
    }

    /// The syntax tree, if this file has been parsed successfully.
    #[must_use]
    pub fn syntax_tree(&self) -> Option<&Arc<SyntaxTree>> {
        match &self.parse_state {
            ParseState::Parsed(tree) => Some(tree),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_translation_unit(&self) -> bool {
        self.is_translation_unit
    }
}

/// The project: every opened file plus the include search path.
#[derive(Debug, Default)]
pub struct Project {
    include_paths: Vec<PathBuf>,
    files: Vec<SourceFile>,
    by_referenced_path: FxHashMap<String, FileId>,
}

impl Project {
    /// Create a project searching the given include roots, in order.
    #[must_use]
    pub fn new(include_paths: Vec<PathBuf>) -> Self {
        Project {
            include_paths,
            ..Project::default()
        }
    }

    fn register(&mut self, file: SourceFile) -> FileId {
        let id = FileId(self.files.len() as u32);
        self.by_referenced_path
            .insert(file.referenced_path.clone(), id);
        self.files.push(file);
        id
    }

    /// Access a file by id.
    ///
    /// # Panics
    /// Panics if `id` was not issued by this project.
    #[must_use]
    pub fn file(&self, id: FileId) -> &SourceFile {
        &self.files[id.index()]
    }

    /// Ids of all registered translation units, in registration order.
    #[must_use]
    pub fn translation_units(&self) -> Vec<FileId> {
        self.files
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_translation_unit)
            .map(|(i, _)| FileId(i as u32))
            .collect()
    }

    /// Open a translation unit from disk (or return the existing handle).
    pub fn open_translation_unit(&mut self, path: &str) -> Result<FileId, ProjectError> {
        if let Some(&id) = self.by_referenced_path.get(path) {
            return Ok(id);
        }
        let resolved = PathBuf::from(path);
        let text = std::fs::read_to_string(&resolved).map_err(|source| ProjectError::Io {
            path: path.to_string(),
            source,
        })?;
        Ok(self.register(SourceFile {
            referenced_path: path.to_string(),
            resolved_path: resolved,
            text: Arc::from(text),
            parse_state: ParseState::NotParsed,
            is_translation_unit: true,
        }))
    }

    /// Open an included file by its `` `include `` string: previously opened
    /// files are reused, otherwise the include roots are searched in order.
    pub fn open_included_file(&mut self, path: &str) -> Result<FileId, ProjectError> {
        if let Some(&id) = self.by_referenced_path.get(path) {
            return Ok(id);
        }
        for root in &self.include_paths {
            let candidate = root.join(path);
            if candidate.is_file() {
                let text =
                    std::fs::read_to_string(&candidate).map_err(|source| ProjectError::Io {
                        path: path.to_string(),
                        source,
                    })?;
                return Ok(self.register(SourceFile {
                    referenced_path: path.to_string(),
                    resolved_path: candidate,
                    text: Arc::from(text),
                    parse_state: ParseState::NotParsed,
                    is_translation_unit: false,
                }));
            }
        }
        Err(ProjectError::FileNotFound {
            path: path.to_string(),
        })
    }

    /// Register an in-memory translation unit.
    pub fn add_virtual_translation_unit(
        &mut self,
        name: impl Into<String>,
        text: impl Into<Arc<str>>,
    ) -> FileId {
        let name = name.into();
        self.register(SourceFile {
            resolved_path: PathBuf::from(&name),
            referenced_path: name,
            text: text.into(),
            parse_state: ParseState::NotParsed,
            is_translation_unit: true,
        })
    }

    /// Register an in-memory file that `` `include `` can find by name.
    pub fn add_virtual_include(
        &mut self,
        name: impl Into<String>,
        text: impl Into<Arc<str>>,
    ) -> FileId {
        let name = name.into();
        self.register(SourceFile {
            resolved_path: PathBuf::from(&name),
            referenced_path: name,
            text: text.into(),
            parse_state: ParseState::NotParsed,
            is_translation_unit: false,
        })
    }

    /// Parse a file. Idempotent: the first outcome (tree or error) is
    /// cached and returned on every subsequent call.
    pub fn parse(&mut self, id: FileId) -> Result<Arc<SyntaxTree>, ProjectError> {
        let file = &mut self.files[id.index()];
        match &file.parse_state {
            ParseState::Parsed(tree) => return Ok(tree.clone()),
            ParseState::Failed(message) => {
                return Err(ProjectError::Parse {
                    path: file.referenced_path.clone(),
                    message: message.clone(),
                })
            }
            ParseState::NotParsed => {}
        }
        match sv_parser::parse(&file.text) {
            Ok(tree) => {
                let tree = Arc::new(tree);
                file.parse_state = ParseState::Parsed(tree.clone());
                Ok(tree)
            }
            Err(err) => {
                let message = err.to_string();
                file.parse_state = ParseState::Failed(message.clone());
                Err(ProjectError::Parse {
                    path: file.referenced_path.clone(),
                    message,
                })
            }
        }
    }
}
