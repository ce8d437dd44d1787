//! Path safety checks for files the tool reads and writes
//!
//! A path is considered safe when its canonical form (symlinks followed) lies
//! under one of the permitted base directories:
//! - the current working directory
//! - the user's home directory
//! - the system temp directory
//! - the directory holding the running executable (the bundle directory)
//!
//! The bases are recomputed on every check, so the outcome depends on process
//! state at the moment of the call. There is no protection against the
//! filesystem changing between a check and the subsequent use.

use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::errors::DomainError;

/// Maximum size of a text input file (10 MiB)
pub const MAX_TEXT_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Directory containing the running executable, if it can be determined
#[must_use]
pub fn bundle_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()?
        .parent()
        .map(Path::to_path_buf)
}

/// Set of canonical base directories under which file I/O is allowed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeBases(Vec<PathBuf>);

impl SafeBases {
    /// Compute the bases from the current process state
    ///
    /// Bases that cannot be canonicalized (for example a deleted working
    /// directory) are skipped.
    #[must_use]
    pub fn current() -> Self {
        let mut candidates = Vec::with_capacity(4);
        if let Ok(cwd) = std::env::current_dir() {
            candidates.push(cwd);
        }
        if let Some(home) = dirs::home_dir() {
            candidates.push(home);
        }
        candidates.push(std::env::temp_dir());
        if let Some(bundle) = bundle_dir() {
            candidates.push(bundle);
        }
        Self::from_paths(candidates)
    }

    /// Build bases from explicit directories
    #[must_use]
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        Self(
            paths
                .into_iter()
                .filter_map(|p| p.as_ref().canonicalize().ok())
                .collect(),
        )
    }

    /// Whether an already-resolved path lies under any base
    #[must_use]
    pub fn contains(&self, resolved: &Path) -> bool {
        self.0.iter().any(|base| resolved.starts_with(base))
    }

    /// The canonical base directories
    #[must_use]
    pub fn bases(&self) -> &[PathBuf] {
        &self.0
    }
}

/// Symlink hops followed before a path is treated as a loop
const MAX_SYMLINK_HOPS: usize = 40;

/// One step of a path still to be resolved
enum Step {
    Root(PathBuf),
    Parent,
    Name(OsString),
}

fn push_steps(pending: &mut Vec<Step>, path: &Path) {
    let steps: Vec<Step> = path
        .components()
        .filter_map(|component| match component {
            Component::Prefix(_) | Component::RootDir => {
                Some(Step::Root(PathBuf::from(component.as_os_str())))
            },
            Component::CurDir => None,
            Component::ParentDir => Some(Step::Parent),
            Component::Normal(part) => Some(Step::Name(part.to_os_string())),
        })
        .collect();
    pending.extend(steps.into_iter().rev());
}

/// Resolve `path` to an absolute path with every symlink followed
///
/// Links are followed one hop at a time, so a link whose target does not
/// exist yet still resolves to where a write through it would land. Missing
/// components are kept as written and `..` is applied to the resolved prefix.
/// With `allow_creation == false` the resolved path must exist.
fn resolve(path: &Path, allow_creation: bool) -> io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut pending = Vec::new();
    push_steps(&mut pending, &absolute);

    let mut resolved = PathBuf::new();
    let mut hops = 0;
    while let Some(step) = pending.pop() {
        match step {
            Step::Root(root) => {
                if root.has_root() {
                    resolved.push(root);
                } else {
                    resolved = root;
                }
            },
            Step::Parent => {
                resolved.pop();
            },
            Step::Name(part) => {
                let candidate = resolved.join(&part);
                match std::fs::symlink_metadata(&candidate) {
                    Ok(meta) if meta.file_type().is_symlink() => {
                        hops += 1;
                        if hops > MAX_SYMLINK_HOPS {
                            return Err(io::Error::other(format!(
                                "too many levels of symbolic links at {}",
                                candidate.display()
                            )));
                        }
                        let target = std::fs::read_link(&candidate)?;
                        if target.is_absolute() {
                            resolved = PathBuf::new();
                        }
                        push_steps(&mut pending, &target);
                    },
                    Ok(_) => resolved = candidate,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => resolved = candidate,
                    Err(e) => return Err(e),
                }
            },
        }
    }

    if !allow_creation && !resolved.exists() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} does not exist", resolved.display()),
        ));
    }
    Ok(resolved)
}

/// An absolute path that lay under a safe base directory when it was checked
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SafePath(PathBuf);

impl SafePath {
    /// Resolve and check a path against the current safe bases
    pub fn resolve(
        path: &Path,
        purpose: &str,
        allow_creation: bool,
    ) -> Result<Self, DomainError> {
        Self::resolve_with(path, purpose, allow_creation, &SafeBases::current())
    }

    /// Resolve and check a path against explicit bases
    pub fn resolve_with(
        path: &Path,
        purpose: &str,
        allow_creation: bool,
        bases: &SafeBases,
    ) -> Result<Self, DomainError> {
        let unsafe_path = || DomainError::UnsafePath {
            purpose: purpose.to_string(),
            path: path.to_path_buf(),
        };

        let resolved = resolve(path, allow_creation).map_err(|_| unsafe_path())?;
        if bases.contains(&resolved) {
            Ok(Self(resolved))
        } else {
            Err(unsafe_path())
        }
    }

    /// Validate a path that will be written; its parent may not exist yet
    pub fn output(path: &Path, purpose: &str) -> Result<Self, DomainError> {
        Self::resolve(path, purpose, true)
    }

    /// Validate an existing, regular, size-bounded input file
    pub fn input(path: &Path, purpose: &str) -> Result<Self, DomainError> {
        Self::input_with(path, purpose, &SafeBases::current())
    }

    /// Validate an input file against explicit bases
    pub fn input_with(path: &Path, purpose: &str, bases: &SafeBases) -> Result<Self, DomainError> {
        if !path.exists() {
            return Err(DomainError::FileNotFound {
                purpose: purpose.to_string(),
                path: path.to_path_buf(),
            });
        }
        if !path.is_file() {
            return Err(DomainError::NotAFile {
                purpose: purpose.to_string(),
                path: path.to_path_buf(),
            });
        }

        let safe = Self::resolve_with(path, purpose, false, bases)?;

        let size = std::fs::metadata(&safe.0)
            .map_err(|_| DomainError::FileNotFound {
                purpose: purpose.to_string(),
                path: path.to_path_buf(),
            })?
            .len();
        if size > MAX_TEXT_FILE_SIZE {
            return Err(DomainError::file_too_large(purpose, size, MAX_TEXT_FILE_SIZE));
        }

        Ok(safe)
    }

    /// The resolved absolute path
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Owned copy of the resolved path
    #[must_use]
    pub fn to_path_buf(&self) -> PathBuf {
        self.0.clone()
    }

    /// Consume and return the resolved path
    #[must_use]
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl AsRef<Path> for SafePath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for SafePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}
