//! Workspace management for patch runs.
//!
//! A [`Workspace`] owns the temporary directory a run decodes into and
//! rebuilds from. While it exists it holds a lock file so no second run can
//! use the same directory. [`Layout`] names the paths inside it.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use ap_core::{Error, Result};
use tempfile::{NamedTempFile, TempDir};

/// Name of the lock file created in the workspace root.
const LOCK_FILE: &str = ".apkpatch.lock";

/// Paths used by a run inside its temporary directory.
///
/// ```text
/// <root>/decode/                          decoded working tree
/// <root>/decode/AndroidManifest.xml
/// <root>/decode/res/xml/<name>.xml        network security config
/// <root>/framework/                       apktool framework files
/// <root>/tmp.apk                          rebuilt (then signed) artifact
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn decode_dir(&self) -> PathBuf {
        self.root.join("decode")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.decode_dir().join("AndroidManifest.xml")
    }

    /// Location of the network security config resource called `name`.
    pub fn network_config_path(&self, name: &str) -> PathBuf {
        self.decode_dir()
            .join("res")
            .join("xml")
            .join(format!("{name}.xml"))
    }

    pub fn framework_dir(&self) -> PathBuf {
        self.root.join("framework")
    }

    pub fn tmp_apk(&self) -> PathBuf {
        self.root.join("tmp.apk")
    }

    /// Copy the rebuilt artifact to `output`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifact does not exist or the copy fails.
    /// `output` is replaced in one rename, so it is either the old file or
    /// the complete new one, never a partial copy.
    pub fn deliver(&self, output: &Path) -> Result<PathBuf> {
        let artifact = self.tmp_apk();
        if !artifact.is_file() {
            return Err(Error::Validation(format!(
                "rebuilt artifact does not exist: {}",
                artifact.display()
            )));
        }

        let parent = match output.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                parent
            }
            None => Path::new("."),
        };

        // Stage next to the output so the final rename stays on one filesystem.
        let mut staged = NamedTempFile::new_in(parent)?;
        std::io::copy(&mut File::open(&artifact)?, staged.as_file_mut())?;
        staged.as_file().sync_all()?;
        staged.persist(output).map_err(|e| e.error)?;

        tracing::info!("Wrote {}", output.display());
        Ok(output.to_path_buf())
    }
}

/// Exclusive claim on a workspace directory, released on drop.
#[derive(Debug)]
struct WorkspaceLock {
    path: PathBuf,
}

impl WorkspaceLock {
    fn acquire(root: &Path) -> Result<Self> {
        let path = root.join(LOCK_FILE);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(Self { path }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(Error::Validation(format!(
                    "workspace {} is in use by another run (remove {} if that run is gone)",
                    root.display(),
                    path.display()
                )))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for WorkspaceLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Temporary directory for one patch run.
///
/// # Example
///
/// ```no_run
/// use ap_tools::Workspace;
///
/// let workspace = Workspace::create().unwrap();
/// let layout = workspace.layout();
/// // ... decode into layout.decode_dir(), rebuild into layout.tmp_apk() ...
/// workspace.cleanup().unwrap();
/// ```
#[derive(Debug)]
pub struct Workspace {
    // Declared first so the lock is released before the directory goes away.
    lock: WorkspaceLock,
    root: PathBuf,
    temp: Option<TempDir>,
}

impl Workspace {
    /// Create a fresh temporary directory for a run.
    pub fn create() -> Result<Self> {
        let temp = tempfile::Builder::new()
            .prefix("apkpatch-")
            .tempdir()
            .map_err(|e| Error::tool("workspace", format!("failed to create temp dir: {e}")))?;
        let root = temp.path().to_path_buf();
        let lock = WorkspaceLock::acquire(&root)?;

        Ok(Self {
            lock,
            root,
            temp: Some(temp),
        })
    }

    /// Use `dir` (created if missing) as the run's working directory.
    ///
    /// The directory is never deleted by [`Workspace::cleanup`]; only the
    /// files the run created inside it are.
    pub fn at(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let lock = WorkspaceLock::acquire(dir)?;
        Ok(Self {
            lock,
            root: dir.to_path_buf(),
            temp: None,
        })
    }

    /// Path to the workspace directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn layout(&self) -> Layout {
        Layout::new(&self.root)
    }

    /// Release the lock and leave every file on disk for inspection.
    pub fn keep(self) -> PathBuf {
        let Workspace { lock, root, temp } = self;
        drop(lock);
        if let Some(temp) = temp {
            let _ = temp.keep();
        }
        root
    }

    /// Remove everything the run created.
    pub fn cleanup(self) -> Result<()> {
        let Workspace { lock, root, temp } = self;
        drop(lock);
        match temp {
            Some(temp) => temp.close()?,
            None => {
                let layout = Layout::new(&root);
                remove_if_exists(&layout.decode_dir())?;
                remove_if_exists(&layout.framework_dir())?;
                remove_if_exists(&layout.tmp_apk())?;
            }
        }
        Ok(())
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    let result = if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    match result {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}
