//! Handing finished documents to a viewer or a share target.
//!
//! Files are never passed around as raw paths: a [`ContentProvider`] grants a
//! [`ContentRef`] for files inside its roots, and handlers act on that.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use crate::PDF_MIME_TYPE;

/// Title shown by share choosers.
pub const CHOOSER_TITLE: &str = "Share PDF Using";

/// Errors that can occur while presenting a document. None of them are
/// fatal; they surface as user-visible notices.
#[derive(Debug, thiserror::Error)]
pub enum PresentError {
    #[error("File not found.")]
    FileNotFound(PathBuf),

    #[error("File is outside every shared root: {0}")]
    NotShareable(PathBuf),

    #[error("No PDF viewer found.")]
    NoViewer,

    #[error("No apps found to share the PDF.")]
    NoShareTarget,

    #[error("Error opening PDF: {0}")]
    Launch(String),
}

/// What to do with the document once it exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Nothing,
    Show,
    Share,
}

impl Disposition {
    /// Share takes precedence over show.
    pub fn from_flags(show: bool, share: bool) -> Self {
        if share {
            Disposition::Share
        } else if show {
            Disposition::Show
        } else {
            Disposition::Nothing
        }
    }
}

/// A capability-scoped reference to a readable file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRef {
    pub uri: String,
    pub mime_type: String,
    path: PathBuf,
}

impl ContentRef {
    /// Resolves the reference to the file it grants access to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Grants read access to files below a fixed set of named roots.
#[derive(Debug, Clone)]
pub struct ContentProvider {
    authority: String,
    roots: Vec<(String, PathBuf)>,
}

impl ContentProvider {
    pub fn new(authority: impl Into<String>) -> Self {
        ContentProvider {
            authority: authority.into(),
            roots: Vec::new(),
        }
    }

    pub fn with_root(mut self, name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        self.roots.push((name.into(), dir.into()));
        self
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Builds a `content://` reference for `path`.
    pub fn grant_read(&self, path: &Path) -> Result<ContentRef, PresentError> {
        if !path.is_file() {
            return Err(PresentError::FileNotFound(path.to_path_buf()));
        }

        let file = path
            .canonicalize()
            .map_err(|_| PresentError::FileNotFound(path.to_path_buf()))?;

        for (name, root) in &self.roots {
            let Ok(root) = root.canonicalize() else {
                continue;
            };
            if let Ok(relative) = file.strip_prefix(&root) {
                let segments: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                return Ok(ContentRef {
                    uri: format!("content://{}/{}/{}", self.authority, name, segments.join("/")),
                    mime_type: PDF_MIME_TYPE.to_string(),
                    path: file,
                });
            }
        }

        Err(PresentError::NotShareable(path.to_path_buf()))
    }
}

/// Resolves view and share requests on the host.
pub trait IntentHandler {
    fn view(&self, content: &ContentRef) -> Result<(), PresentError>;

    fn share(&self, content: &ContentRef, chooser_title: &str) -> Result<(), PresentError>;
}

/// Host programs able to open a document in the default viewer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Opener {
    XdgOpen,
    Open,
    Start,
}

impl Opener {
    /// Returns the program and leading arguments for this opener.
    pub fn command(&self) -> (&'static str, &'static [&'static str]) {
        const NO_ARGS: &[&str] = &[];
        const START_ARGS: &[&str] = &["/C", "start", ""];

        match self {
            Opener::XdgOpen => ("xdg-open", NO_ARGS),
            Opener::Open => ("open", NO_ARGS),
            Opener::Start => ("cmd", START_ARGS),
        }
    }

    /// The opener used by the current host.
    pub fn for_host() -> Self {
        if cfg!(target_os = "macos") {
            Opener::Open
        } else if cfg!(target_os = "windows") {
            Opener::Start
        } else {
            Opener::XdgOpen
        }
    }
}

/// Launches host programs for view and share requests.
#[derive(Debug, Clone)]
pub struct SystemHandler {
    opener: Opener,
    share_command: Option<String>,
}

impl SystemHandler {
    pub fn new(share_command: Option<String>) -> Self {
        SystemHandler {
            opener: Opener::for_host(),
            share_command,
        }
    }

    pub fn with_opener(opener: Opener, share_command: Option<String>) -> Self {
        SystemHandler {
            opener,
            share_command,
        }
    }

    pub fn opener(&self) -> Opener {
        self.opener
    }

    fn spawn(mut cmd: Command, missing: PresentError) -> Result<(), PresentError> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        match cmd.spawn() {
            Ok(mut child) => {
                let pid = child.id();
                log::debug!("Launched handler process {pid}");
                // Reaped off-thread once it exits.
                thread::spawn(move || match child.wait() {
                    Ok(status) => log::debug!("Handler process {pid} exited with {status}"),
                    Err(e) => log::warn!("Failed to wait for handler process {pid}: {e}"),
                });
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(missing),
            Err(e) => Err(PresentError::Launch(e.to_string())),
        }
    }
}

impl IntentHandler for SystemHandler {
    fn view(&self, content: &ContentRef) -> Result<(), PresentError> {
        let (program, args) = self.opener.command();
        let mut cmd = Command::new(program);
        cmd.args(args).arg(content.path());

        Self::spawn(cmd, PresentError::NoViewer)
    }

    fn share(&self, content: &ContentRef, chooser_title: &str) -> Result<(), PresentError> {
        let command = self.share_command.as_deref().ok_or(PresentError::NoShareTarget)?;
        let mut parts = command.split_whitespace();
        let program = parts.next().ok_or(PresentError::NoShareTarget)?;

        let mut cmd = Command::new(program);
        cmd.args(parts)
            .arg(content.path())
            .env("SURFACEPDF_SHARE_URI", &content.uri)
            .env("SURFACEPDF_SHARE_MIME", &content.mime_type)
            .env("SURFACEPDF_SHARE_TITLE", chooser_title);

        Self::spawn(cmd, PresentError::NoShareTarget)
    }
}

/// Performs at most one output action for a finished document.
pub struct Presenter {
    provider: ContentProvider,
    handler: Box<dyn IntentHandler>,
}

impl Presenter {
    pub fn new(provider: ContentProvider, handler: Box<dyn IntentHandler>) -> Self {
        Presenter { provider, handler }
    }

    pub fn provider(&self) -> &ContentProvider {
        &self.provider
    }

    /// Carries out `disposition` for `file`. Returns a user-visible notice
    /// when the action could not be completed.
    pub fn present(&self, disposition: Disposition, file: &Path) -> Option<String> {
        let result = match disposition {
            Disposition::Nothing => return None,
            Disposition::Show => self
                .provider
                .grant_read(file)
                .and_then(|content| self.handler.view(&content)),
            Disposition::Share => self
                .provider
                .grant_read(file)
                .and_then(|content| self.handler.share(&content, CHOOSER_TITLE)),
        };

        match result {
            Ok(()) => {
                log::info!("Handed {} to {:?} handler", file.display(), disposition);
                None
            }
            Err(err) => {
                log::warn!("{err}");
                Some(err.to_string())
            }
        }
    }
}
