//! Ordered command sequences and the property files that produce them.

use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::domain::session_types::SessionId;

/// Which property file a target selects: `<ext>.htpc` to compile,
/// `<ext>.htpr` to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    Compile,
    #[default]
    Run,
}

impl PropertyKind {
    pub fn extension(self) -> &'static str {
        match self {
            PropertyKind::Compile => "htpc",
            PropertyKind::Run => "htpr",
        }
    }

    /// `None` when the target has no extension to key the lookup on.
    pub fn file_name_for(self, target: &Path) -> Option<String> {
        let ext = target.extension()?.to_str()?;
        Some(format!("{ext}.{}", self.extension()))
    }

    /// Full path of the property file for `target` inside `dir`.
    pub fn path_in(self, dir: &Path, target: &Path) -> Option<PathBuf> {
        self.file_name_for(target).map(|name| dir.join(name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSequence {
    session_id: SessionId,
    commands: Vec<String>,
    cwd: PathBuf,
    echo_commands: bool,
}

impl CommandSequence {
    pub fn new(session_id: SessionId, commands: Vec<String>, cwd: PathBuf) -> Self {
        Self {
            session_id,
            commands,
            cwd,
            echo_commands: false,
        }
    }

    /// Echo each command as `> cmd` before it runs.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo_commands = echo;
        self
    }

    /// Builds the sequence for `target` from property-file `contents`.
    ///
    /// Blank lines and `;` comments are skipped. `%FILENAME%` expands to the
    /// target path, `%ONLYFILENAME%` to its name without the last extension
    /// and `%DIRFULLPATH%` to its directory, which is also the working
    /// directory of the sequence.
    pub fn from_property_file(session_id: SessionId, contents: &str, target: &Path) -> Self {
        let dir = target.parent().map(Path::to_path_buf).unwrap_or_default();
        let commands = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with(';'))
            .map(|line| expand_placeholders(line, target, &dir))
            .collect();
        Self::new(session_id, commands, dir).with_echo(true)
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn echo_commands(&self) -> bool {
        self.echo_commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

fn expand_placeholders(command: &str, target: &Path, dir: &Path) -> String {
    let stem = target
        .file_stem()
        .map(|stem| stem.to_string_lossy())
        .unwrap_or_default();
    command
        .replace("%FILENAME%", &target.to_string_lossy())
        .replace("%ONLYFILENAME%", &stem)
        .replace("%DIRFULLPATH%", &dir.to_string_lossy())
}
