use std::path::PathBuf;

use serde::Deserialize;

use crate::domain::PropertyKind;
use crate::domain::SessionId;

#[derive(Debug, Clone, Deserialize)]
pub struct OpenSessionParams {
    pub cwd: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionParams {
    pub session_id: SessionId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunCommandParams {
    pub session_id: SessionId,
    pub command_line: String,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunSequenceParams {
    pub session_id: SessionId,
    pub commands: Vec<String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

/// `property_file` wins over the `<ext>.htpc|htpr` lookup in the
/// configured property directory.
#[derive(Debug, Clone, Deserialize)]
pub struct PropertyFileParams {
    pub session_id: SessionId,
    pub target: PathBuf,
    #[serde(default)]
    pub kind: PropertyKind,
    #[serde(default)]
    pub property_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WriteStdinParams {
    pub session_id: SessionId,
    pub data: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AutocompleteParams {
    pub session_id: SessionId,
    pub partial: String,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchParams {
    pub session_id: SessionId,
    pub line: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeyParams {
    pub session_id: SessionId,
    pub key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeDirectoryParams {
    pub session_id: SessionId,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerToggleParams {
    pub session_id: SessionId,
    pub root_path: PathBuf,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub default_file: Option<String>,
}
