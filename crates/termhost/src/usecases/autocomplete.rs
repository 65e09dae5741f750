use std::path::Path;

use tracing::debug;

use crate::domain::SessionId;

/// Lists directory entries that could complete a partially typed path.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutocompleteResolver;

impl AutocompleteResolver {
    /// Candidates for `partial`, relative to `cwd`, sorted. Directories end
    /// with the platform separator; names containing whitespace are wrapped
    /// in double quotes. An unreadable directory yields no candidates.
    #[tracing::instrument(skip(self, cwd), fields(session = %session_id))]
    pub fn complete(&self, session_id: SessionId, partial: &str, cwd: &Path) -> Vec<String> {
        let partial = partial.trim_matches(['"', '\'']);
        let split = partial.rfind(['/', '\\']).map_or(0, |index| index + 1);
        let (dir_part, prefix) = partial.split_at(split);
        let search_dir = if dir_part.is_empty() {
            cwd.to_path_buf()
        } else {
            cwd.join(dir_part)
        };

        let entries = match std::fs::read_dir(&search_dir) {
            Ok(entries) => entries,
            Err(err) => {
                debug!(dir = %search_dir.display(), error = %err, "Completion directory unreadable");
                return Vec::new();
            }
        };

        let prefix = prefix.to_lowercase();
        let dir_part = dir_part.replace('\\', "/");
        let mut candidates: Vec<String> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                if !name.to_lowercase().starts_with(&prefix) {
                    return None;
                }
                let mut candidate = format!("{dir_part}{name}");
                if entry.path().is_dir() {
                    candidate.push(std::path::MAIN_SEPARATOR);
                }
                if name.chars().any(char::is_whitespace) {
                    candidate = format!("\"{candidate}\"");
                }
                Some(candidate)
            })
            .collect();
        candidates.sort();
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.js"), "").unwrap();
        fs::write(dir.path().join("index.css"), "").unwrap();
        fs::write(dir.path().join("README.md"), "").unwrap();
        fs::write(dir.path().join("my notes.txt"), "").unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src").join("Main.rs"), "").unwrap();
        dir
    }

    #[test]
    fn test_prefix_match_is_case_insensitive() {
        let dir = fixture();
        let candidates =
            AutocompleteResolver.complete(SessionId::new(1), "readme", dir.path());
        assert_eq!(candidates, vec!["README.md".to_string()]);
    }

    #[test]
    fn test_directories_get_separator() {
        let dir = fixture();
        let candidates = AutocompleteResolver.complete(SessionId::new(1), "sr", dir.path());
        assert_eq!(candidates, vec![format!("src{}", std::path::MAIN_SEPARATOR)]);
    }

    #[test]
    fn test_nested_partial_keeps_directory_prefix() {
        let dir = fixture();
        let candidates = AutocompleteResolver.complete(SessionId::new(1), "src\\ma", dir.path());
        #[cfg(windows)]
        assert_eq!(candidates, vec!["src/Main.rs".to_string()]);
        #[cfg(not(windows))]
        assert!(candidates.is_empty());

        let candidates = AutocompleteResolver.complete(SessionId::new(1), "src/ma", dir.path());
        assert_eq!(candidates, vec!["src/Main.rs".to_string()]);
    }

    #[test]
    fn test_whitespace_names_are_quoted() {
        let dir = fixture();
        let candidates = AutocompleteResolver.complete(SessionId::new(1), "my", dir.path());
        assert_eq!(candidates, vec!["\"my notes.txt\"".to_string()]);
    }

    #[test]
    fn test_index_files_share_prefix() {
        let dir = fixture();
        let candidates = AutocompleteResolver.complete(SessionId::new(1), "ind", dir.path());
        assert_eq!(candidates, vec!["index.css".to_string(), "index.js".to_string()]);
    }

    #[test]
    fn test_missing_directory_yields_nothing() {
        let dir = fixture();
        let candidates =
            AutocompleteResolver.complete(SessionId::new(1), "nope/x", dir.path());
        assert!(candidates.is_empty());
    }
}
