//! Command-line parsing: the `cd` builtin, tokenization and `cd` target
//! resolution.

use std::path::Component;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// How a command line is split into program and arguments.
///
/// `Naive` splits on whitespace and rejoins with single spaces before the
/// shell sees the line, so quoted runs of spaces collapse. `ShellWords`
/// honours quotes and re-quotes each argument.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerMode {
    #[default]
    Naive,
    ShellWords,
}

impl FromStr for TokenizerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "naive" => Ok(TokenizerMode::Naive),
            "shell" | "shell-words" | "shell_words" => Ok(TokenizerMode::ShellWords),
            other => Err(format!("unknown tokenizer '{other}' (expected naive or shell)")),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenizeError {
    #[error("Unterminated quote in command line")]
    UnterminatedQuote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    Empty,
    ChangeDirectory {
        target: String,
    },
    Program {
        program: String,
        args: Vec<String>,
        /// The line handed to the shell.
        command_line: String,
    },
}

pub fn tokenize(line: &str, mode: TokenizerMode) -> Result<Vec<String>, TokenizeError> {
    match mode {
        TokenizerMode::Naive => Ok(line.split_whitespace().map(str::to_string).collect()),
        TokenizerMode::ShellWords => {
            shell_words::split(line).map_err(|_| TokenizeError::UnterminatedQuote)
        }
    }
}

fn render(tokens: &[String], mode: TokenizerMode) -> String {
    match mode {
        TokenizerMode::Naive => tokens.join(" "),
        TokenizerMode::ShellWords => shell_words::join(tokens),
    }
}

pub fn parse_command(line: &str, mode: TokenizerMode) -> Result<ParsedCommand, TokenizeError> {
    let tokens = tokenize(line.trim(), mode)?;
    let Some((program, args)) = tokens.split_first() else {
        return Ok(ParsedCommand::Empty);
    };
    if program == "cd" {
        return Ok(ParsedCommand::ChangeDirectory {
            target: args.join(" "),
        });
    }
    Ok(ParsedCommand::Program {
        program: program.clone(),
        args: args.to_vec(),
        command_line: render(&tokens, mode),
    })
}

/// Resolves a `cd` argument: empty or `~` is home, `~/x` is relative to
/// home, anything else is relative to `cwd`. Without a home directory the
/// home forms resolve against `cwd`.
pub fn resolve_cd_target(target: &str, cwd: &Path, home: Option<&Path>) -> PathBuf {
    let target = target.trim();
    let home = home.unwrap_or(cwd);
    let joined = if target.is_empty() || target == "~" {
        home.to_path_buf()
    } else if let Some(rest) = target
        .strip_prefix("~/")
        .or_else(|| target.strip_prefix("~\\"))
    {
        home.join(rest)
    } else {
        cwd.join(target)
    };
    normalize_lexically(&joined)
}

/// Removes `.` and folds `..` without touching the filesystem, so symlinked
/// directories keep the path the user typed.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_line() {
        assert_eq!(
            parse_command("   ", TokenizerMode::Naive),
            Ok(ParsedCommand::Empty)
        );
    }

    #[test]
    fn test_cd_is_case_sensitive() {
        assert_eq!(
            parse_command("cd  my   dir", TokenizerMode::Naive),
            Ok(ParsedCommand::ChangeDirectory {
                target: "my dir".to_string()
            })
        );
        assert!(matches!(
            parse_command("CD tmp", TokenizerMode::Naive),
            Ok(ParsedCommand::Program { .. })
        ));
    }

    #[test]
    fn test_naive_collapses_whitespace() {
        let parsed = parse_command("echo  'a   b'", TokenizerMode::Naive).unwrap();
        let ParsedCommand::Program {
            program,
            args,
            command_line,
        } = parsed
        else {
            panic!("expected program");
        };
        assert_eq!(program, "echo");
        assert_eq!(args, vec!["'a".to_string(), "b'".to_string()]);
        assert_eq!(command_line, "echo 'a b'");
    }

    #[test]
    fn test_shell_words_preserves_quoting() {
        let parsed = parse_command("echo  'a   b'", TokenizerMode::ShellWords).unwrap();
        let ParsedCommand::Program {
            args, command_line, ..
        } = parsed
        else {
            panic!("expected program");
        };
        assert_eq!(args, vec!["a   b".to_string()]);
        assert_eq!(command_line, "echo 'a   b'");
    }

    #[test]
    fn test_shell_words_unterminated_quote() {
        assert_eq!(
            parse_command("echo \"oops", TokenizerMode::ShellWords),
            Err(TokenizeError::UnterminatedQuote)
        );
    }

    #[test]
    fn test_tokenizer_mode_from_str() {
        assert_eq!("shell".parse(), Ok(TokenizerMode::ShellWords));
        assert_eq!(" Naive ".parse(), Ok(TokenizerMode::Naive));
        assert!("posix".parse::<TokenizerMode>().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_cd_targets() {
        let cwd = Path::new("/work/project");
        let home = Path::new("/home/dev");
        assert_eq!(resolve_cd_target("", cwd, Some(home)), PathBuf::from("/home/dev"));
        assert_eq!(resolve_cd_target("~", cwd, Some(home)), PathBuf::from("/home/dev"));
        assert_eq!(
            resolve_cd_target("~/src", cwd, Some(home)),
            PathBuf::from("/home/dev/src")
        );
        assert_eq!(
            resolve_cd_target("../other/./x", cwd, Some(home)),
            PathBuf::from("/work/other/x")
        );
        assert_eq!(resolve_cd_target("/tmp", cwd, None), PathBuf::from("/tmp"));
        assert_eq!(resolve_cd_target("~", cwd, None), PathBuf::from("/work/project"));
    }

    #[cfg(unix)]
    #[test]
    fn test_normalize_does_not_escape_root() {
        assert_eq!(normalize_lexically(Path::new("/../..")), PathBuf::from("/"));
    }
}
