//! Client-side completion policy: which word to complete and what to do with
//! the candidate list the resolver returns.

/// The word immediately before the cursor, as located by
/// [`word_before_cursor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionWord {
    /// Byte offset in the line where the word starts.
    pub start: usize,
    /// The word with surrounding whitespace removed.
    pub partial: String,
}

/// What the line editor should do with a set of candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionAction {
    /// Replace the word before the cursor with this text.
    Replace(String),
    /// Nothing can be inserted; show these display names instead.
    List(Vec<String>),
    /// No candidates.
    Nothing,
}

fn is_single_word(word: &str) -> bool {
    for quote in ['"', '\''] {
        let quoted = word
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
            .is_some_and(|inner| !inner.contains(quote));
        if quoted {
            return true;
        }
    }
    !word.is_empty() && !word.contains('"') && !word.chars().any(char::is_whitespace)
}

/// Finds the word ending at the end of `before_cursor`, ignoring trailing
/// whitespace. A quoted string counts as a single word; an unterminated
/// double quote does not.
pub fn word_before_cursor(before_cursor: &str) -> Option<CompletionWord> {
    let trimmed = before_cursor.trim_end();
    trimmed
        .char_indices()
        .map(|(start, _)| start)
        .find(|&start| is_single_word(&trimmed[start..]))
        .map(|start| CompletionWord {
            start,
            partial: trimmed[start..].to_string(),
        })
}

pub fn longest_common_prefix<S: AsRef<str>>(candidates: &[S]) -> String {
    let Some((first, rest)) = candidates.split_first() else {
        return String::new();
    };
    let mut prefix_len = first.as_ref().len();
    for candidate in rest {
        prefix_len = first
            .as_ref()
            .char_indices()
            .zip(candidate.as_ref().chars())
            .take_while(|((_, a), b)| a == b)
            .map(|((index, a), _)| index + a.len_utf8())
            .last()
            .unwrap_or(0)
            .min(prefix_len);
    }
    first.as_ref()[..prefix_len].to_string()
}

/// The last path segment of a candidate with quotes removed. Directory
/// candidates keep their trailing separator so they stay recognisable.
pub fn display_name(candidate: &str) -> String {
    let unquoted = candidate.replace('"', "");
    let is_dir = unquoted.ends_with(['/', '\\']);
    let trimmed = unquoted.trim_end_matches(['/', '\\']);
    let name = trimmed.rsplit(['/', '\\']).next().unwrap_or(trimmed);
    if is_dir {
        let separator = &unquoted[unquoted.len() - 1..];
        format!("{name}{separator}")
    } else {
        name.to_string()
    }
}

/// One candidate is inserted whole. Several candidates insert their longest
/// common prefix when it extends the typed word, otherwise they are listed.
pub fn apply_completions(partial: &str, candidates: &[String]) -> CompletionAction {
    match candidates {
        [] => CompletionAction::Nothing,
        [only] => CompletionAction::Replace(only.clone()),
        _ => {
            let prefix = longest_common_prefix(candidates);
            if prefix.chars().count() > partial.chars().count() {
                CompletionAction::Replace(prefix)
            } else {
                CompletionAction::List(candidates.iter().map(|c| display_name(c)).collect())
            }
        }
    }
}
