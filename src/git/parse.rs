//! Pure parsers from raw git output into snapshot fields
//!
//! Nothing here runs a process. Each parser handles one command's stdout.

use super::snapshot::CommitInfo;

/// Trimmed, non-empty lines of a `--name-only` style listing
pub fn file_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Branch name from `rev-parse --abbrev-ref HEAD`
pub fn branch(stdout: &str) -> Option<String> {
    let name = stdout.lines().next()?.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// `hash|subject|author|iso-date` from `log -1 --pretty=format:%H|%s|%an|%ad`
///
/// The subject may itself contain `|`, so the hash is split from the left and
/// author and date from the right.
pub fn commit_line(stdout: &str) -> Option<CommitInfo> {
    let line = stdout.lines().next()?.trim_end();
    let (hash, rest) = line.split_once('|')?;
    let (rest, date) = rest.rsplit_once('|')?;
    let (message, author) = rest.rsplit_once('|')?;

    if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    Some(CommitInfo {
        hash: hash.to_string(),
        message: message.to_string(),
        author: author.to_string(),
        date: date.trim().to_string(),
        error: None,
    })
}

/// Unmerged paths from `status --porcelain`
pub fn conflicted_files(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter(|line| line.len() > 3)
        .filter_map(|line| {
            let (code, path) = line.split_at(2);
            let unmerged = matches!(code, "DD" | "AU" | "UD" | "UA" | "DU" | "AA" | "UU");
            unmerged.then(|| path.trim().to_string())
        })
        .collect()
}

/// Integer from `rev-list --count`
pub fn count(stdout: &str) -> Option<u64> {
    stdout.trim().parse().ok()
}
