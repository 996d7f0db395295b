//! Data directory layout
//!
//! Logs live under `data_dir/<user>/*.csv`, one file per task. A user's tasks
//! are numbered from 1 in the order of the six-digit `HHMMSS` suffix at the end
//! of each file name, e.g. `ks_drag_0803-121820.csv`. When the data directory
//! has no user folders, the CSV files at its root are the tasks.

use crate::error::AnalyzerError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Sort key used for files without a time suffix
const DEFAULT_SUFFIX: &str = "000000";

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> AnalyzerError + '_ {
    move |source| AnalyzerError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

/// Sorted, non-hidden user folders under `data_dir`. A missing directory has no users.
pub fn list_users(data_dir: &Path) -> Result<Vec<String>, AnalyzerError> {
    if !data_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut users = Vec::new();
    for entry in std::fs::read_dir(data_dir).map_err(io_error(data_dir))? {
        let entry = entry.map_err(io_error(data_dir))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.path().is_dir() && !is_hidden(&name) {
            users.push(name);
        }
    }
    users.sort();
    Ok(users)
}

/// CSV files directly inside `dir`, in task order
pub fn task_files(dir: &Path) -> Result<Vec<PathBuf>, AnalyzerError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_error(dir))? {
        let path = entry.map_err(io_error(dir))?.path();
        if path.is_file() && is_csv(&path) {
            files.push(path);
        }
    }
    sort_by_time_suffix(&mut files);
    Ok(files)
}

/// The six-digit time suffix of a file name, or `000000`
pub fn time_suffix(path: &Path) -> &str {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    let token = stem.rsplit(|c: char| c == '-' || c == '_').next().unwrap_or_default();
    if token.len() == 6 && token.bytes().all(|b| b.is_ascii_digit()) {
        token
    } else {
        DEFAULT_SUFFIX
    }
}

/// Order files by time suffix, then by file name
pub fn sort_by_time_suffix(files: &mut [PathBuf]) {
    files.sort_by(|a, b| {
        time_suffix(a)
            .cmp(time_suffix(b))
            .then_with(|| a.file_name().cmp(&b.file_name()))
    });
}

/// The `task`-th file (1-based) of each user that has one, in user order
pub fn task_files_for_users<S: AsRef<str>>(
    data_dir: &Path,
    task: usize,
    users: &[S],
) -> Result<Vec<PathBuf>, AnalyzerError> {
    if task == 0 {
        return Ok(Vec::new());
    }
    let mut selected = Vec::new();
    for user in users {
        let files = task_files(&data_dir.join(user.as_ref()))?;
        match files.into_iter().nth(task - 1) {
            Some(path) => selected.push(path),
            None => debug!("User {} has no task {}", user.as_ref(), task),
        }
    }
    Ok(selected)
}

/// Largest number of tasks any user has
pub fn max_task_count(data_dir: &Path) -> Result<usize, AnalyzerError> {
    let users = list_users(data_dir)?;
    if users.is_empty() {
        return Ok(task_files(data_dir)?.len());
    }
    let mut max = 0;
    for user in &users {
        max = max.max(task_files(&data_dir.join(user))?.len());
    }
    Ok(max)
}

/// Number of CSV files in a user's folder
pub fn user_file_count(data_dir: &Path, user: &str) -> Result<usize, AnalyzerError> {
    Ok(task_files(&data_dir.join(user))?.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("touch-layout-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "Time(ms),TouchX,TouchY,Layer Name\n").unwrap();
    }

    fn names(files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_time_suffix() {
        assert_eq!(time_suffix(Path::new("ks_drag_0803-121820.csv")), "121820");
        assert_eq!(time_suffix(Path::new("run_093000.csv")), "093000");
        assert_eq!(time_suffix(Path::new("notes.csv")), "000000");
        assert_eq!(time_suffix(Path::new("x-12345.csv")), "000000");
    }

    #[test]
    fn test_task_order_and_selection() {
        let dir = temp_dir();
        touch(&dir.join("alice/a_0803-150000.csv"));
        touch(&dir.join("alice/b_0803-090000.csv"));
        touch(&dir.join("alice/c_0803-120000.csv"));
        touch(&dir.join("alice/readme.txt"));
        touch(&dir.join("bob/z_0803-080000.csv"));
        std::fs::create_dir_all(dir.join(".hidden")).unwrap();

        assert_eq!(list_users(&dir).unwrap(), vec!["alice", "bob"]);
        assert_eq!(
            names(&task_files(&dir.join("alice")).unwrap()),
            vec!["b_0803-090000.csv", "c_0803-120000.csv", "a_0803-150000.csv"]
        );

        let task2 = task_files_for_users(&dir, 2, &["alice", "bob"]).unwrap();
        assert_eq!(names(&task2), vec!["c_0803-120000.csv"]);
        let task1 = task_files_for_users(&dir, 1, &["alice", "bob"]).unwrap();
        assert_eq!(names(&task1), vec!["b_0803-090000.csv", "z_0803-080000.csv"]);
        assert!(task_files_for_users(&dir, 0, &["alice"]).unwrap().is_empty());

        assert_eq!(max_task_count(&dir).unwrap(), 3);
        assert_eq!(user_file_count(&dir, "alice").unwrap(), 3);
        assert_eq!(user_file_count(&dir, "nobody").unwrap(), 0);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_root_level_files_without_users() {
        let dir = temp_dir();
        touch(&dir.join("one.csv"));
        touch(&dir.join("two.csv"));
        assert!(list_users(&dir).unwrap().is_empty());
        assert_eq!(max_task_count(&dir).unwrap(), 2);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_data_dir() {
        let dir = std::env::temp_dir().join(format!("touch-layout-none-{}", uuid::Uuid::new_v4()));
        assert!(list_users(&dir).unwrap().is_empty());
        assert_eq!(max_task_count(&dir).unwrap(), 0);
    }
}
