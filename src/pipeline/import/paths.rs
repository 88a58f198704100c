use std::path::{Path, PathBuf};

use super::ImportError;
use crate::config::STORAGE_ROOT;

/// Storage path for an agency file:
/// `agency_attachments/<agency>/<optional-subpath>/<filename>`.
pub fn document_file_path(agency: &str, relative: &str) -> String {
    let relative = relative.replace('\\', "/");
    let mut path = format!("{STORAGE_ROOT}/{agency}");
    for part in relative.split('/').filter(|p| !p.is_empty() && *p != ".") {
        path.push('/');
        path.push_str(part);
    }
    path
}

/// Cut any host prefix off a path so it starts at the storage root, e.g.
/// `/mnt/data/agency_attachments/Kent/a.pdf` -> `agency_attachments/Kent/a.pdf`.
pub fn normalize_storage_path(path: &str) -> Result<String, ImportError> {
    let unified = path.replace('\\', "/");
    let parts: Vec<&str> = unified
        .split('/')
        .filter(|p| !p.is_empty() && *p != ".")
        .collect();

    let Some(root) = parts.iter().rposition(|p| *p == STORAGE_ROOT) else {
        return Err(ImportError::InvalidPath(path.to_string()));
    };
    let tail = &parts[root..];
    if tail.len() < 3 || tail.contains(&"..") {
        return Err(ImportError::InvalidPath(path.to_string()));
    }
    Ok(tail.join("/"))
}

/// Split a storage path into (agency, path under the agency directory).
pub fn split_storage_path(path: &str) -> Option<(&str, &str)> {
    let rest = path.strip_prefix(STORAGE_ROOT)?.strip_prefix('/')?;
    let (agency, relative) = rest.split_once('/')?;
    if agency.is_empty() || relative.is_empty() {
        return None;
    }
    Some((agency, relative))
}

/// Where a storage path lives on disk under the media root.
pub fn disk_path(media_root: &Path, storage_path: &str) -> PathBuf {
    storage_path
        .split('/')
        .fold(media_root.to_path_buf(), |acc, part| acc.join(part))
}

/// File name part of a storage path.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_storage_paths() {
        assert_eq!(
            document_file_path("Kent", "letter.pdf"),
            "agency_attachments/Kent/letter.pdf"
        );
        assert_eq!(
            document_file_path("Kent", "2020/./jan//letter.pdf"),
            "agency_attachments/Kent/2020/jan/letter.pdf"
        );
        assert_eq!(
            document_file_path("Kent", "2020\\letter.pdf"),
            "agency_attachments/Kent/2020/letter.pdf"
        );
    }

    #[test]
    fn normalizes_host_prefix() {
        assert_eq!(
            normalize_storage_path("/mnt/data/agency_attachments/Kent/letter.pdf").unwrap(),
            "agency_attachments/Kent/letter.pdf"
        );
        assert_eq!(
            normalize_storage_path("agency_attachments/Kent/sub/letter.pdf").unwrap(),
            "agency_attachments/Kent/sub/letter.pdf"
        );
    }

    #[test]
    fn rejects_invalid_paths() {
        assert!(normalize_storage_path("/tmp/letter.pdf").is_err());
        assert!(normalize_storage_path("agency_attachments/Kent").is_err());
        assert!(normalize_storage_path("agency_attachments/Kent/../x.pdf").is_err());
    }

    #[test]
    fn splits_agency_and_relative() {
        assert_eq!(
            split_storage_path("agency_attachments/Kent/2020/letter.pdf"),
            Some(("Kent", "2020/letter.pdf"))
        );
        assert_eq!(split_storage_path("agency_attachments/Kent"), None);
        assert_eq!(split_storage_path("elsewhere/Kent/letter.pdf"), None);
    }

    #[test]
    fn disk_path_joins_components() {
        let path = disk_path(Path::new("/media"), "agency_attachments/Kent/letter.pdf");
        assert_eq!(path, Path::new("/media/agency_attachments/Kent/letter.pdf"));
    }
}
