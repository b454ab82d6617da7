use std::{
    ffi::OsStr,
    path::{self, Path, PathBuf},
};

use log::debug;
use walkdir::WalkDir;

use crate::{error::ErrorKind, Error};

/// Finds every `.proto` file under `dir`, returning each file's name relative to `dir` along
/// with its absolute path. Files are returned in a stable order, sorted by path.
pub(crate) fn discover(dir: &Path) -> Result<Vec<(String, PathBuf)>, Error> {
    let root = dir.canonicalize().map_err(|err| {
        Error::from_kind(ErrorKind::OpenFile {
            name: dir.display().to_string(),
            path: dir.to_owned(),
            err,
        })
    })?;

    let mut files = Vec::new();
    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = entry.map_err(|err| {
            Error::from_kind(ErrorKind::ReadDirectory {
                path: dir.to_owned(),
                err,
            })
        })?;

        if !entry.file_type().is_file() || entry.path().extension() != Some(OsStr::new("proto")) {
            continue;
        }

        let name = entry
            .path()
            .strip_prefix(&root)
            .ok()
            .and_then(path_to_file_name);
        match name {
            Some(name) => files.push((name, entry.into_path())),
            None => debug!(
                "skipping '{}' as it has no valid file name",
                entry.path().display()
            ),
        }
    }

    Ok(files)
}

/// Converts a relative path to a file name, joining its components with '/'.
pub(crate) fn path_to_file_name(path: &Path) -> Option<String> {
    let mut name = String::new();
    for component in path.components() {
        match component {
            path::Component::Normal(component) => {
                if let Some(component) = component.to_str() {
                    if !name.is_empty() {
                        name.push('/');
                    }
                    name.push_str(component);
                } else {
                    return None;
                }
            }
            _ => return None,
        }
    }

    Some(name)
}
