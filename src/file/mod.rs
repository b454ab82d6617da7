//! Protobuf schema files registered with a [`DescriptorPool`](crate::DescriptorPool).
mod include;

pub(crate) use self::include::discover;

use std::{
    borrow::Cow,
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
};

use crate::{error::ErrorKind, Error, MAX_FILE_LEN};

/// The syntax version of a schema file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Syntax {
    /// `proto2`, which is assumed when a file has no syntax statement.
    #[default]
    Proto2,
    /// `proto3`.
    Proto3,
}

/// The progress of a file through the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileState {
    /// The file is known to the pool, but has not been parsed.
    Registered,
    /// The file was parsed and its package tree merged into the pool.
    Parsed,
    /// The file could not be read or parsed.
    Failed,
}

/// A schema file known to a pool, along with what was learned by parsing it.
#[derive(Debug, Clone)]
pub struct FileDescriptor {
    name: String,
    path: Option<PathBuf>,
    source: Option<String>,
    package_name: String,
    syntax: Syntax,
    dependencies: Vec<String>,
    state: FileState,
}

impl Syntax {
    /// The numeric syntax version, either `2` or `3`.
    pub fn version(self) -> u8 {
        match self {
            Syntax::Proto2 => 2,
            Syntax::Proto3 => 3,
        }
    }
}

impl FileDescriptor {
    pub(crate) fn from_path(name: String, path: PathBuf) -> Self {
        FileDescriptor::new(name, Some(path), None)
    }

    pub(crate) fn from_source(name: String, source: String) -> Self {
        FileDescriptor::new(name, None, Some(source))
    }

    fn new(name: String, path: Option<PathBuf>, source: Option<String>) -> Self {
        FileDescriptor {
            name,
            path,
            source,
            package_name: String::new(),
            syntax: Syntax::default(),
            dependencies: Vec::new(),
            state: FileState::Registered,
        }
    }

    /// The unique name of this file, as used in import statements.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// If this is a physical file on the filesystem, the path to the file.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// If this file was registered from a string, its contents.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// The package declared by the file. This is empty until the file is parsed, and for files
    /// in the default package.
    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    /// The syntax declared by the file.
    pub fn syntax(&self) -> Syntax {
        self.syntax
    }

    /// The names of the files imported by this file, in declaration order.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Whether the file has been parsed yet, and whether parsing succeeded.
    pub fn state(&self) -> FileState {
        self.state
    }

    pub(crate) fn set_parsed(
        &mut self,
        syntax: Syntax,
        package_name: String,
        dependencies: Vec<String>,
    ) {
        self.syntax = syntax;
        self.package_name = package_name;
        self.dependencies = dependencies;
        self.state = FileState::Parsed;
    }

    pub(crate) fn set_failed(&mut self) {
        self.state = FileState::Failed;
    }

    /// Gets the contents of the file, reading it from disk if necessary.
    pub(crate) fn read_source(&self) -> Result<Cow<'_, str>, Error> {
        match (&self.source, &self.path) {
            (Some(source), _) => Ok(Cow::Borrowed(source)),
            (None, Some(path)) => read_file(&self.name, path).map(Cow::Owned),
            (None, None) => Err(Error::import_not_found(&self.name)),
        }
    }
}

fn read_file(name: &str, path: &Path) -> Result<String, Error> {
    let map_io_err = |err: io::Error| -> Error {
        Error::from_kind(ErrorKind::OpenFile {
            name: name.to_owned(),
            path: path.to_owned(),
            err,
        })
    };

    let file = fs::File::open(path).map_err(map_io_err)?;
    let metadata = file.metadata().map_err(map_io_err)?;

    if metadata.len() > MAX_FILE_LEN {
        return Err(Error::from_kind(ErrorKind::FileTooLarge {
            name: name.to_owned(),
        }));
    }

    let mut buf = Vec::with_capacity(metadata.len() as usize);
    file.take(MAX_FILE_LEN)
        .read_to_end(&mut buf)
        .map_err(map_io_err)?;

    String::from_utf8(buf).map_err(|_| {
        Error::from_kind(ErrorKind::FileInvalidUtf8 {
            name: name.to_owned(),
        })
    })
}
