#[cfg(test)]
mod tests;

use std::{
    collections::{btree_map, BTreeMap, HashMap, HashSet, VecDeque},
    path::{Path, PathBuf},
};

use log::{debug, warn};

use crate::{
    file::{self, FileDescriptor, FileState},
    parse, Error, ErrorRecord, ErrorSink, NodeKind, ProtoNode, DEFAULT_MAX_NESTING_DEPTH,
};

/// Holds the registered schema files and the merged package trees parsed from them.
///
/// Files are first registered by name with [`add_file`](DescriptorPool::add_file),
/// [`add_source`](DescriptorPool::add_source) or [`add_directory`](DescriptorPool::add_directory),
/// then queued with [`enqueue`](DescriptorPool::enqueue). Calling [`run`](DescriptorPool::run)
/// parses queued files in order, following their imports, until the queue is empty or a file fails.
///
/// Every file declaring the same package contributes to a single package tree.
#[derive(Debug)]
pub struct DescriptorPool {
    packages: BTreeMap<String, ProtoNode>,
    files: HashMap<String, FileDescriptor>,
    worklist: VecDeque<String>,
    queued: HashSet<String>,
    completed: HashSet<String>,
    stop_on_error: bool,
    max_nesting_depth: usize,
}

impl DescriptorPool {
    /// Creates a new, empty pool.
    pub fn new() -> Self {
        DescriptorPool {
            packages: BTreeMap::new(),
            files: HashMap::new(),
            worklist: VecDeque::new(),
            queued: HashSet::new(),
            completed: HashSet::new(),
            stop_on_error: true,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }

    /// Whether [`run`](DescriptorPool::run) should stop at the first file that fails. Defaults to `true`.
    ///
    /// When stopping, the failed file is left at the front of the queue. Otherwise it is removed and
    /// the remaining files are parsed, and `run` returns the first error once the queue is empty.
    /// Packages merged before a failure are kept in either case.
    pub fn stop_on_error(&mut self, yes: bool) -> &mut Self {
        self.stop_on_error = yes;
        self
    }

    /// The maximum depth to which messages may be nested. Defaults to
    /// [`DEFAULT_MAX_NESTING_DEPTH`](crate::DEFAULT_MAX_NESTING_DEPTH).
    pub fn max_nesting_depth(&mut self, depth: usize) -> &mut Self {
        self.max_nesting_depth = depth;
        self
    }

    /// Registers a file on disk under the given import name.
    ///
    /// If a file is already registered with this name, it is replaced.
    pub fn add_file(&mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> &mut Self {
        let name = name.into();
        let file = FileDescriptor::from_path(name.clone(), path.into());
        self.register(name, file);
        self
    }

    /// Registers a file with in-memory contents under the given import name.
    ///
    /// If a file is already registered with this name, it is replaced.
    pub fn add_source(&mut self, name: impl Into<String>, source: impl Into<String>) -> &mut Self {
        let name = name.into();
        let file = FileDescriptor::from_source(name.clone(), source.into());
        self.register(name, file);
        self
    }

    /// Registers every `.proto` file under `dir`, naming each by its path relative to `dir`.
    ///
    /// Names that are already registered, for example from an earlier directory, are left
    /// unchanged. Returns the names of the newly registered files, sorted by path.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn add_directory(&mut self, dir: impl AsRef<Path>) -> Result<Vec<String>, Error> {
        let mut added = Vec::new();
        for (name, path) in file::discover(dir.as_ref())? {
            if let Some(existing) = self.files.get(&name) {
                debug!(
                    "'{}' is shadowed by '{}'",
                    path.display(),
                    existing
                        .path()
                        .map_or_else(|| name.clone(), |path| path.display().to_string())
                );
                continue;
            }

            self.register(name.clone(), FileDescriptor::from_path(name.clone(), path));
            added.push(name);
        }
        Ok(added)
    }

    fn register(&mut self, name: String, file: FileDescriptor) {
        if self.files.insert(name.clone(), file).is_some() {
            debug!("replaced registration of '{}'", name);
        }
    }

    /// Adds a file to the back of the queue of files to parse.
    ///
    /// Does nothing if the file has already been parsed, is already queued, or previously failed.
    /// Returns `true` if the file was queued.
    pub fn enqueue(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.completed.contains(&name) || self.queued.contains(&name) {
            return false;
        }
        if self.file(&name).map(FileDescriptor::state) == Some(FileState::Failed) {
            warn!("not queueing '{}' as it previously failed", name);
            return false;
        }

        debug!("queueing '{}'", name);
        self.queued.insert(name.clone());
        self.worklist.push_back(name);
        true
    }

    fn dequeue(&mut self) {
        if let Some(name) = self.worklist.pop_front() {
            self.queued.remove(&name);
        }
    }

    /// The names of the files waiting to be parsed, in the order they will be processed.
    pub fn pending(&self) -> impl ExactSizeIterator<Item = &str> + '_ {
        self.worklist.iter().map(String::as_str)
    }

    /// Parses queued files until the queue is empty, following the imports of each parsed file.
    ///
    /// Each file that fails is reported to `sink` exactly once.
    ///
    /// # Errors
    ///
    /// Returns the error for the first file which failed. See
    /// [`stop_on_error`](DescriptorPool::stop_on_error) for what happens to the remaining files.
    pub fn run(&mut self, sink: &mut dyn ErrorSink) -> Result<(), Error> {
        let mut first_error = None;

        while let Some(name) = self.worklist.front().cloned() {
            match self.parse_next(&name) {
                Ok(()) => self.dequeue(),
                Err(err) => {
                    warn!("failed to parse '{}': {}", name, err);
                    sink.report(&ErrorRecord::from(&err));
                    if let Some(file) = self.files.get_mut(&name) {
                        file.set_failed();
                    }

                    if self.stop_on_error {
                        return Err(err);
                    }
                    self.dequeue();
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn parse_next(&mut self, name: &str) -> Result<(), Error> {
        debug!("parsing '{}'", name);

        let parsed = {
            let file = self
                .files
                .get(name)
                .ok_or_else(|| Error::import_not_found(name))?;
            let source = file.read_source()?;
            parse::parse_with_limit(name, &source, self.max_nesting_depth)?
        };

        let (syntax, package, imports) = parsed.into_parts();
        let package_name = package.name().to_owned();
        self.merge_package(package);

        if let Some(file) = self.files.get_mut(name) {
            file.set_parsed(syntax, package_name, imports.clone());
        }
        self.completed.insert(name.to_owned());

        for import in imports {
            self.enqueue(import);
        }
        Ok(())
    }

    /// Merges a package tree into the pool.
    ///
    /// If the pool has no package with this name, the tree is added as-is. Otherwise its children
    /// are moved to the end of the existing package's children.
    pub fn merge_package(&mut self, package: ProtoNode) {
        debug_assert_eq!(package.kind(), NodeKind::Package);

        match self.packages.entry(package.name().to_owned()) {
            btree_map::Entry::Occupied(mut entry) => {
                debug!(
                    "merging {} definitions into package '{}'",
                    package.children().len(),
                    entry.key()
                );
                entry.get_mut().merge_children_from(package);
            }
            btree_map::Entry::Vacant(entry) => {
                debug!("adding package '{}'", entry.key());
                entry.insert(package);
            }
        }
    }

    /// Iterates over the package trees, ordered by package name.
    pub fn packages(&self) -> impl ExactSizeIterator<Item = &ProtoNode> + '_ {
        self.packages.values()
    }

    /// Gets the tree for the package with the given name. The default package is named `""`.
    pub fn package(&self, name: &str) -> Option<&ProtoNode> {
        self.packages.get(name)
    }

    /// Gets a registered file by name.
    pub fn file(&self, name: &str) -> Option<&FileDescriptor> {
        self.files.get(name)
    }

    /// Iterates over all registered files, in arbitrary order.
    pub fn files(&self) -> impl ExactSizeIterator<Item = &FileDescriptor> + '_ {
        self.files.values()
    }

    /// Finds a message by its fully-qualified name, such as `foo.bar.Outer.Inner`. A leading `.`
    /// is allowed.
    pub fn lookup_message(&self, name: &str) -> Option<&ProtoNode> {
        self.lookup(name, |kind| kind == NodeKind::Message)
    }

    /// Finds an enum by its fully-qualified name.
    pub fn lookup_enum(&self, name: &str) -> Option<&ProtoNode> {
        self.lookup(name, |kind| kind == NodeKind::Enum)
    }

    /// Finds a service by its fully-qualified name.
    pub fn lookup_service(&self, name: &str) -> Option<&ProtoNode> {
        self.lookup(name, |kind| kind == NodeKind::Service)
    }

    fn lookup(&self, name: &str, is_match: impl Fn(NodeKind) -> bool) -> Option<&ProtoNode> {
        let name = name.strip_prefix('.').unwrap_or(name);

        // Packages may contain dots, so try each split point, longest package first.
        for (index, _) in name.rmatch_indices('.') {
            if let Some(package) = self.packages.get(&name[..index]) {
                if let Some(node) = package.find_path(&name[index + 1..], &is_match) {
                    return Some(node);
                }
            }
        }

        self.packages
            .get("")
            .and_then(|package| package.find_path(name, &is_match))
    }
}

impl Default for DescriptorPool {
    fn default() -> Self {
        DescriptorPool::new()
    }
}
