//! Compilation-wide file registry
//!
//! The set owns every parsed [`File`] and memoizes them by canonical path:
//! parsing the same resolved path twice hands back the same [`FileId`],
//! which is what makes handle equality meaningful across the import graph.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use super::{
    EnumDef, EnumId, File, FileId, Map, MapId, Message, MessageId, Service, ServiceId, SourceKind,
};

/// Owner of all parsed files in one compilation.
#[derive(Debug, Default)]
pub struct FileSet {
    files: Vec<File>,
    by_path: HashMap<PathBuf, FileId>,
    pending: HashSet<FileId>,
}

impl FileSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files, committed or pending.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the set holds no files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Look up a previously reserved or committed file by canonical path.
    pub fn lookup(&self, path: &Path) -> Option<FileId> {
        self.by_path.get(path).copied()
    }

    /// Whether a file has been reserved but not yet committed. A lookup
    /// hit on a pending file during import resolution means the import
    /// graph has a cycle.
    pub fn is_pending(&self, id: FileId) -> bool {
        self.pending.contains(&id)
    }

    /// Reserve an id for a file about to be parsed, registering its path
    /// so that recursive imports of the same path see it immediately.
    pub fn reserve(&mut self, path: PathBuf, kind: SourceKind) -> FileId {
        let id = FileId(self.files.len() as u32);
        self.files.push(File {
            path: path.clone(),
            kind,
            package: String::new(),
            messages: Vec::new(),
            enums: Vec::new(),
            maps: Vec::new(),
            services: Vec::new(),
            imports: Vec::new(),
        });
        self.by_path.insert(path, id);
        self.pending.insert(id);
        id
    }

    /// Commit a fully parsed file into a reserved slot. The file is
    /// immutable from this point on.
    pub fn commit(&mut self, id: FileId, file: File) {
        self.files[id.0 as usize] = file;
        self.pending.remove(&id);
    }

    /// The file behind a handle.
    pub fn file(&self, id: FileId) -> &File {
        &self.files[id.0 as usize]
    }

    /// All committed files, in parse order.
    pub fn files(&self) -> impl Iterator<Item = (FileId, &File)> {
        self.files
            .iter()
            .enumerate()
            .map(|(i, f)| (FileId(i as u32), f))
    }

    /// The message behind a handle.
    pub fn message(&self, id: MessageId) -> &Message {
        &self.file(id.file).messages[id.index as usize]
    }

    /// The enum behind a handle.
    pub fn enum_def(&self, id: EnumId) -> &EnumDef {
        &self.file(id.file).enums[id.index as usize]
    }

    /// The map behind a handle.
    pub fn map(&self, id: MapId) -> &Map {
        &self.file(id.file).maps[id.index as usize]
    }

    /// The service behind a handle.
    pub fn service(&self, id: ServiceId) -> &Service {
        &self.file(id.file).services[id.index as usize]
    }

    /// Handle for a message by position, used by front-ends while building.
    pub fn message_id(&self, file: FileId, index: usize) -> MessageId {
        MessageId {
            file,
            index: index as u32,
        }
    }

    /// Find a service by name across all files, in parse order.
    pub fn find_service(&self, name: &str) -> Option<ServiceId> {
        for (file_id, file) in self.files() {
            if let Some(index) = file.services.iter().position(|s| s.name == name) {
                return Some(ServiceId {
                    file: file_id,
                    index: index as u32,
                });
            }
        }
        None
    }

    /// Find a message by dotted type name across all files, in parse order.
    pub fn find_message(&self, type_name: &str) -> Option<MessageId> {
        for (file_id, file) in self.files() {
            if let Some(index) = file.messages.iter().position(|m| m.type_name == type_name) {
                return Some(MessageId {
                    file: file_id,
                    index: index as u32,
                });
            }
        }
        None
    }

    /// Dotted package-qualified name for a message, for diagnostics and
    /// generated identifiers.
    pub fn qualified_name(&self, id: MessageId) -> String {
        let file = self.file(id.file);
        let message = &file.messages[id.index as usize];
        if file.package.is_empty() {
            message.type_name.clone()
        } else {
            format!("{}.{}", file.package, message.type_name)
        }
    }
}
