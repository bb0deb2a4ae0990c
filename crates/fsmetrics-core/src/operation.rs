//! Operation identifiers recorded by the snapshotter filesystem.

use std::fmt;

/// Mount of a snapshot layer.
pub const MOUNT: &str = "mount";

/// Fetch of a blob range from the remote registry.
pub const REMOTE_REGISTRY_GET: &str = "remote_registry_get";

/// Directory listing of a filesystem node.
pub const NODE_READDIR: &str = "node_readdir";

/// Filesystem operation type for the `operation_type` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsOperation {
    /// Mount operation.
    Mount,
    /// Remote registry fetch.
    RemoteRegistryGet,
    /// Directory read.
    NodeReaddir,
}

impl FsOperation {
    /// Every known operation.
    pub const ALL: [FsOperation; 3] = [
        FsOperation::Mount,
        FsOperation::RemoteRegistryGet,
        FsOperation::NodeReaddir,
    ];

    /// Label value for this operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            FsOperation::Mount => MOUNT,
            FsOperation::RemoteRegistryGet => REMOTE_REGISTRY_GET,
            FsOperation::NodeReaddir => NODE_READDIR,
        }
    }
}

impl fmt::Display for FsOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
