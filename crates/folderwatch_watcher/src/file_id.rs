//! Entry identity used to pair removals with creations (rename/move detection).

use std::fs::Metadata;

/// Device and inode of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId {
    pub device: u64,
    pub inode: u64,
}

/// Identity of the entry behind `metadata`, where the platform exposes one.
///
/// Without an identity a rename surfaces as a Remove plus a Create.
pub fn file_id(metadata: &Metadata) -> Option<FileId> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        Some(FileId {
            device: metadata.dev(),
            inode: metadata.ino(),
        })
    }

    #[cfg(not(unix))]
    {
        let _ = metadata;
        None
    }
}

/// Permission bits, used to detect chmod-only changes.
pub fn mode_bits(metadata: &Metadata) -> u32 {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode()
    }

    #[cfg(not(unix))]
    {
        u32::from(metadata.permissions().readonly())
    }
}
