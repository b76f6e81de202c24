//! Open-file handles.

use ufmt::derive::uDebug;

use crate::consts::{Fname, Lba, LBA_NULL};

/// How a handle may be used. Modes are mutually exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, uDebug)]
pub enum OpenMode {
    Read,
    Write,
    Append,
}

/// An open-file cursor.
///
/// Handles are cheap, transient values: `open_*` creates one,
/// [`Filesystem::write`] stages a run of blocks through it, and
/// [`Filesystem::close`] commits the run to the allocation table. A
/// handle never touches the table itself; dropping one without closing
/// abandons the staged blocks until the next format reclaims them.
///
/// [`Filesystem::write`]: crate::fs::Filesystem::write
/// [`Filesystem::close`]: crate::fs::Filesystem::close
#[derive(Clone, Copy, Debug)]
pub struct FileHandle {
    pub(crate) filename: Fname,
    pub(crate) filesize: usize,
    pub(crate) mode: OpenMode,
    pub(crate) first_block: Lba,
    pub(crate) last_block: Lba,
}

impl FileHandle {
    pub(crate) fn new(filename: Fname, mode: OpenMode) -> Self {
        FileHandle {
            filename,
            filesize: 0,
            mode,
            first_block: LBA_NULL,
            last_block: LBA_NULL,
        }
    }

    /// The name the handle was opened under, after folding.
    pub fn filename(&self) -> Fname {
        self.filename
    }

    /// Payload length in bytes: the on-record size for read handles, the
    /// staged (for append: merged) size after a write.
    pub fn len(&self) -> usize {
        self.filesize
    }

    pub fn is_empty(&self) -> bool {
        self.filesize == 0
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }
}
