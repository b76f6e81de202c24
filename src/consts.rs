//! Compile-time layout configuration.
//!
//! The filesystem is configured at build time, the way the original AVR
//! deployments bake their geometry into the firmware image. `mount`
//! compares the metadata header on the medium against these values and
//! quick-formats on any mismatch, so changing them here re-deploys
//! cleanly at the cost of the stored files.

/// Logical block address. Signed so that [`LBA_NULL`] can mark
/// end-of-chain.
pub type Lba = i16;

/// File name: a small unsigned integer, folded into `[0, MAX_FILES)` by
/// modulo when out of range.
pub type Fname = u16;

/// End-of-chain marker, also "no file" in an allocation entry.
pub const LBA_NULL: Lba = -1;

/// First byte of the filesystem in the storage address space.
pub const FS_START: usize = 0x0;

/// Total bytes of the medium managed by the filesystem.
pub const FS_SIZE: usize = 2048;

/// Bytes per block, chain link included.
pub const BLOCK_SIZE: usize = 32;

/// Cap on the number of blocks a single file may occupy.
pub const MAX_BLOCKS_PER_FILE: usize = 8;

/// Number of file names. A prime is recommended, but not mandatory; it
/// spreads the modulo folding of application-chosen IDs.
pub const MAX_FILES: usize = 29;

/// Bytes of the `next` link at the head of each block.
pub const LBA_SIZE: usize = core::mem::size_of::<Lba>();

/// Payload bytes per block.
pub const BLOCK_DATA_SIZE: usize = BLOCK_SIZE - LBA_SIZE;

/// Largest payload a single file can hold.
pub const MAX_FILE_BYTES: usize = MAX_BLOCKS_PER_FILE * BLOCK_DATA_SIZE;

// On-medium layout, offsets relative to FS_START.

/// Offset of the metadata header.
pub const META_OFFSET: usize = 0;

/// Encoded size of the metadata header.
pub const META_SIZE: usize = 8;

/// Offset of the allocation table.
pub const ALLOC_TABLE_OFFSET: usize = META_OFFSET + META_SIZE;

/// Encoded size of one allocation entry.
pub const ALLOC_ENTRY_SIZE: usize = 4;

/// Encoded size of the allocation table, free-chain sentinel included.
pub const ALLOC_TABLE_SIZE: usize = (MAX_FILES + 1) * ALLOC_ENTRY_SIZE;

/// Offset of the block pool.
pub const DATA_OFFSET: usize = ALLOC_TABLE_OFFSET + ALLOC_TABLE_SIZE;

/// Number of blocks in the pool.
pub const NUM_BLOCKS: usize = (FS_SIZE - DATA_OFFSET) / BLOCK_SIZE;
