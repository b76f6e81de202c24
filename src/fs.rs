/*! Filesystem manipulation operations.

Start with [`Filesystem::mount`] or [`Filesystem::format`] to obtain an
instance owning the RAM allocation-table cache, then move payload through
[`FileHandle`](crate::file::FileHandle)s. All operations take the
storage driver by `&mut` so multiple filesystems at different media can
coexist.
*/

use core::cmp;

use log::{debug, error, info, trace};
use ufmt::{derive::uDebug, uwrite, uWrite};

use crate::{
    consts::*,
    driver::Storage,
    file::{FileHandle, OpenMode},
    io::{Error, Result},
};

/// How much of the medium a format touches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, uDebug)]
pub enum FormatMode {
    /// Rewrite every block whole, zeroing payloads.
    Full,
    /// Rewrite only the chain links, leaving payloads in place.
    Quick,
    /// Zero the entire medium first, then quick-format.
    Wipe,
}

/// The format-time parameters recorded at the head of the medium.
///
/// `mount` compares the stored copy against [`Metadata::CURRENT`] and
/// quick-formats when any field disagrees.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Metadata {
    pub block_size: u16,
    pub start_address: u16,
    pub fs_size: u16,
    pub max_files: u8,
    pub max_blocks_per_file: u8,
}

impl Metadata {
    /// The parameters this build was compiled with.
    pub const CURRENT: Self = Metadata {
        block_size: BLOCK_SIZE as u16,
        start_address: FS_START as u16,
        fs_size: FS_SIZE as u16,
        max_files: MAX_FILES as u8,
        max_blocks_per_file: MAX_BLOCKS_PER_FILE as u8,
    };

    fn to_bytes(self) -> [u8; META_SIZE] {
        let mut buf = [0u8; META_SIZE];
        buf[0..2].copy_from_slice(&self.block_size.to_le_bytes());
        buf[2..4].copy_from_slice(&self.start_address.to_le_bytes());
        buf[4..6].copy_from_slice(&self.fs_size.to_le_bytes());
        buf[6] = self.max_files;
        buf[7] = self.max_blocks_per_file;
        buf
    }

    fn from_bytes(buf: [u8; META_SIZE]) -> Self {
        Metadata {
            block_size: u16::from_le_bytes([buf[0], buf[1]]),
            start_address: u16::from_le_bytes([buf[2], buf[3]]),
            fs_size: u16::from_le_bytes([buf[4], buf[5]]),
            max_files: buf[6],
            max_blocks_per_file: buf[7],
        }
    }
}

/// One allocation-table slot: payload length and first block of the
/// file's chain, [`LBA_NULL`] when the name holds no file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllocEntry {
    pub filesize: usize,
    pub first_block: Lba,
}

impl AllocEntry {
    const NULL: Self = AllocEntry {
        filesize: 0,
        first_block: LBA_NULL,
    };

    fn to_bytes(self) -> [u8; ALLOC_ENTRY_SIZE] {
        let mut buf = [0u8; ALLOC_ENTRY_SIZE];
        buf[0..2].copy_from_slice(&(self.filesize as u16).to_le_bytes());
        buf[2..4].copy_from_slice(&self.first_block.to_le_bytes());
        buf
    }

    fn from_bytes(buf: [u8; ALLOC_ENTRY_SIZE]) -> Self {
        AllocEntry {
            filesize: u16::from_le_bytes([buf[0], buf[1]]) as usize,
            first_block: Lba::from_le_bytes([buf[2], buf[3]]),
        }
    }
}

/// The filesystem instance: the RAM cache of the allocation table, with
/// the free-chain head in the sentinel slot at index [`MAX_FILES`].
///
/// The cache equals the persisted table between API calls; mutations
/// mirror the touched entries through the driver's `update` primitive so
/// unchanged table bytes cost no wear.
pub struct Filesystem {
    pub(crate) alloc_table: [AllocEntry; MAX_FILES + 1],
}

impl Filesystem {
    /// Bring up the filesystem.
    ///
    /// Reads the metadata header and compares every field against the
    /// compiled configuration; on any mismatch the medium is
    /// quick-formatted. Otherwise the allocation table is loaded into
    /// RAM as-is.
    pub fn mount<S: Storage>(storage: &mut S) -> Result<Self> {
        info!("initialising filesystem");

        debug!("loading metadata");
        let mut buf = [0u8; META_SIZE];
        storage.read(FS_START + META_OFFSET, &mut buf)?;
        let stored = Metadata::from_bytes(buf);

        if stored != Metadata::CURRENT {
            debug!("stored metadata does not match this build, reformatting");
            return Self::format(storage, FormatMode::Quick);
        }

        debug!("loading file allocation table");
        let mut fs = Filesystem {
            alloc_table: [AllocEntry::NULL; MAX_FILES + 1],
        };
        let mut buf = [0u8; ALLOC_ENTRY_SIZE];
        for (i, entry) in fs.alloc_table.iter_mut().enumerate() {
            storage.read(FS_START + ALLOC_TABLE_OFFSET + i * ALLOC_ENTRY_SIZE, &mut buf)?;
            *entry = AllocEntry::from_bytes(buf);
        }

        trace!("next free block: {}", fs.alloc_table[MAX_FILES].first_block);
        info!("filesystem initialised");
        Ok(fs)
    }

    /// Format the medium and return a freshly initialised filesystem.
    ///
    /// All blocks are threaded onto the free chain in reverse order:
    /// block `NUM_BLOCKS - 1` becomes the head, block 0 the tail whose
    /// link is [`LBA_NULL`]. Allocations pull from the head while frees
    /// append to the tail, so the hot set rotates through the pool.
    pub fn format<S: Storage>(storage: &mut S, mode: FormatMode) -> Result<Self> {
        info!("formatting filesystem");

        if mode == FormatMode::Wipe {
            Self::wipe(storage)?;
        }

        if mode == FormatMode::Full {
            let mut block = [0u8; BLOCK_SIZE];
            for i in 0..NUM_BLOCKS as Lba {
                trace!("relinking block {} -> {}", i, i - 1);
                block[..LBA_SIZE].copy_from_slice(&(i - 1).to_le_bytes());
                storage.update(Self::block_ptr(i), &block)?;
            }
        } else {
            for i in 0..NUM_BLOCKS as Lba {
                Self::relink(storage, i, i - 1)?;
            }
        }

        debug!("writing file allocation table");
        let mut fs = Filesystem {
            alloc_table: [AllocEntry::NULL; MAX_FILES + 1],
        };
        fs.alloc_table[MAX_FILES].first_block = NUM_BLOCKS as Lba - 1;
        for i in 0..=MAX_FILES {
            fs.mirror_entry(storage, i)?;
        }

        debug!("writing metadata");
        storage.write(FS_START + META_OFFSET, &Metadata::CURRENT.to_bytes())?;

        info!("successfully formatted");
        Ok(fs)
    }

    /// Zero the entire medium, one dword at a time.
    pub fn wipe<S: Storage>(storage: &mut S) -> Result<()> {
        info!("wiping medium");
        let mut addr = FS_START;
        while addr < FS_START + FS_SIZE {
            storage.write_dword(addr, 0)?;
            addr += 4;
        }
        Ok(())
    }

    /// Prepare a file for writing. Nothing touches storage until the
    /// handle is closed; any previous file under the name survives until
    /// then.
    pub fn open_for_write(&self, filename: Fname) -> FileHandle {
        let filename = fold(filename);
        info!("preparing file {} for writing", filename);
        FileHandle::new(filename, OpenMode::Write)
    }

    /// Prepare a file for appending. The handle starts at the file's
    /// current size, which close later uses to pick the splice point.
    pub fn open_for_append(&self, filename: Fname) -> FileHandle {
        let filename = fold(filename);
        info!("preparing file {} for appending", filename);
        let mut fh = FileHandle::new(filename, OpenMode::Append);
        fh.filesize = self.alloc_table[filename as usize].filesize;
        fh
    }

    /// Prepare a file for reading.
    pub fn open_for_read(&self, filename: Fname) -> Result<FileHandle> {
        let filename = fold(filename);
        info!("preparing file {} for reading", filename);

        let entry = &self.alloc_table[filename as usize];
        let mut fh = FileHandle::new(filename, OpenMode::Read);
        fh.filesize = entry.filesize;
        fh.first_block = entry.first_block;

        if fh.first_block == LBA_NULL {
            error!("file {} not found", filename);
            return Err(Error::FileNotFound);
        }
        Ok(fh)
    }

    /// Stage `data` as the handle's pending run of blocks.
    ///
    /// Blocks are pulled from the head of the free chain and only their
    /// payload regions written; chain surgery waits for `close`. When
    /// appending onto a file whose tail block is partial, that tail's
    /// payload is merged in front of `data` and the superseded block is
    /// released at close.
    ///
    /// Returns the number of bytes staged (merged tail included). A
    /// payload that would push the file past [`MAX_BLOCKS_PER_FILE`] is
    /// cut at the cap and reported as [`Error::Truncated`]; the handle
    /// stays valid to close with the capped size. A handle carries one
    /// staged run, so call `close` before writing through it again.
    pub fn write<S: Storage>(
        &mut self,
        storage: &mut S,
        fh: &mut FileHandle,
        data: &[u8],
    ) -> Result<usize> {
        if fh.mode == OpenMode::Read {
            error!("tried to write to read-only handle for file {}", fh.filename);
            return Err(Error::WriteToReadOnly);
        }
        if data.is_empty() {
            return Ok(0);
        }

        let entry = self.alloc_table[fh.filename as usize];

        // Append onto an unaligned tail: prepend the tail block's
        // payload so the run stays block-aligned.
        let mut tail = [0u8; BLOCK_DATA_SIZE];
        let mut overflow = 0;
        if fh.mode == OpenMode::Append && fh.filesize % BLOCK_DATA_SIZE > 0 {
            overflow = fh.filesize % BLOCK_DATA_SIZE;
            let last = Self::last_block_in_chain(storage, entry.first_block)?;
            storage.read(Self::block_ptr(last) + LBA_SIZE, &mut tail[..overflow])?;
            debug!("merged {} tail bytes from block {}", overflow, last);
        }

        let size = overflow + data.len();
        debug!("writing {} bytes to file {}", size, fh.filename);

        let blocks_in_use = match fh.mode {
            OpenMode::Append => entry.filesize / BLOCK_DATA_SIZE,
            _ => 0,
        };

        let needed = size.div_ceil(BLOCK_DATA_SIZE);
        let truncated = blocks_in_use + needed > MAX_BLOCKS_PER_FILE;
        let num_blocks = if truncated {
            MAX_BLOCKS_PER_FILE - blocks_in_use
        } else {
            needed
        };

        if num_blocks == 0 {
            error!("no more space available for file {}", fh.filename);
            return Err(Error::NoSpace);
        }

        let size = if truncated {
            let capped = num_blocks * BLOCK_DATA_SIZE;
            error!("file too large, write truncated to {} bytes", capped);
            capped
        } else {
            size
        };

        // Split into blocks. The free chain hands out consecutive
        // blocks, so the run's interior links are already threaded; only
        // the terminal link is stale until close rewrites it.
        let mut block = [0u8; BLOCK_DATA_SIZE];
        for i in 0..num_blocks {
            let start = i * BLOCK_DATA_SIZE;
            let num_bytes = cmp::min(BLOCK_DATA_SIZE, size - start);
            fill_from_segments(&mut block[..num_bytes], start, &tail[..overflow], data);

            let lba = match self.alloc_block(storage, &block[..num_bytes]) {
                Ok(lba) => lba,
                Err(e) => {
                    // Keep the handle closable with whatever made it in.
                    fh.filesize = start;
                    return Err(e);
                }
            };
            if i == 0 {
                fh.first_block = lba;
            }
            fh.last_block = lba;
        }

        fh.filesize = size;
        info!("file {} staged, {} bytes", fh.filename, size);

        if truncated {
            Err(Error::Truncated)
        } else {
            Ok(size)
        }
    }

    /// Read the handle's file into `buf`.
    ///
    /// `buf` should hold at least `fh.len()` bytes; the copy is clamped
    /// to whatever fits. Returns the number of bytes copied.
    pub fn read<S: Storage>(
        &self,
        storage: &mut S,
        fh: &FileHandle,
        buf: &mut [u8],
    ) -> Result<usize> {
        if !in_range(fh.first_block) {
            error!("tried to read from null file handle");
            return Err(Error::InvalidHandle);
        }

        let limit = cmp::min(fh.filesize, buf.len());
        let mut block = [0u8; BLOCK_SIZE];
        let mut next = fh.first_block;
        let mut pos = 0;

        while in_range(next) && pos < limit {
            trace!("reading from block {}", next);
            storage.read(Self::block_ptr(next), &mut block)?;

            let num_bytes = cmp::min(BLOCK_DATA_SIZE, limit - pos);
            buf[pos..pos + num_bytes].copy_from_slice(&block[LBA_SIZE..LBA_SIZE + num_bytes]);
            pos += num_bytes;

            next = Lba::from_le_bytes([block[0], block[1]]);
        }

        if pos < limit {
            error!("chain for file {} ended after {} bytes", fh.filename, pos);
        }
        Ok(pos)
    }

    /// Commit the handle's staged run to the named file.
    ///
    /// The allocation entry is linked before the run's terminal block is
    /// null-linked: a crash in between leaves the table and the free
    /// chain intact at the cost of one stale trailing link, which the
    /// recorded filesize masks on read.
    pub fn close<S: Storage>(&mut self, storage: &mut S, fh: &mut FileHandle) -> Result<()> {
        if fh.mode == OpenMode::Read {
            return Ok(());
        }

        info!("finalising file {}", fh.filename);

        if !in_range(fh.first_block) {
            error!("cannot link file {} to invalid block {}", fh.filename, fh.first_block);
            return Err(Error::InvalidHandle);
        }

        let name = fh.filename as usize;
        let old = self.alloc_table[name];

        let full_old_blocks = match fh.mode {
            OpenMode::Append => old.filesize / BLOCK_DATA_SIZE,
            _ => 0,
        };

        if full_old_blocks > 0 {
            // Extend: splice the run behind the last retained block. If
            // the old tail was partial its payload is already merged
            // into the run, so the block itself goes back to the free
            // chain.
            let retained = Self::nth_block(storage, old.first_block, full_old_blocks - 1)?;

            let mut stale_tail = LBA_NULL;
            if old.filesize % BLOCK_DATA_SIZE > 0 {
                let mut link = [0u8; LBA_SIZE];
                storage.read(Self::block_ptr(retained), &mut link)?;
                stale_tail = Lba::from_le_bytes(link);
            }

            debug!("appending block {} to block {}", fh.first_block, retained);
            Self::relink(storage, retained, fh.first_block)?;

            fh.filesize += full_old_blocks * BLOCK_DATA_SIZE;
            self.alloc_table[name].filesize = fh.filesize;
            self.mirror_entry(storage, name)?;
            self.mirror_entry(storage, MAX_FILES)?;

            if stale_tail != LBA_NULL {
                self.unlink(storage, stale_tail)?;
            }
        } else {
            // Replace. Any old payload small enough to matter was merged
            // during write, so the old chain goes back to the free chain
            // wholesale before the entry moves to the new run.
            if old.first_block != LBA_NULL {
                self.unlink(storage, old.first_block)?;
            }
            self.link(storage, fh)?;
        }

        debug!("marking end of file {}", fh.filename);
        Self::relink(storage, fh.last_block, LBA_NULL)?;

        info!("file {} successfully finalised", fh.filename);
        Ok(())
    }

    /// Delete a file: its blocks return to the free chain and its
    /// allocation entry is cleared. A name with no file present is a
    /// logged no-op.
    pub fn delete<S: Storage>(&mut self, storage: &mut S, filename: Fname) -> Result<()> {
        let filename = fold(filename);
        info!("deleting file {}", filename);

        let name = filename as usize;
        let first = self.alloc_table[name].first_block;
        if first == LBA_NULL {
            error!("cannot unlink invalid block {}", first);
        } else {
            self.unlink(storage, first)?;
        }

        self.alloc_table[name] = AllocEntry::NULL;
        self.mirror_entry(storage, name)?;

        info!("file {} successfully deleted", filename);
        Ok(())
    }

    /// Whether a file is allocated under `filename`.
    pub fn exists(&self, filename: Fname) -> bool {
        self.alloc_table[fold(filename) as usize].first_block != LBA_NULL
    }

    /// Size on record for `filename`, if a file is present.
    pub fn filesize(&self, filename: Fname) -> Option<usize> {
        let entry = &self.alloc_table[fold(filename) as usize];
        (entry.first_block != LBA_NULL).then_some(entry.filesize)
    }

    /// Number of blocks in the pool.
    pub fn total_blocks(&self) -> usize {
        NUM_BLOCKS
    }

    /// Total payload capacity in bytes.
    pub fn total_space(&self) -> usize {
        NUM_BLOCKS * BLOCK_DATA_SIZE
    }

    /// Blocks currently on the free chain. Walks the chain on storage.
    pub fn available_blocks<S: Storage>(&self, storage: &mut S) -> Result<usize> {
        let mut count = 0;
        let mut next = self.alloc_table[MAX_FILES].first_block;
        let mut link = [0u8; LBA_SIZE];
        while next != LBA_NULL {
            if !in_range(next) || count >= NUM_BLOCKS {
                error!("free chain is corrupt at block {}", next);
                return Err(Error::OutOfRangeBlock);
            }
            count += 1;
            storage.read(Self::block_ptr(next), &mut link)?;
            next = Lba::from_le_bytes(link);
        }
        Ok(count)
    }

    /// Payload bytes still allocatable. Walks the free chain.
    pub fn available_space<S: Storage>(&self, storage: &mut S) -> Result<usize> {
        self.available_blocks(storage)
            .map(|blocks| blocks * BLOCK_DATA_SIZE)
    }

    /// Read the whole of `filename` into a fixed-capacity vector,
    /// clamped to `N` bytes.
    pub fn read_file<S: Storage, const N: usize>(
        &self,
        storage: &mut S,
        filename: Fname,
    ) -> Result<heapless::Vec<u8, N>> {
        let fh = self.open_for_read(filename)?;
        let mut contents = heapless::Vec::new();
        contents
            .resize_default(cmp::min(fh.len(), N))
            .map_err(|_| Error::NoSpace)?;
        let n = self.read(storage, &fh, &mut contents)?;
        contents.truncate(n);
        Ok(contents)
    }

    /// Create or replace `filename` with `data` in one call.
    pub fn write_file<S: Storage>(
        &mut self,
        storage: &mut S,
        filename: Fname,
        data: &[u8],
    ) -> Result<()> {
        let mut fh = self.open_for_write(filename);
        self.write(storage, &mut fh, data)?;
        self.close(storage, &mut fh)
    }

    /// Hex-dump the entire medium to `w`, 16 bytes per line with a
    /// printable-ASCII gutter.
    pub fn dump<S: Storage, W: uWrite>(storage: &mut S, w: &mut W) -> Result<()> {
        let mut text = [b'.'; 16];
        for i in 0..FS_SIZE {
            let val = storage.read_byte(FS_START + i)?;
            text[i % 16] = if (0x20..=0x7e).contains(&val) { val } else { b'.' };

            if i % 16 == 0 {
                let addr = [
                    HEX[(i >> 12) & 0xf],
                    HEX[(i >> 8) & 0xf],
                    HEX[(i >> 4) & 0xf],
                    HEX[i & 0xf],
                ];
                let addr = core::str::from_utf8(&addr).unwrap_or("????");
                uwrite!(w, "\n0x{} : ", addr).map_err(|_| Error::Io)?;
            }

            let hex = [HEX[(val >> 4) as usize], HEX[(val & 0xf) as usize]];
            let hex = core::str::from_utf8(&hex).unwrap_or("??");
            uwrite!(w, "{} ", hex).map_err(|_| Error::Io)?;

            if i % 16 == 15 {
                let gutter = core::str::from_utf8(&text).unwrap_or("");
                uwrite!(w, ": {}", gutter).map_err(|_| Error::Io)?;
            }
        }
        uwrite!(w, "\n").map_err(|_| Error::Io)?;
        Ok(())
    }

    /// Storage address of a block's `next` field; the payload follows at
    /// `+ LBA_SIZE`. The modulo keeps a bogus LBA from escaping the
    /// medium before the range checks catch it.
    pub(crate) fn block_ptr(block: Lba) -> usize {
        FS_START + DATA_OFFSET + (block as usize).wrapping_mul(BLOCK_SIZE) % FS_SIZE
    }

    /// Pull the block at the head of the free chain, advance the head
    /// and write `payload` into the block's data region. The block's
    /// `next` link keeps its free-chain value until close relinks it.
    fn alloc_block<S: Storage>(&mut self, storage: &mut S, payload: &[u8]) -> Result<Lba> {
        let write_to = self.alloc_table[MAX_FILES].first_block;
        if write_to == LBA_NULL {
            error!("free chain exhausted");
            return Err(Error::NoSpace);
        }
        if !in_range(write_to) {
            error!("attempted to write to invalid block {}", write_to);
            return Err(Error::OutOfRangeBlock);
        }

        let mut link = [0u8; LBA_SIZE];
        storage.read(Self::block_ptr(write_to), &mut link)?;
        self.alloc_table[MAX_FILES].first_block = Lba::from_le_bytes(link);

        debug!("overwriting block {}", write_to);
        storage.write(Self::block_ptr(write_to) + LBA_SIZE, payload)?;

        trace!("next free block: {}", self.alloc_table[MAX_FILES].first_block);
        Ok(write_to)
    }

    /// Point the allocation entry at the staged run, then persist the
    /// entry and the moved free-chain head.
    pub(crate) fn link<S: Storage>(&mut self, storage: &mut S, fh: &FileHandle) -> Result<()> {
        if !in_range(fh.first_block) {
            error!("cannot link file {} to invalid block {}", fh.filename, fh.first_block);
            return Err(Error::OutOfRangeBlock);
        }
        info!("linking file {} to block {}", fh.filename, fh.first_block);

        let name = fh.filename as usize;
        self.alloc_table[name] = AllocEntry {
            filesize: fh.filesize,
            first_block: fh.first_block,
        };
        self.mirror_entry(storage, name)?;
        self.mirror_entry(storage, MAX_FILES)?;

        debug!("link successful");
        Ok(())
    }

    /// Append the chain rooted at `block` to the tail of the free chain.
    ///
    /// O(free-chain length): the walk visits every free block. Fine at
    /// this pool size.
    fn unlink<S: Storage>(&mut self, storage: &mut S, block: Lba) -> Result<()> {
        if !in_range(block) {
            error!("cannot unlink invalid block {}", block);
            return Err(Error::OutOfRangeBlock);
        }
        debug!("unlinking block {}", block);

        let free_head = self.alloc_table[MAX_FILES].first_block;
        if free_head == LBA_NULL {
            // Free chain ran dry; the freed chain becomes the whole of it.
            self.alloc_table[MAX_FILES].first_block = block;
            self.mirror_entry(storage, MAX_FILES)?;
            return Ok(());
        }

        let last_free = Self::last_block_in_chain(storage, free_head)?;
        Self::relink(storage, last_free, block)?;

        debug!("unlink successful");
        Ok(())
    }

    /// Overwrite a block's `next` link without touching its payload.
    /// `target` may be [`LBA_NULL`] to terminate a chain.
    pub(crate) fn relink<S: Storage>(storage: &mut S, block: Lba, target: Lba) -> Result<()> {
        if !in_range(block) {
            error!("attempted to relink invalid block {}", block);
            return Err(Error::OutOfRangeBlock);
        }
        if target != LBA_NULL && !in_range(target) {
            error!("attempted to relink to invalid block {}", target);
            return Err(Error::OutOfRangeBlock);
        }

        trace!("relinking block {} -> {}", block, target);
        storage.write(Self::block_ptr(block), &target.to_le_bytes())?;
        Ok(())
    }

    /// Walk a chain to its terminal block. Bounded by the pool size so a
    /// corrupt cycle surfaces as an error instead of a hang.
    fn last_block_in_chain<S: Storage>(storage: &mut S, block: Lba) -> Result<Lba> {
        if !in_range(block) {
            error!("block {} is not part of a block chain", block);
            return Err(Error::OutOfRangeBlock);
        }

        debug!("searching for last block in chain");
        let mut current = block;
        let mut link = [0u8; LBA_SIZE];
        for _ in 0..NUM_BLOCKS {
            storage.read(Self::block_ptr(current), &mut link)?;
            let next = Lba::from_le_bytes(link);
            if next == LBA_NULL {
                debug!("last block in chain: {}", current);
                return Ok(current);
            }
            if !in_range(next) {
                error!("chain link to invalid block {}", next);
                return Err(Error::OutOfRangeBlock);
            }
            trace!("checking {}", next);
            current = next;
        }

        error!("cycle in chain starting at block {}", block);
        Err(Error::OutOfRangeBlock)
    }

    /// Walk `n` links forward from `block`.
    fn nth_block<S: Storage>(storage: &mut S, block: Lba, n: usize) -> Result<Lba> {
        let mut current = block;
        let mut link = [0u8; LBA_SIZE];
        for _ in 0..n {
            if !in_range(current) {
                error!("chain ended early at block {}", current);
                return Err(Error::OutOfRangeBlock);
            }
            storage.read(Self::block_ptr(current), &mut link)?;
            current = Lba::from_le_bytes(link);
        }
        if !in_range(current) {
            error!("chain ended early at block {}", current);
            return Err(Error::OutOfRangeBlock);
        }
        Ok(current)
    }

    /// Mirror one RAM table entry to the medium, skipping clean bytes.
    fn mirror_entry<S: Storage>(&self, storage: &mut S, index: usize) -> Result<()> {
        let addr = FS_START + ALLOC_TABLE_OFFSET + index * ALLOC_ENTRY_SIZE;
        storage.update(addr, &self.alloc_table[index].to_bytes())?;
        Ok(())
    }
}

const HEX: &[u8; 16] = b"0123456789abcdef";

fn in_range(block: Lba) -> bool {
    (0..NUM_BLOCKS as Lba).contains(&block)
}

/// Fold an externally supplied name into the table's index space. Names
/// at or above [`MAX_FILES`] alias by modulo; in particular the sentinel
/// index itself is never addressable as a file.
fn fold(filename: Fname) -> Fname {
    if filename >= MAX_FILES as Fname {
        let folded = filename % MAX_FILES as Fname;
        debug!("filename {} out of range, folded to {}", filename, folded);
        folded
    } else {
        filename
    }
}

/// Copy `dst.len()` bytes starting at logical offset `start` out of the
/// concatenation `head ++ rest`.
fn fill_from_segments(dst: &mut [u8], start: usize, head: &[u8], rest: &[u8]) {
    for (j, byte) in dst.iter_mut().enumerate() {
        let idx = start + j;
        *byte = if idx < head.len() {
            head[idx]
        } else {
            rest[idx - head.len()]
        };
    }
}
