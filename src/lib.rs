#![no_std]

/*!

A tiny FAT-inspired filesystem for byte-addressable, wear-limited
persistent storage (EEPROM-class media) on resource-constrained
microcontrollers.

Files are named by small integers. The medium is partitioned into a
metadata header, a statically placed allocation table and a pool of
fixed-size blocks threaded into singly-linked chains: one chain per
file, plus one free chain rooted in the table's sentinel slot.
Allocations pull from the free chain's head while frees append to its
tail, so the allocation hot set rotates through the pool instead of
hammering the same cells; all mirrors of the allocation table go through
the driver's `update` primitive, which skips bytes that already hold the
intended value.

## Usage

This library requires an implementation of [`driver::Storage`], normally
a thin wrapper over the host's EEPROM driver. The [`ram_storage!`] macro
generates a RAM-backed stand-in.

All filesystem state lives in an explicit [`Filesystem`] instance (the
RAM cache of the allocation table); every operation additionally takes
`&mut Storage`, so multiple filesystems on different media can coexist.

```
use eeprom_fat::{ram_storage, Filesystem};

ram_storage!(EepromStorage, Eeprom);

let mut eeprom = Eeprom::default();
let mut storage = EepromStorage::new(&mut eeprom);

// A blank or reconfigured medium is quick-formatted on the way up.
let mut fs = Filesystem::mount(&mut storage)?;

let mut fh = fs.open_for_write(6);
fs.write(&mut storage, &mut fh, b"Hello World!\n")?;
fs.close(&mut storage, &mut fh)?;

let fh = fs.open_for_read(6)?;
assert_eq!(fh.len(), 13);
let mut buf = [0u8; 13];
fs.read(&mut storage, &fh, &mut buf)?;
assert_eq!(&buf, b"Hello World!\n");

fs.delete(&mut storage, 6)?;
assert!(!fs.exists(6));
# Ok::<(), eeprom_fat::Error>(())
```

## Limitations

Single-threaded and synchronous; callers serialize access. No
directories, no string names, no checksums, no random-access writes into
the middle of a file. Out-of-range names fold into the name space by
modulo, so application-chosen IDs may silently alias. Blocks staged by a
handle that is never closed are orphaned until the next format.

*/

/// cf. Macros section below
#[macro_use]
pub mod macros;

pub mod consts;

/// The `Storage` driver trait.
pub mod driver;

pub mod file;

pub mod fs;

/// Error and result types.
pub mod io;

pub use crate::{
    file::{FileHandle, OpenMode},
    fs::{AllocEntry, Filesystem, FormatMode, Metadata},
    io::{Error, Result},
};

/// Set the verbosity of the filesystem's logging: 0 (errors only)
/// through 4 (per-block tracing). Maps onto the `log` facade's global
/// max level; the host's logger does the actual sinking, and errors are
/// always emitted.
pub fn set_debug(level: u8) {
    let filter = match level {
        0 => log::LevelFilter::Error,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    log::set_max_level(filter);
}
