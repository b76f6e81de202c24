/// A configurable RAM-backed implementation of the
/// [`Storage`](crate::driver::Storage) trait, for tests, doctests and
/// host-side experimentation.
///
/// The backend tracks how many bytes `write` and `update` actually
/// program, so wear-sensitive behavior is observable.
#[macro_export]
macro_rules! ram_storage {
    (
        name=$Name:ident,
        backend=$Backend:ident,
        size=$size:expr,
    ) => {
        pub struct $Backend {
            buf: [u8; $size],
            /// Bytes actually programmed by `write` and `update`.
            pub programmed: usize,
        }

        impl Default for $Backend {
            fn default() -> Self {
                $Backend {
                    buf: [0u8; $size],
                    programmed: 0,
                }
            }
        }

        pub struct $Name<'backend> {
            backend: &'backend mut $Backend,
        }

        impl<'backend> $Name<'backend> {
            pub fn new(backend: &'backend mut $Backend) -> Self {
                $Name { backend }
            }
        }

        impl<'backend> $crate::driver::Storage for $Name<'backend> {
            fn read(&mut self, addr: usize, buf: &mut [u8]) -> $crate::io::Result<usize> {
                buf.copy_from_slice(&self.backend.buf[addr..addr + buf.len()]);
                Ok(buf.len())
            }

            fn write(&mut self, addr: usize, data: &[u8]) -> $crate::io::Result<usize> {
                self.backend.buf[addr..addr + data.len()].copy_from_slice(data);
                self.backend.programmed += data.len();
                Ok(data.len())
            }

            fn update(&mut self, addr: usize, data: &[u8]) -> $crate::io::Result<usize> {
                let mut programmed = 0;
                for (offset, &byte) in data.iter().enumerate() {
                    let cell = &mut self.backend.buf[addr + offset];
                    if *cell != byte {
                        *cell = byte;
                        programmed += 1;
                    }
                }
                self.backend.programmed += programmed;
                Ok(programmed)
            }

            fn write_dword(&mut self, addr: usize, value: u32) -> $crate::io::Result<()> {
                self.backend.buf[addr..addr + 4].copy_from_slice(&value.to_le_bytes());
                self.backend.programmed += 4;
                Ok(())
            }
        }
    };
    ($Name:ident, $Backend:ident) => {
        $crate::ram_storage!(
            name = $Name,
            backend = $Backend,
            size = $crate::consts::FS_SIZE,
        );
    };
}
