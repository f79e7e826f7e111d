use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{FromRawFd, OwnedFd};

use crate::barrier::{Rendezvous, Token};
use crate::error::{Error, Result};
use crate::pool::Workers;

/// The byte a participant writes to signal readiness. Its value is ignored.
const READY: u8 = 0;

/// Upper bound of release bytes written to the "go" pipe per write call.
const CHUNK: usize = 64;

/// One anonymous pipe, read end and write end.
#[derive(Debug)]
struct Pipe {
    rx: File,
    tx: File,
}

impl Pipe {
    fn new() -> io::Result<Self> {
        let mut fds = [0; 2];
        // SAFETY: `fds` is valid for writes of two file descriptors.
        if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: Both descriptors were just created by `pipe` and are owned
        // by nothing else.
        let (rx, tx) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
        Ok(Self { rx: File::from(rx), tx: File::from(tx) })
    }

    /// Reads exactly one byte. Many threads may read the same pipe, each
    /// read consumes a distinct byte.
    fn read_byte(&self, op: &'static str) -> Result<u8> {
        let mut byte = [0];
        (&self.rx).read_exact(&mut byte).map_err(|source| Error::Handshake { op, source })?;
        Ok(byte[0])
    }

    fn write_bytes(&self, byte: u8, count: u32, op: &'static str) -> Result<()> {
        let chunk = [byte; CHUNK];
        let mut left = count as usize;
        while left > 0 {
            let len = left.min(CHUNK);
            (&self.tx).write_all(&chunk[..len]).map_err(|source| Error::Handshake { op, source })?;
            left -= len;
        }
        Ok(())
    }
}

/// The pipe backend of [`Rendezvous`]: a byte handshake over two pipes.
///
/// Each participant writes one byte to the "ready" pipe and then blocks
/// reading one byte from the "go" pipe. The controller reads one byte per
/// participant from the "ready" pipe and then writes one release token byte
/// per participant to the "go" pipe. There is no stop signal: the controller
/// joins the workers to learn that they are done.
///
/// # Examples
///
/// ```
/// use std::thread;
///
/// use futex_wait::barrier::{Handshake, Rendezvous, Token};
///
/// let handshake = Handshake::new(2).unwrap();
/// thread::scope(|s| {
///     let a = s.spawn(|| handshake.arrive().unwrap());
///     let b = s.spawn(|| handshake.arrive().unwrap());
///     handshake.wait_arrived().unwrap();
///     handshake.release().unwrap();
///     assert_eq!(a.join().unwrap(), Token::Go);
///     assert_eq!(b.join().unwrap(), Token::Go);
/// });
/// ```
#[derive(Debug)]
pub struct Handshake {
    participants: u32,
    ready: Pipe,
    go: Pipe,
}

impl Handshake {
    /// Creates the "ready" and "go" pipes for `participants` workers.
    ///
    /// Returns [`Error::Channel`] if a pipe could not be created.
    pub fn new(participants: u32) -> Result<Self> {
        let ready = Pipe::new().map_err(Error::Channel)?;
        let go = Pipe::new().map_err(Error::Channel)?;
        Ok(Self { participants, ready, go })
    }
}

impl Rendezvous for Handshake {
    fn arrive(&self) -> Result<Token> {
        self.ready.write_bytes(READY, 1, "write() on ready channel")?;
        let byte = self.go.read_byte("read() on go channel")?;
        Token::from_raw(byte.into()).ok_or_else(|| Error::Handshake {
            op: "read() on go channel",
            source: io::Error::new(io::ErrorKind::InvalidData, "unknown release token"),
        })
    }

    fn wait_arrived(&self) -> Result<()> {
        for _ in 0..self.participants {
            self.ready.read_byte("read() for ready")?;
        }
        Ok(())
    }

    fn release(&self) -> Result<()> {
        self.go.write_bytes(Token::Go as u8, self.participants, "write() for waking up workers")
    }

    fn abort(&self, spawned: u32) -> Result<()> {
        self.go.write_bytes(Token::Abort as u8, spawned, "write() for aborting workers")
    }

    fn wait_departed(&self, workers: &mut Workers<'_>) -> Result<()> {
        workers.join()
    }
}

#[cfg(all(not(loom), test))]
mod test {
    use std::io;
    use std::thread;

    use super::{Handshake, Pipe};
    use crate::barrier::{tests, Rendezvous, Token};
    use crate::error::Error;

    #[test]
    fn closed_go_channel_is_a_handshake_error() {
        // Keep the read end of the go pipe, drop its only write end.
        let Pipe { rx, tx } = Pipe::new().unwrap();
        drop(tx);
        let detached = Pipe::new().unwrap();
        let go = Pipe { rx, tx: detached.tx };
        let handshake = Handshake { participants: 1, ready: Pipe::new().unwrap(), go };
        match handshake.arrive() {
            Err(Error::Handshake { op, source }) => {
                assert_eq!(op, "read() on go channel");
                assert_eq!(source.kind(), io::ErrorKind::UnexpectedEof);
            }
            other => panic!("expected a handshake error, got {other:?}"),
        }
        // The ready byte made it through before the read failed.
        handshake.wait_arrived().unwrap();
    }

    #[test]
    fn unknown_token_is_a_handshake_error() {
        let handshake = Handshake::new(1).unwrap();
        handshake.go.write_bytes(7, 1, "write() of bogus token").unwrap();
        match handshake.arrive() {
            Err(Error::Handshake { op, source }) => {
                assert_eq!(op, "read() on go channel");
                assert_eq!(source.kind(), io::ErrorKind::InvalidData);
            }
            other => panic!("expected a handshake error, got {other:?}"),
        }
    }

    #[test]
    fn release_after_all_arrived() {
        tests::release_after_all_arrived(&Handshake::new(6).unwrap());
    }

    #[test]
    fn abort_spawned() {
        tests::abort_spawned(&Handshake::new(6).unwrap());
    }

    #[test]
    fn release_more_than_one_chunk() {
        const PARTICIPANTS: u32 = 150;
        let handshake = Handshake::new(PARTICIPANTS).unwrap();
        thread::scope(|s| {
            let handles: Vec<_> =
                (0..PARTICIPANTS).map(|_| s.spawn(|| handshake.arrive().unwrap())).collect();
            handshake.wait_arrived().unwrap();
            handshake.release().unwrap();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), Token::Go);
            }
        });
    }
}
