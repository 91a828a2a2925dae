//! POSIX shared memory: `shm_open` + `mmap`.

use super::{Acquired, MappingBackend, MappingRequest, View};
use common::consts::{SEGMENT_NAME_MAX, SHM_CREATE_MODE};
use common::{AccessMode, Origin, SegmentSize};
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::mman::{MapFlags, ProtFlags, mmap, munmap, shm_open, shm_unlink};
use nix::sys::stat::{Mode, fstat};
use nix::unistd::{close, ftruncate};
use std::fs::File;
use std::io;
use std::num::NonZeroUsize;
use std::os::fd::OwnedFd;

/// Create-then-open attempts before giving up on a name that keeps
/// appearing and disappearing under us.
const OPEN_ATTEMPTS: usize = 3;

/// POSIX shared-memory backend.
///
/// Objects live under `/dev/shm` on Linux and persist until removed with
/// [`MappingBackend::remove`], independent of open handles.
#[derive(Debug, Clone, Copy, Default)]
pub struct PosixShm;

impl MappingBackend for PosixShm {
    type Handle = OwnedFd;

    fn create_or_open(request: &MappingRequest<'_>) -> io::Result<Acquired<OwnedFd>> {
        if let Some(file) = request.backing {
            return adopt_backing_file(file, request);
        }

        let path = object_path(request.name)?;

        if !request.access.can_create() {
            let fd = shm_open(path.as_str(), OFlag::O_RDONLY, Mode::empty())?;
            let len = object_len(&fd)?;
            return Ok(Acquired {
                handle: fd,
                len,
                origin: Origin::Opened,
            });
        }

        let size = creatable_size(request.size)?;
        let mode = Mode::from_bits_truncate(SHM_CREATE_MODE as libc::mode_t);

        for _ in 0..OPEN_ATTEMPTS {
            match shm_open(
                path.as_str(),
                OFlag::O_CREAT | OFlag::O_EXCL | OFlag::O_RDWR,
                mode,
            ) {
                Ok(fd) => {
                    if let Err(errno) = ftruncate(&fd, size) {
                        // Leave no half-sized object behind for the next opener.
                        if let Err(err) = shm_unlink(path.as_str()) {
                            tracing::warn!(
                                segment = %request.name,
                                error = %err,
                                "Failed to remove unsized segment name"
                            );
                        }
                        return Err(errno.into());
                    }
                    return Ok(Acquired {
                        handle: fd,
                        len: size as u64,
                        origin: Origin::Created,
                    });
                }
                Err(Errno::EEXIST) => {}
                Err(errno) => return Err(errno.into()),
            }

            match shm_open(path.as_str(), OFlag::O_RDWR, Mode::empty()) {
                Ok(fd) => {
                    let mut len = object_len(&fd)?;
                    if len == 0 {
                        // Creator has not sized it yet, or died before it
                        // could. Sizing to the same length is idempotent.
                        ftruncate(&fd, size)?;
                        len = size as u64;
                    }
                    return Ok(Acquired {
                        handle: fd,
                        len,
                        origin: Origin::Opened,
                    });
                }
                // Unlinked between the two calls; try creating again.
                Err(Errno::ENOENT) => continue,
                Err(errno) => return Err(errno.into()),
            }
        }

        Err(io::Error::from_raw_os_error(libc::EAGAIN))
    }

    fn map_view(handle: &OwnedFd, access: AccessMode, len: u64) -> io::Result<View> {
        let length = usize::try_from(len)
            .ok()
            .and_then(NonZeroUsize::new)
            .ok_or_else(|| io::Error::from_raw_os_error(libc::EINVAL))?;

        let (prot, flags) = match access {
            AccessMode::ReadOnly => (ProtFlags::PROT_READ, MapFlags::MAP_SHARED),
            AccessMode::ReadWrite => (
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
            ),
            AccessMode::CopyOnWrite => (
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_PRIVATE,
            ),
        };

        // SAFETY: a fresh mapping at a kernel-chosen address aliases no Rust
        // object; the fd stays open for the duration of the call.
        let base = unsafe { mmap(None, length, prot, flags, handle, 0) }?;

        Ok(View {
            base: base.cast(),
            len: length.get(),
        })
    }

    unsafe fn unmap_view(view: View) -> io::Result<()> {
        // SAFETY: upheld by the caller per the trait contract.
        unsafe { munmap(view.base.cast(), view.len) }?;
        Ok(())
    }

    fn close_handle(handle: OwnedFd) -> io::Result<()> {
        close(handle)?;
        Ok(())
    }

    fn remove(name: &str) -> io::Result<()> {
        let path = object_path(name)?;
        match shm_unlink(path.as_str()) {
            Ok(()) | Err(Errno::ENOENT) => Ok(()),
            Err(errno) => Err(errno.into()),
        }
    }
}

/// Map a segment name onto a POSIX object path: exactly one leading `/`.
fn object_path(name: &str) -> io::Result<String> {
    let bare = name.strip_prefix('/').unwrap_or(name);
    if bare.is_empty() || bare.contains('/') || bare.contains('\0') {
        return Err(io::Error::from_raw_os_error(libc::EINVAL));
    }
    if bare.len() > SEGMENT_NAME_MAX {
        return Err(io::Error::from_raw_os_error(libc::ENAMETOOLONG));
    }
    Ok(format!("/{}", bare))
}

/// Size a new object may be truncated to.
fn creatable_size(size: SegmentSize) -> io::Result<libc::off_t> {
    if size.is_zero() {
        return Err(io::Error::from_raw_os_error(libc::EINVAL));
    }
    libc::off_t::try_from(size.as_u64()).map_err(|_| io::Error::from_raw_os_error(libc::EFBIG))
}

fn object_len(fd: &OwnedFd) -> io::Result<u64> {
    let stat = fstat(fd)?;
    Ok(stat.st_size as u64)
}

/// Use a caller-supplied file as the object. The segment owns a duplicate
/// of the descriptor; the caller keeps its own.
fn adopt_backing_file(file: &File, request: &MappingRequest<'_>) -> io::Result<Acquired<OwnedFd>> {
    let current = file.metadata()?.len();
    let wanted = request.size.as_u64();

    let (len, origin) = if request.access.can_create() && current < wanted {
        file.set_len(wanted)?;
        let origin = if current == 0 {
            Origin::Created
        } else {
            Origin::Opened
        };
        (wanted, origin)
    } else {
        (current, Origin::Opened)
    };

    Ok(Acquired {
        handle: OwnedFd::from(file.try_clone()?),
        len,
        origin,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_path_normalisation() {
        assert_eq!(object_path("seg").unwrap(), "/seg");
        assert_eq!(object_path("/seg").unwrap(), "/seg");
    }

    #[test]
    fn test_object_path_rejects_bad_names() {
        for name in ["", "/", "a/b", "//a", "nul\0byte"] {
            let err = object_path(name).unwrap_err();
            assert_eq!(err.raw_os_error(), Some(libc::EINVAL), "name {:?}", name);
        }

        let long = "n".repeat(SEGMENT_NAME_MAX + 1);
        assert_eq!(
            object_path(&long).unwrap_err().raw_os_error(),
            Some(libc::ENAMETOOLONG)
        );
    }

    #[test]
    fn test_creatable_size() {
        assert_eq!(creatable_size(SegmentSize::from_u64(4096)).unwrap(), 4096);
        assert_eq!(
            creatable_size(SegmentSize::default())
                .unwrap_err()
                .raw_os_error(),
            Some(libc::EINVAL)
        );
        assert!(creatable_size(SegmentSize::from_parts(u32::MAX, u32::MAX)).is_err());
    }

    #[test]
    fn test_zero_length_view_is_rejected() {
        let file = tempfile::tempfile().unwrap();
        let fd = OwnedFd::from(file);
        let err = PosixShm::map_view(&fd, AccessMode::ReadOnly, 0).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EINVAL));
    }

    #[test]
    fn test_object_len_follows_file_size() {
        let file = tempfile::tempfile().unwrap();
        file.set_len(12288).unwrap();
        let fd = OwnedFd::from(file);
        assert_eq!(object_len(&fd).unwrap(), 12288);
        assert!(PosixShm::close_handle(fd).is_ok());
    }

    #[test]
    fn test_remove_missing_name_is_ok() {
        let name = format!("shmseg_never_created_{}", std::process::id());
        assert!(PosixShm::remove(&name).is_ok());
    }
}
