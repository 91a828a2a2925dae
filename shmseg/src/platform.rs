//! Platform mapping backends.
//!
//! Each backend exposes the four primitives a segment is built from:
//! create-or-open a named object, map a view of it, unmap the view and
//! close the handle. The native backend is chosen at build time and
//! exported as [`NativeBackend`].

use common::{AccessMode, Origin, SegmentSize};
use std::fmt;
use std::fs::File;
use std::io;
use std::ptr::NonNull;

#[cfg(unix)]
pub mod posix;
#[cfg(windows)]
pub mod windows;

/// Backend used by [`SharedSegment`](crate::SharedSegment) unless another
/// is named.
#[cfg(unix)]
pub type NativeBackend = posix::PosixShm;

/// Backend used by [`SharedSegment`](crate::SharedSegment) unless another
/// is named.
#[cfg(windows)]
pub type NativeBackend = windows::Win32Mapping;

/// Parameters of one create-or-open call.
#[derive(Debug, Clone, Copy)]
pub struct MappingRequest<'a> {
    /// Segment name as given by the caller.
    pub name: &'a str,
    /// Size used if the object gets created.
    pub size: SegmentSize,
    /// Access mode of the view that will follow.
    pub access: AccessMode,
    /// File backing the mapping instead of anonymous shared memory.
    pub backing: Option<&'a File>,
}

/// A freshly acquired OS object.
#[derive(Debug)]
pub struct Acquired<H> {
    /// Owned handle to the object.
    pub handle: H,
    /// Object size as known at acquisition.
    pub len: u64,
    /// Whether the object was created by this call.
    pub origin: Origin,
}

/// A mapped view: base address and length in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct View {
    /// First byte of the mapping.
    pub base: NonNull<u8>,
    /// Mapped length.
    pub len: usize,
}

/// OS primitives behind a named segment.
///
/// Implementations are stateless; every resource they hand out is owned by
/// the caller, which must give it back exactly once.
pub trait MappingBackend {
    /// Owned handle to a shared-memory object.
    type Handle: fmt::Debug;

    /// Create the named object, or open it if the name already resolves.
    fn create_or_open(request: &MappingRequest<'_>) -> io::Result<Acquired<Self::Handle>>;

    /// Map the whole object into this process.
    ///
    /// `len` is the length reported by [`create_or_open`](Self::create_or_open).
    fn map_view(handle: &Self::Handle, access: AccessMode, len: u64) -> io::Result<View>;

    /// Release a view.
    ///
    /// # Safety
    ///
    /// `view` must come from [`map_view`](Self::map_view) of this backend and
    /// must not have been unmapped already. No reference into it may outlive
    /// this call.
    unsafe fn unmap_view(view: View) -> io::Result<()>;

    /// Close a handle.
    fn close_handle(handle: Self::Handle) -> io::Result<()>;

    /// Remove a name so later opens no longer find the object. Removing a
    /// missing name succeeds.
    fn remove(name: &str) -> io::Result<()>;
}
