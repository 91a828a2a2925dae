//! Named shared-memory segment with owned handle and view

use crate::error::{ShmError, ShmResult};
use crate::platform::{Acquired, MappingBackend, MappingRequest, NativeBackend, View};
use common::{AccessMode, Origin, SegmentConfig, SegmentSize};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::marker::PhantomData;
use std::ptr::NonNull;

/// Construction options for a [`SharedSegment`].
///
/// Defaults: open immediately, read-only, no backing file, keep the name on
/// close.
#[derive(Debug)]
pub struct SegmentOptions {
    auto_open: bool,
    access: AccessMode,
    backing_file: Option<File>,
    unlink_on_close: bool,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            auto_open: true,
            access: AccessMode::ReadOnly,
            backing_file: None,
            unlink_on_close: false,
        }
    }
}

impl SegmentOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open during construction.
    pub fn auto_open(mut self, auto_open: bool) -> Self {
        self.auto_open = auto_open;
        self
    }

    /// Access mode of the view.
    pub fn access(mut self, access: AccessMode) -> Self {
        self.access = access;
        self
    }

    /// Back the region with `file` instead of anonymous shared memory.
    ///
    /// The segment owns the file; read-write segments grow it to the
    /// requested size.
    pub fn backing_file(mut self, file: File) -> Self {
        self.backing_file = Some(file);
        self
    }

    /// Remove the name on close if this segment created it. POSIX names
    /// otherwise persist until [`remove`] is called.
    pub fn unlink_on_close(mut self, unlink: bool) -> Self {
        self.unlink_on_close = unlink;
        self
    }
}

/// Live resources of an open segment. Present iff the segment is open.
struct Mapped<H> {
    handle: H,
    view: View,
    origin: Origin,
}

/// One named shared-memory mapping.
///
/// The segment exclusively owns its OS handle and mapped view and releases
/// both exactly once, on [`close`](Self::close) or on drop. It cannot be
/// cloned; share it by moving or by opening the same name again.
///
/// ```rust,no_run
/// use shmseg::{AccessMode, SharedSegment};
///
/// # fn main() -> shmseg::ShmResult<()> {
/// let mut writer = SharedSegment::create_or_open("sensor_data", 4096u64, AccessMode::ReadWrite)?;
/// writer.write_at(0, b"temperature: 25.5")?;
///
/// let reader = SharedSegment::create_or_open("sensor_data", 0u64, AccessMode::ReadOnly)?;
/// let mut buf = [0u8; 17];
/// reader.read_at(0, &mut buf)?;
/// assert_eq!(&buf, b"temperature: 25.5");
/// # Ok(())
/// # }
/// ```
pub struct SharedSegment<B: MappingBackend = NativeBackend> {
    name: String,
    size: SegmentSize,
    access: AccessMode,
    backing: Option<File>,
    unlink_on_close: bool,
    mapped: Option<Mapped<B::Handle>>,
    _backend: PhantomData<fn() -> B>,
}

// SAFETY: the view is owned exclusively by this value and only reachable
// through it; moving the owner to another thread moves the view with it.
unsafe impl<B: MappingBackend> Send for SharedSegment<B> where B::Handle: Send {}

impl SharedSegment {
    /// Unopened read-only segment without backing file. Call
    /// [`open`](Self::open) before touching its data.
    pub fn new(name: impl Into<String>, size: impl Into<SegmentSize>) -> Self {
        Self::unopened(name, size, SegmentOptions::new().auto_open(false))
    }

    /// Segment built from `options`; opened before returning when
    /// `auto_open` is set, in which case an open failure is returned instead
    /// of a half-usable segment.
    pub fn with_options(
        name: impl Into<String>,
        size: impl Into<SegmentSize>,
        options: SegmentOptions,
    ) -> ShmResult<Self> {
        Self::with_backend_options(name, size, options)
    }

    /// Construct and open in one step.
    ///
    /// Creates the object if the name is free and `access` allows it,
    /// otherwise opens the existing one; `size` only applies when creating.
    pub fn create_or_open(
        name: impl Into<String>,
        size: impl Into<SegmentSize>,
        access: AccessMode,
    ) -> ShmResult<Self> {
        Self::with_options(name, size, SegmentOptions::new().access(access))
    }

    /// Segment described by a configuration section.
    ///
    /// The backing file, if any, is opened read-write (and created) for
    /// `read_write` access and read-only otherwise.
    pub fn from_config(config: &SegmentConfig) -> ShmResult<Self> {
        config.validate()?;

        let mut options = SegmentOptions::new()
            .auto_open(config.auto_open)
            .access(config.access)
            .unlink_on_close(config.unlink_on_close);

        if let Some(path) = &config.backing_file {
            let writable = config.access.can_create();
            let file = OpenOptions::new()
                .read(true)
                .write(writable)
                .create(writable)
                .truncate(false)
                .open(path)
                .map_err(|source| ShmError::BackingFile {
                    path: path.clone(),
                    source,
                })?;
            options = options.backing_file(file);
        }

        Self::with_options(config.name.clone(), config.size, options)
    }

    /// Remove `name` from the native backend; see [`remove`].
    pub fn remove(name: &str) -> ShmResult<()> {
        remove(name)
    }
}

impl<B: MappingBackend> SharedSegment<B> {
    /// Unopened segment on backend `B`; `options.auto_open` is ignored.
    pub fn unopened(
        name: impl Into<String>,
        size: impl Into<SegmentSize>,
        options: SegmentOptions,
    ) -> Self {
        Self {
            name: name.into(),
            size: size.into(),
            access: options.access,
            backing: options.backing_file,
            unlink_on_close: options.unlink_on_close,
            mapped: None,
            _backend: PhantomData,
        }
    }

    /// [`SharedSegment::with_options`] on backend `B`.
    pub fn with_backend_options(
        name: impl Into<String>,
        size: impl Into<SegmentSize>,
        options: SegmentOptions,
    ) -> ShmResult<Self> {
        let auto_open = options.auto_open;
        let mut segment = Self::unopened(name, size, options);
        if auto_open {
            segment.open()?;
        }
        Ok(segment)
    }

    /// Acquire the named object and map it.
    ///
    /// # Errors
    ///
    /// - [`ShmError::AlreadyOpen`] if the segment is mapped; nothing changes
    /// - [`ShmError::MappingCreation`] if the object cannot be created or
    ///   opened
    /// - [`ShmError::ViewMapping`] if mapping fails; the handle has been
    ///   closed and a name this call created has been removed again
    pub fn open(&mut self) -> ShmResult<()> {
        if self.mapped.is_some() {
            return Err(ShmError::AlreadyOpen {
                name: self.name.clone(),
            });
        }

        // Growing a backing file is undone if the mapping then fails.
        let backing_len = match &self.backing {
            Some(file) => {
                let metadata = file.metadata().map_err(|source| ShmError::MappingCreation {
                    name: self.name.clone(),
                    source,
                })?;
                Some(metadata.len())
            }
            None => None,
        };

        let request = MappingRequest {
            name: &self.name,
            size: self.size,
            access: self.access,
            backing: self.backing.as_ref(),
        };

        let acquired = B::create_or_open(&request).map_err(|source| ShmError::MappingCreation {
            name: self.name.clone(),
            source,
        })?;

        let view = match B::map_view(&acquired.handle, self.access, acquired.len) {
            Ok(view) => view,
            Err(source) => {
                self.release_unmapped(acquired, backing_len);
                return Err(ShmError::ViewMapping {
                    name: self.name.clone(),
                    source,
                });
            }
        };

        tracing::debug!(
            segment = %self.name,
            access = %self.access,
            origin = ?acquired.origin,
            len = view.len,
            "Opened shared memory segment"
        );

        self.mapped = Some(Mapped {
            handle: acquired.handle,
            view,
            origin: acquired.origin,
        });
        Ok(())
    }

    /// Unmap the view and close the handle.
    ///
    /// Both steps are always attempted and the segment always ends up
    /// closed. A no-op on a segment that is not open.
    ///
    /// # Errors
    ///
    /// [`ShmError::Unmap`] if the view could not be unmapped. Handle close
    /// and name removal failures are logged only.
    pub fn close(&mut self) -> ShmResult<()> {
        let Some(mapped) = self.mapped.take() else {
            return Ok(());
        };

        // SAFETY: the view came from B::map_view and was taken out of self,
        // so it is unmapped once; slices handed out borrow self and cannot be
        // alive across this &mut call.
        let unmapped = unsafe { B::unmap_view(mapped.view) };

        if let Err(err) = B::close_handle(mapped.handle) {
            tracing::warn!(segment = %self.name, error = %err, "Failed to close segment handle");
        }

        if self.unlink_on_close && self.owns_name(mapped.origin) {
            self.remove_name();
        }

        tracing::debug!(segment = %self.name, "Closed shared memory segment");

        unmapped.map_err(|source| ShmError::Unmap {
            name: self.name.clone(),
            source,
        })
    }

    /// Segment name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// High word of the maximum size.
    pub fn max_size_high(&self) -> u32 {
        self.size.high()
    }

    /// Low word of the maximum size.
    pub fn max_size_low(&self) -> u32 {
        self.size.low()
    }

    /// Maximum size requested at construction: `(high << 32) | low`.
    pub fn max_size(&self) -> u64 {
        self.size.as_u64()
    }

    /// Access mode of the view.
    pub fn access_mode(&self) -> AccessMode {
        self.access
    }

    /// Whether the segment is open and mapped.
    pub fn is_open(&self) -> bool {
        self.mapped.is_some()
    }

    /// Whether the last successful open created the object.
    pub fn origin(&self) -> Option<Origin> {
        self.mapped.as_ref().map(|m| m.origin)
    }

    /// Mapping handle, while open.
    pub fn handle(&self) -> Option<&B::Handle> {
        self.mapped.as_ref().map(|m| &m.handle)
    }

    /// Base address of the view, while open.
    pub fn data(&self) -> Option<NonNull<u8>> {
        self.mapped.as_ref().map(|m| m.view.base)
    }

    /// Base address of the view; null when closed.
    ///
    /// Dereferencing is the caller's responsibility: check
    /// [`is_open`](Self::is_open) first and coordinate with other processes.
    pub fn as_ptr(&self) -> *mut u8 {
        self.data().map_or(std::ptr::null_mut(), NonNull::as_ptr)
    }

    /// Mapped length in bytes; 0 when closed.
    ///
    /// For an opened object this is its creator's size (page-rounded on
    /// Windows), not the size passed here.
    pub fn mapped_len(&self) -> usize {
        self.mapped.as_ref().map_or(0, |m| m.view.len)
    }

    /// The mapped bytes, while open.
    ///
    /// Other processes may write concurrently; the contents are only as
    /// consistent as their external synchronization makes them.
    pub fn as_slice(&self) -> Option<&[u8]> {
        let view = self.mapped.as_ref()?.view;
        // SAFETY: the view is live for as long as &self is borrowed.
        Some(unsafe { std::slice::from_raw_parts(view.base.as_ptr(), view.len) })
    }

    /// The mapped bytes for writing; `None` when closed or read-only.
    pub fn as_mut_slice(&mut self) -> Option<&mut [u8]> {
        if !self.access.is_writable() {
            return None;
        }
        let view = self.mapped.as_ref()?.view;
        // SAFETY: the view is live and writable; &mut self excludes other
        // borrows within this process.
        Some(unsafe { std::slice::from_raw_parts_mut(view.base.as_ptr(), view.len) })
    }

    /// Copy `buf.len()` bytes starting at `offset` out of the segment.
    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> ShmResult<()> {
        let view = self.checked_view(offset, buf.len())?;
        // SAFETY: range checked against the live view; buf is a distinct
        // process-local buffer.
        unsafe {
            std::ptr::copy_nonoverlapping(
                view.base.as_ptr().add(offset),
                buf.as_mut_ptr(),
                buf.len(),
            );
        }
        Ok(())
    }

    /// Copy `data` into the segment at `offset`.
    pub fn write_at(&mut self, offset: usize, data: &[u8]) -> ShmResult<()> {
        if !self.access.is_writable() {
            return Err(ShmError::NotWritable {
                name: self.name.clone(),
            });
        }
        let view = self.checked_view(offset, data.len())?;
        // SAFETY: range checked against the live, writable view.
        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                view.base.as_ptr().add(offset),
                data.len(),
            );
        }
        Ok(())
    }

    fn checked_view(&self, offset: usize, len: usize) -> ShmResult<View> {
        let mapped = self.mapped.as_ref().ok_or_else(|| ShmError::NotOpen {
            name: self.name.clone(),
        })?;
        let size = mapped.view.len;
        match offset.checked_add(len) {
            Some(end) if end <= size => Ok(mapped.view),
            _ => Err(ShmError::OutOfBounds { offset, len, size }),
        }
    }

    /// Anonymous objects this segment created are its to remove; backing
    /// files never are.
    fn owns_name(&self, origin: Origin) -> bool {
        origin == Origin::Created && self.backing.is_none()
    }

    fn remove_name(&self) {
        if let Err(err) = B::remove(&self.name) {
            tracing::warn!(segment = %self.name, error = %err, "Failed to remove segment name");
        }
    }

    /// Undo a create-or-open whose mapping failed, including any growth of
    /// the backing file to its pre-open length.
    fn release_unmapped(&self, acquired: Acquired<B::Handle>, backing_len: Option<u64>) {
        if let Err(err) = B::close_handle(acquired.handle) {
            tracing::warn!(segment = %self.name, error = %err, "Failed to close segment handle");
        }
        if self.owns_name(acquired.origin) {
            self.remove_name();
        }
        if let (Some(file), Some(len)) = (&self.backing, backing_len) {
            let grown = file.metadata().map_or(true, |m| m.len() != len);
            if grown {
                if let Err(err) = file.set_len(len) {
                    tracing::warn!(
                        segment = %self.name,
                        error = %err,
                        "Failed to restore backing file length"
                    );
                }
            }
        }
    }
}

impl<B: MappingBackend> Drop for SharedSegment<B> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(segment = %self.name, error = %err, "Segment teardown failed during drop");
        }
    }
}

impl<B: MappingBackend> fmt::Debug for SharedSegment<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSegment")
            .field("name", &self.name)
            .field("max_size", &self.size.as_u64())
            .field("access", &self.access)
            .field("backed", &self.backing.is_some())
            .field("origin", &self.origin())
            .field("mapped_len", &self.mapped_len())
            .finish()
    }
}

/// Remove a segment name from the native backend. Removing a missing name
/// succeeds; segments already open keep their mapping.
pub fn remove(name: &str) -> ShmResult<()> {
    <NativeBackend as MappingBackend>::remove(name).map_err(|source| ShmError::Unlink {
        name: name.to_string(),
        source,
    })
}
