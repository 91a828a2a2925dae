//! Native Windows file mappings: `CreateFileMappingW` + `MapViewOfFile`.

use super::{Acquired, MappingBackend, MappingRequest, View};
use common::{AccessMode, Origin};
use std::ffi::OsStr;
use std::io;
use std::os::windows::ffi::OsStrExt;
use std::os::windows::io::AsRawHandle;
use std::ptr::NonNull;
use windows_sys::Win32::Foundation::{
    CloseHandle, ERROR_ALREADY_EXISTS, ERROR_INVALID_NAME, GetLastError, HANDLE,
    INVALID_HANDLE_VALUE,
};
use windows_sys::Win32::System::Memory::{
    CreateFileMappingW, FILE_MAP_COPY, FILE_MAP_READ, FILE_MAP_WRITE, MEMORY_BASIC_INFORMATION,
    MEMORY_MAPPED_VIEW_ADDRESS, MapViewOfFile, OpenFileMappingW, PAGE_READONLY, PAGE_READWRITE,
    PAGE_WRITECOPY, UnmapViewOfFile, VirtualQuery,
};

/// Windows named file-mapping backend.
///
/// Objects are reference counted by the kernel and vanish with their last
/// handle, so [`MappingBackend::remove`] has nothing to do.
#[derive(Debug, Clone, Copy, Default)]
pub struct Win32Mapping;

/// Owned file-mapping handle.
#[derive(Debug)]
pub struct MappingHandle(HANDLE);

// SAFETY: kernel handles are process-wide and usable from any thread.
unsafe impl Send for MappingHandle {}

impl MappingHandle {
    /// Raw handle value.
    pub fn as_raw(&self) -> HANDLE {
        self.0
    }
}

impl MappingBackend for Win32Mapping {
    type Handle = MappingHandle;

    fn create_or_open(request: &MappingRequest<'_>) -> io::Result<Acquired<MappingHandle>> {
        let wide = wide_name(request.name)?;

        if !request.access.can_create() && request.backing.is_none() {
            let desired = match request.access {
                AccessMode::CopyOnWrite => FILE_MAP_COPY,
                _ => FILE_MAP_READ,
            };
            // SAFETY: wide is NUL-terminated and outlives the call.
            let handle = unsafe { OpenFileMappingW(desired, 0, wide.as_ptr()) };
            if handle.is_null() {
                return Err(io::Error::last_os_error());
            }
            return Ok(Acquired {
                handle: MappingHandle(handle),
                len: 0,
                origin: Origin::Opened,
            });
        }

        let file = request
            .backing
            .map(|f| f.as_raw_handle() as HANDLE)
            .unwrap_or(INVALID_HANDLE_VALUE);
        let protect = match request.access {
            AccessMode::ReadOnly => PAGE_READONLY,
            AccessMode::ReadWrite => PAGE_READWRITE,
            AccessMode::CopyOnWrite => PAGE_WRITECOPY,
        };

        // SAFETY: file is either a live handle borrowed from the caller or the
        // paging-file sentinel; wide is NUL-terminated.
        let handle = unsafe {
            CreateFileMappingW(
                file,
                std::ptr::null(),
                protect,
                request.size.high(),
                request.size.low(),
                wide.as_ptr(),
            )
        };
        if handle.is_null() {
            return Err(io::Error::last_os_error());
        }

        // SAFETY: reads the calling thread's last-error slot.
        let origin = if unsafe { GetLastError() } == ERROR_ALREADY_EXISTS {
            Origin::Opened
        } else {
            Origin::Created
        };

        Ok(Acquired {
            handle: MappingHandle(handle),
            len: request.size.as_u64(),
            origin,
        })
    }

    fn map_view(handle: &MappingHandle, access: AccessMode, _len: u64) -> io::Result<View> {
        let desired = match access {
            AccessMode::ReadOnly => FILE_MAP_READ,
            AccessMode::ReadWrite => FILE_MAP_READ | FILE_MAP_WRITE,
            AccessMode::CopyOnWrite => FILE_MAP_COPY,
        };

        // Length 0 maps the whole object, whatever size its creator chose.
        // SAFETY: handle is a live file-mapping handle.
        let view = unsafe { MapViewOfFile(handle.0, desired, 0, 0, 0) };
        let base = NonNull::new(view.Value.cast::<u8>()).ok_or_else(io::Error::last_os_error)?;

        let mut info = std::mem::MaybeUninit::<MEMORY_BASIC_INFORMATION>::uninit();
        // SAFETY: base is the start of a live view; info is writable.
        let written = unsafe {
            VirtualQuery(
                base.as_ptr().cast(),
                info.as_mut_ptr(),
                std::mem::size_of::<MEMORY_BASIC_INFORMATION>(),
            )
        };
        if written == 0 {
            let err = io::Error::last_os_error();
            // SAFETY: the view was mapped above and nothing refers to it.
            unsafe { UnmapViewOfFile(view) };
            return Err(err);
        }
        // SAFETY: VirtualQuery filled the struct.
        let info = unsafe { info.assume_init() };

        Ok(View {
            base,
            len: info.RegionSize,
        })
    }

    unsafe fn unmap_view(view: View) -> io::Result<()> {
        let address = MEMORY_MAPPED_VIEW_ADDRESS {
            Value: view.base.as_ptr().cast(),
        };
        // SAFETY: upheld by the caller per the trait contract.
        if unsafe { UnmapViewOfFile(address) } == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn close_handle(handle: MappingHandle) -> io::Result<()> {
        // SAFETY: the handle is owned and closed exactly once here.
        if unsafe { CloseHandle(handle.0) } == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn remove(_name: &str) -> io::Result<()> {
        Ok(())
    }
}

fn wide_name(name: &str) -> io::Result<Vec<u16>> {
    if name.is_empty() || name.contains('\0') {
        return Err(io::Error::from_raw_os_error(ERROR_INVALID_NAME as i32));
    }
    Ok(OsStr::new(name).encode_wide().chain(Some(0)).collect())
}
