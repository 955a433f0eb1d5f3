//! Anonymous memory-mapped buffer used as the storage of heap pages.
//!
//! `MmapBuffer` hands out page-aligned, zero-initialised memory straight from the
//! operating system instead of the global allocator. Array pages can be very large
//! (hundreds of megabytes), and mapping them directly keeps them out of the allocator's
//! arenas, gives them large-page alignment when available, and lets the array layer
//! pass access-pattern hints down to the kernel.
//!
//! # Large Pages
//!
//! Buffers at least one large page in size first attempt a large-page (huge page)
//! allocation and silently fall back to regular pages when large pages are not
//! configured on the host.

use std::sync::OnceLock;

use crate::{Advice, mmap};

/// A memory-mapped buffer that provides raw, zeroed memory.
pub struct MmapBuffer {
    /// Raw pointer to the allocated memory region.
    ptr: *mut u8,
    /// The requested size of the buffer in bytes.
    len: usize,
    /// The actual allocated capacity, rounded up to the page size.
    capacity: usize,
    /// Whether this buffer was allocated using large pages.
    uses_large_pages: bool,
    /// Buffer alignment (the page size used during allocation).
    alignment: usize,
}

impl MmapBuffer {
    /// Size of a large (huge) page on this host, whether or not any are configured.
    pub fn large_page_size() -> usize {
        mmap::get_large_page_size()
    }

    /// Allocates a zeroed buffer holding `count` values of type `T`.
    ///
    /// Buffers spanning at least one large page try large pages first; smaller ones
    /// go straight to regular pages so that tiny arrays do not pin 2MB each.
    pub fn allocate_zeroed<T>(count: usize) -> std::io::Result<MmapBuffer>
    where
        T: bytemuck::Pod,
    {
        let size = count
            .checked_mul(std::mem::size_of::<T>())
            .ok_or_else(|| std::io::Error::other("buffer size overflows usize"))?;
        if size >= Self::large_page_size() {
            Self::allocate_with_fallback(size)
        } else {
            Self::allocate_regular(size)
        }
    }

    /// Allocates `size` bytes, trying large pages before regular pages.
    pub fn allocate_with_fallback(size: usize) -> std::io::Result<MmapBuffer> {
        Self::allocate_large_pages(size).or_else(|e| {
            log::trace!("large page allocation of {size} bytes failed ({e}), using regular pages");
            Self::allocate_regular(size)
        })
    }

    /// Allocates `size` bytes backed by large pages.
    ///
    /// # Errors
    ///
    /// Fails when large pages are not configured on the host, the process lacks
    /// the privilege to use them, or no contiguous run of them is free.
    pub fn allocate_large_pages(size: usize) -> std::io::Result<MmapBuffer> {
        check_large_page_support()?;
        Self::map(size, true)
    }

    /// Allocates `size` bytes backed by regular pages.
    pub fn allocate_regular(size: usize) -> std::io::Result<MmapBuffer> {
        Self::map(size, false)
    }

    fn map(size: usize, large: bool) -> std::io::Result<MmapBuffer> {
        let (ptr, capacity, alignment) = if large {
            let (ptr, capacity) = mmap::allocate_large_pages(size.max(1))?;
            (ptr, capacity, mmap::get_large_page_size())
        } else {
            let (ptr, capacity) = mmap::allocate(size.max(1))?;
            (ptr, capacity, mmap::get_page_size())
        };
        debug_assert!((ptr as usize).is_multiple_of(alignment));
        Ok(MmapBuffer {
            ptr: ptr.cast(),
            len: size,
            capacity,
            uses_large_pages: large,
            alignment,
        })
    }

    /// Requested length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Mapped bytes, `len()` rounded up to the page size.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn uses_large_pages(&self) -> bool {
        self.uses_large_pages
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: `ptr` is valid for `capacity >= len` initialised bytes.
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }

    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: as in `as_bytes`; `&mut self` makes the borrow exclusive.
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.len) }
    }

    /// Reinterprets the buffer as a slice of `T`.
    ///
    /// # Panics
    ///
    /// Panics if the buffer length is not a multiple of `size_of::<T>()`.
    #[inline]
    pub fn as_slice<T>(&self) -> &[T]
    where
        T: bytemuck::AnyBitPattern,
    {
        bytemuck::cast_slice(self.as_bytes())
    }

    /// Reinterprets the buffer as a mutable slice of `T`.
    ///
    /// # Panics
    ///
    /// Panics if the buffer length is not a multiple of `size_of::<T>()`.
    #[inline]
    pub fn as_mut_slice<T>(&mut self) -> &mut [T]
    where
        T: bytemuck::AnyBitPattern + bytemuck::NoUninit,
    {
        bytemuck::cast_slice_mut(self.as_bytes_mut())
    }

    /// Passes an access-pattern hint for the whole buffer to the kernel.
    pub fn advise(&self, advice: Advice) -> std::io::Result<()> {
        self.advise_range(advice, 0, self.len)
    }

    /// Passes an access-pattern hint for the byte range `offset..offset + len`.
    ///
    /// The range is widened to page boundaries; hints never alter the contents.
    pub fn advise_range(&self, advice: Advice, offset: usize, len: usize) -> std::io::Result<()> {
        if len == 0 {
            return Ok(());
        }
        let end = offset.saturating_add(len).min(self.capacity);
        if offset >= end {
            return Ok(());
        }
        let start = offset & !(self.alignment - 1);
        // SAFETY: `start..end` lies within the mapping and `start` is page-aligned.
        unsafe { mmap::advise(self.ptr.add(start).cast(), end - start, advice) }
    }
}

impl Drop for MmapBuffer {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            let ptr = self.ptr.cast();
            // SAFETY: `ptr` and `capacity` are the pair returned at allocation.
            let res = unsafe {
                if self.uses_large_pages {
                    mmap::free_large_pages(ptr, self.capacity)
                } else {
                    mmap::free(ptr, self.capacity)
                }
            };
            if let Err(e) = res {
                log::warn!("failed to release {} bytes: {e}", self.capacity);
            }
        }
    }
}

// SAFETY: MmapBuffer exclusively owns its memory region and releases it on drop.
unsafe impl Send for MmapBuffer {}

// SAFETY: shared access only hands out `&[u8]`; mutation requires `&mut self`.
unsafe impl Sync for MmapBuffer {}

impl std::fmt::Debug for MmapBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MmapBuffer")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .field("large", &self.uses_large_pages)
            .finish()
    }
}

/// Checks (once per process) whether large pages can be allocated.
pub fn check_large_page_support() -> std::io::Result<()> {
    static RESULT: OnceLock<std::io::Result<()>> = OnceLock::new();
    let res = RESULT.get_or_init(attempt_large_page_allocation);
    match res {
        Ok(()) => Ok(()),
        Err(e) => Err(std::io::Error::new(e.kind(), e.to_string())),
    }
}

fn attempt_large_page_allocation() -> std::io::Result<()> {
    let (ptr, size) = mmap::allocate_large_pages(1)?;
    // SAFETY: freshly mapped above and never handed out.
    let _ = unsafe { mmap::free_large_pages(ptr, size) };
    Ok(())
}
