//! Page-aligned, zero-initialised anonymous memory used as the backing store
//! of heap-resident array pages.

pub mod mmap_buffer;

#[cfg_attr(target_os = "linux", path = "mmap_linux.rs")]
#[cfg_attr(not(target_os = "linux"), path = "mmap_fallback.rs")]
pub mod mmap;

pub use mmap_buffer::MmapBuffer;

/// Access-pattern hint passed to the operating system for a memory region.
///
/// Hints affect readahead and page reclamation only; they never change the
/// contents of the region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Advice {
    /// No special treatment (the default).
    Normal,
    /// Pages will be accessed in ascending order; read ahead aggressively.
    Sequential,
    /// Pages will be accessed in random order; readahead is wasted.
    Random,
    /// Pages will be needed soon.
    WillNeed,
}
