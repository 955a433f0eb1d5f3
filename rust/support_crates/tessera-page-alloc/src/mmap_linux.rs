//! Linux implementation: anonymous private mappings via `mmap(2)`.

use std::sync::OnceLock;

use crate::Advice;

/// Maps `size` bytes of zeroed memory backed by huge pages (`MAP_HUGETLB`).
///
/// Returns the mapping and its capacity, rounded up to the large page size.
/// Fails unless huge pages are configured (`/proc/sys/vm/nr_hugepages` or
/// `nr_overcommit_hugepages`).
pub fn allocate_large_pages(size: usize) -> std::io::Result<(*mut std::ffi::c_void, usize)> {
    map_anonymous(size, get_large_page_size(), libc::MAP_HUGETLB)
}

/// Releases a mapping returned by [`allocate_large_pages`].
///
/// # Safety
///
/// `ptr` and `size` must be exactly the pair returned by the allocation, and the
/// region must not be accessed afterwards.
pub unsafe fn free_large_pages(ptr: *mut std::ffi::c_void, size: usize) -> std::io::Result<()> {
    unsafe { free(ptr, size) }
}

/// Maps `size` bytes of zeroed memory backed by regular pages.
pub fn allocate(size: usize) -> std::io::Result<(*mut std::ffi::c_void, usize)> {
    map_anonymous(size, get_page_size(), 0)
}

/// Releases a mapping returned by [`allocate`].
///
/// # Safety
///
/// `ptr` and `size` must be exactly the pair returned by the allocation, and the
/// region must not be accessed afterwards.
pub unsafe fn free(ptr: *mut std::ffi::c_void, size: usize) -> std::io::Result<()> {
    let res = unsafe { libc::munmap(ptr, size) };
    if res < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

/// Issues `madvise(2)` for a page-aligned region of an anonymous mapping.
///
/// # Safety
///
/// `ptr..ptr + len` must lie within a live mapping and `ptr` must be page-aligned.
pub unsafe fn advise(ptr: *mut std::ffi::c_void, len: usize, advice: Advice) -> std::io::Result<()> {
    let flag = match advice {
        Advice::Normal => libc::MADV_NORMAL,
        Advice::Sequential => libc::MADV_SEQUENTIAL,
        Advice::Random => libc::MADV_RANDOM,
        Advice::WillNeed => libc::MADV_WILLNEED,
    };
    let res = unsafe { libc::madvise(ptr, len, flag) };
    if res < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

/// Returns the huge page size from `/proc/meminfo`, 2MB when it cannot be read.
pub fn get_large_page_size() -> usize {
    static SIZE: OnceLock<usize> = OnceLock::new();
    *SIZE.get_or_init(|| read_large_page_size().unwrap_or(2 * 1024 * 1024))
}

/// Returns `sysconf(_SC_PAGESIZE)`, 4KB when it cannot be queried.
pub fn get_page_size() -> usize {
    static SIZE: OnceLock<usize> = OnceLock::new();
    *SIZE.get_or_init(|| read_page_size().unwrap_or(4 * 1024))
}

fn map_anonymous(
    size: usize,
    page_size: usize,
    extra_flags: libc::c_int,
) -> std::io::Result<(*mut std::ffi::c_void, usize)> {
    assert!(page_size.is_power_of_two());
    let capacity = (size.max(1) + page_size - 1) & !(page_size - 1);
    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            capacity,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | extra_flags,
            -1,
            0,
        )
    };
    if ptr.is_null() || ptr == libc::MAP_FAILED {
        return Err(std::io::Error::last_os_error());
    }
    Ok((ptr, capacity))
}

/// Parses the `Hugepagesize:    2048 kB` line of `/proc/meminfo`.
fn read_large_page_size() -> std::io::Result<usize> {
    let meminfo = std::fs::read_to_string("/proc/meminfo")?;
    meminfo
        .lines()
        .find_map(|line| {
            let rest = line.strip_prefix("Hugepagesize:")?;
            let kb = rest.split_whitespace().next()?.parse::<usize>().ok()?;
            Some(kb * 1024)
        })
        .ok_or_else(|| std::io::Error::other("Failed to read Hugepagesize"))
}

fn read_page_size() -> std::io::Result<usize> {
    let res = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if res < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(res as usize)
}
