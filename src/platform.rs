//! OS platform abstraction for raw backing memory.
//!
//! Provides `sys_alloc` and `sys_free` over platform-specific virtual memory
//! APIs (VirtualAlloc on Windows, mmap on Unix). The caller is responsible
//! for alignment; allocations are returned and released whole.

#[cfg(miri)]
mod miri;

#[cfg(all(windows, not(miri)))]
mod windows;

#[cfg(all(unix, not(miri)))]
mod unix;

/// Allocate `size` bytes of raw memory. Returns null on failure. Memory is
/// zero-initialized by the OS. No alignment is promised beyond the platform
/// page size.
///
/// # Safety
/// Caller must eventually call `sys_free` with the returned pointer and the
/// same `size`.
#[inline]
pub unsafe fn sys_alloc(size: usize) -> *mut u8 {
    #[cfg(miri)]
    {
        unsafe { miri::sys_alloc(size) }
    }
    #[cfg(all(windows, not(miri)))]
    {
        unsafe { windows::sys_alloc(size) }
    }
    #[cfg(all(unix, not(miri)))]
    {
        unsafe { unix::sys_alloc(size) }
    }
}

/// Free memory previously allocated by `sys_alloc`.
///
/// # Safety
/// `ptr` must have been returned by `sys_alloc`, and `size` must match the
/// original allocation size.
#[inline]
pub unsafe fn sys_free(ptr: *mut u8, size: usize) {
    #[cfg(miri)]
    {
        unsafe { miri::sys_free(ptr, size) };
    }
    #[cfg(all(windows, not(miri)))]
    {
        unsafe { windows::sys_free(ptr, size) };
    }
    #[cfg(all(unix, not(miri)))]
    {
        unsafe { unix::sys_free(ptr, size) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_and_free() {
        unsafe {
            let size = 4096;
            let ptr = sys_alloc(size);
            assert!(!ptr.is_null());
            // Memory should be zero-initialized
            for i in 0..size {
                assert_eq!(*ptr.add(i), 0);
            }
            // Write a pattern and read it back
            for i in 0..size {
                *ptr.add(i) = (i & 0xFF) as u8;
            }
            for i in 0..size {
                assert_eq!(*ptr.add(i), (i & 0xFF) as u8);
            }
            sys_free(ptr, size);
        }
    }

    #[test]
    fn test_alloc_large() {
        unsafe {
            let size = 2 * 1024 * 1024; // 2 MiB
            let ptr = sys_alloc(size);
            assert!(!ptr.is_null());
            *ptr = 0xAA;
            *ptr.add(size - 1) = 0xBB;
            assert_eq!(*ptr, 0xAA);
            assert_eq!(*ptr.add(size - 1), 0xBB);
            sys_free(ptr, size);
        }
    }
}
