//! Pseudo-Pascal runtime library.
//!
//! Built as a static library and linked into every compiled program.
//! The exported symbols use the C calling convention with no mangling:
//! `write`, `writeln`, `readln` and the allocator
//! `__pasclang_gc_alloc`.
//!
//! The exported `write` interposes the libc symbol of the same name,
//! so console I/O here must not reach that symbol; everything goes
//! through stdio, whose internals use libc's private aliases.
//!
//! Allocations are zeroed and never collected. A collector can be
//! added behind the same allocator signature without touching the
//! compiler.

use libc::{c_char, c_int};

/// Cell tags accepted by the allocator.
const TAG_BOOLEAN: u8 = 1;
const TAG_INTEGER: u8 = 2;
const TAG_POINTER: u8 = 3;

/// Print an integer to standard output.
///
/// Not exported under `cfg(test)`: the test harness writes through
/// the very libc symbol this export interposes.
#[cfg_attr(not(test), no_mangle)]
pub extern "C" fn write(value: i32) {
    unsafe {
        libc::printf(b"%d\0".as_ptr() as *const c_char, value as c_int);
    }
}

/// Print an integer followed by a newline to standard output.
#[no_mangle]
pub extern "C" fn writeln(value: i32) {
    unsafe {
        libc::printf(b"%d\n\0".as_ptr() as *const c_char, value as c_int);
    }
}

/// Read an integer from standard input. Returns 0 when no integer can
/// be read.
#[no_mangle]
pub extern "C" fn readln() -> i32 {
    let mut value: c_int = 0;
    unsafe {
        libc::scanf(b"%d\0".as_ptr() as *const c_char, &mut value as *mut c_int);
    }
    value
}

/// Allocate `count` zeroed cells of the kind selected by `tag`.
///
/// Tag 1 allocates boolean cells, 2 integer cells, 3 pointer cells
/// (the rows of multidimensional arrays). Any other tag yields a null
/// pointer, as does a non-positive count.
#[no_mangle]
pub extern "C" fn __pasclang_gc_alloc(count: i32, tag: u8) -> *mut u8 {
    let size = match tag {
        TAG_BOOLEAN => 1,
        TAG_INTEGER => 4,
        TAG_POINTER => 8,
        _ => return std::ptr::null_mut(),
    };

    if count <= 0 {
        return std::ptr::null_mut();
    }

    unsafe { libc::calloc(count as libc::size_t, size) as *mut u8 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_returns_zeroed_cells() {
        let cells = __pasclang_gc_alloc(16, TAG_INTEGER) as *mut i32;
        assert!(!cells.is_null());

        for index in 0..16 {
            let cell = unsafe { *cells.add(index) };
            assert_eq!(cell, 0);
        }

        unsafe { libc::free(cells as *mut libc::c_void) };
    }

    #[test]
    fn test_alloc_rejects_bad_tags_and_counts() {
        assert!(__pasclang_gc_alloc(8, 0).is_null());
        assert!(__pasclang_gc_alloc(8, 4).is_null());
        assert!(__pasclang_gc_alloc(0, TAG_BOOLEAN).is_null());
        assert!(__pasclang_gc_alloc(-3, TAG_POINTER).is_null());
    }

    #[test]
    fn test_pointer_cells_are_null_initialized() {
        let rows = __pasclang_gc_alloc(4, TAG_POINTER) as *mut *mut u8;
        assert!(!rows.is_null());

        for index in 0..4 {
            let row = unsafe { *rows.add(index) };
            assert!(row.is_null());
        }

        unsafe { libc::free(rows as *mut libc::c_void) };
    }
}
