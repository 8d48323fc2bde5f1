//! C ABI for embedding okon in non-Rust hosts.
//!
//! Three entry points mirror the library façade:
//!
//! | Function             | Returns                                  |
//! |----------------------|------------------------------------------|
//! | `okon_prepare`       | 0 built, -1 failure                      |
//! | `okon_exists_text`   | 1 found, 0 not found, -1 invalid input   |
//! | `okon_exists_binary` | 1 found, 0 not found, -1 invalid input   |
//!
//! All pointer arguments must be non-null; paths and the text digest must
//! be NUL-terminated. `okon_exists_binary` reads exactly 20 bytes from
//! its digest pointer. A corrupt index reads as "not found", matching the
//! library's lookup policy; an index that cannot be opened at all is an
//! input error.

#![allow(clippy::not_unsafe_ptr_arg_deref)]

use std::ffi::CStr;
use std::os::raw::{c_char, c_int};
use std::path::Path;

use tracing::warn;

use crate::btree::Btree;
use crate::encoding::sha1::{Sha1, SHA1_BINARY_LENGTH};
use crate::encoding::text_to_sha1;
use crate::preparer::{prepare_file, DEFAULT_ORDER};

const OKON_FOUND: c_int = 1;
const OKON_NOT_FOUND: c_int = 0;
const OKON_PREPARE_OK: c_int = 0;
const OKON_ERROR: c_int = -1;

/// # Safety
///
/// `ptr` must be null or point at a NUL-terminated string that outlives
/// the call.
unsafe fn cstr_arg<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }

    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

fn exists(sha1: &Sha1, index_path: &str) -> c_int {
    match Btree::open_file(Path::new(index_path)) {
        Ok(mut btree) => {
            if btree.contains(sha1) {
                OKON_FOUND
            } else {
                OKON_NOT_FOUND
            }
        }
        Err(error) => {
            warn!("failed to open index '{index_path}': {error:#}");
            OKON_ERROR
        }
    }
}

/// Builds `<output_dir>/okon.btree` from a sorted digest corpus.
///
/// # Safety
///
/// Both arguments must be non-null NUL-terminated paths.
#[no_mangle]
pub unsafe extern "C" fn okon_prepare(
    input_db_file_path: *const c_char,
    output_file_directory: *const c_char,
) -> c_int {
    let (Some(input), Some(output_dir)) = (unsafe { cstr_arg(input_db_file_path) }, unsafe {
        cstr_arg(output_file_directory)
    }) else {
        return OKON_ERROR;
    };

    match prepare_file(Path::new(input), Path::new(output_dir), DEFAULT_ORDER) {
        Ok(_) => OKON_PREPARE_OK,
        Err(error) => {
            warn!("prepare failed: {error:#}");
            OKON_ERROR
        }
    }
}

/// Looks up a digest given as 40 hexadecimal characters.
///
/// # Safety
///
/// Both arguments must be non-null NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn okon_exists_text(
    sha1: *const c_char,
    processed_file_path: *const c_char,
) -> c_int {
    let (Some(text), Some(index_path)) = (unsafe { cstr_arg(sha1) }, unsafe {
        cstr_arg(processed_file_path)
    }) else {
        return OKON_ERROR;
    };

    match text_to_sha1(text) {
        Ok(sha1) => exists(&sha1, index_path),
        Err(_) => OKON_ERROR,
    }
}

/// Looks up a digest given as 20 raw bytes.
///
/// # Safety
///
/// `sha1` must point at 20 readable bytes; the path must be a non-null
/// NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn okon_exists_binary(
    sha1: *const u8,
    processed_file_path: *const c_char,
) -> c_int {
    if sha1.is_null() {
        return OKON_ERROR;
    }
    let Some(index_path) = (unsafe { cstr_arg(processed_file_path) }) else {
        return OKON_ERROR;
    };

    let mut digest: Sha1 = [0u8; SHA1_BINARY_LENGTH];
    unsafe {
        std::ptr::copy_nonoverlapping(sha1, digest.as_mut_ptr(), SHA1_BINARY_LENGTH);
    }

    exists(&digest, index_path)
}
