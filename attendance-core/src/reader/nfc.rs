//! libnfc / libfreefare reader adapter
//!
//! Both libraries are loaded at runtime, so building the crate does not require
//! them to be installed. Only the handful of entry points needed for polling are
//! bound:
//!
//! - `nfc_init`, `nfc_exit`, `nfc_list_devices`, `nfc_open`, `nfc_close` (libnfc)
//! - `freefare_get_tags`, `freefare_get_tag_uid`, `freefare_free_tags` (libfreefare)
//!
//! Tag UIDs come back from libfreefare as heap-allocated hex strings; they are
//! released with the C allocator's `free`, resolved through the libfreefare handle.

use super::CardReader;
use crate::types::{CardUid, DeviceDescriptor, ReaderError};
use libloading::Library;
use std::collections::HashSet;
use std::ffi::CStr;
use std::os::raw::{c_char, c_void};
use std::ptr;

/// From nfc-types.h
const NFC_BUFSIZE_CONNSTRING: usize = 1024;
const NFC_MAX_DEVICES: usize = 8;

type NfcConnstring = [c_char; NFC_BUFSIZE_CONNSTRING];

type NfcInitFn = unsafe extern "C" fn(*mut *mut c_void);
type NfcExitFn = unsafe extern "C" fn(*mut c_void);
type NfcListDevicesFn = unsafe extern "C" fn(*mut c_void, *mut NfcConnstring, usize) -> usize;
type NfcOpenFn = unsafe extern "C" fn(*mut c_void, *const c_char) -> *mut c_void;
type NfcCloseFn = unsafe extern "C" fn(*mut c_void);
type FreefareGetTagsFn = unsafe extern "C" fn(*mut c_void) -> *mut *mut c_void;
type FreefareGetTagUidFn = unsafe extern "C" fn(*mut c_void) -> *mut c_char;
type FreefareFreeTagsFn = unsafe extern "C" fn(*mut *mut c_void);
type FreeFn = unsafe extern "C" fn(*mut c_void);

/// Shared-library names to try, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NfcLibraries {
    pub libnfc: Vec<String>,
    pub libfreefare: Vec<String>,
}

impl Default for NfcLibraries {
    fn default() -> Self {
        Self {
            libnfc: vec![
                "libnfc.so.6".to_string(),
                "libnfc.so".to_string(),
                "libnfc.dylib".to_string(),
            ],
            libfreefare: vec![
                "libfreefare.so.0".to_string(),
                "libfreefare.so".to_string(),
                "libfreefare.dylib".to_string(),
            ],
        }
    }
}

/// Resolved entry points. The libraries are kept loaded for as long as the
/// function pointers may be called.
struct NfcApi {
    nfc_init: NfcInitFn,
    nfc_exit: NfcExitFn,
    nfc_list_devices: NfcListDevicesFn,
    nfc_open: NfcOpenFn,
    nfc_close: NfcCloseFn,
    freefare_get_tags: FreefareGetTagsFn,
    freefare_get_tag_uid: FreefareGetTagUidFn,
    freefare_free_tags: FreefareFreeTagsFn,
    free: FreeFn,
    _libfreefare: Library,
    _libnfc: Library,
}

fn load_first(candidates: &[String]) -> Result<Library, ReaderError> {
    let mut errors = Vec::new();
    for name in candidates {
        // Safety: loading runs the library's initialisers; libnfc and libfreefare
        // have no unusual constructors.
        match unsafe { Library::new(name) } {
            Ok(lib) => {
                log::debug!("Loaded {}", name);
                return Ok(lib);
            }
            Err(e) => errors.push(format!("{}: {}", name, e)),
        }
    }
    Err(ReaderError::Library(errors.join("; ")))
}

/// Safety: `T` must be the exact function pointer type of `name`.
unsafe fn symbol<T: Copy>(lib: &Library, name: &str) -> Result<T, ReaderError> {
    lib.get::<T>(name.as_bytes())
        .map(|sym| *sym)
        .map_err(|e| ReaderError::Library(format!("missing symbol {}: {}", name, e)))
}

impl NfcApi {
    fn load(libs: &NfcLibraries) -> Result<Self, ReaderError> {
        let libnfc = load_first(&libs.libnfc)?;
        let libfreefare = load_first(&libs.libfreefare)?;

        // Safety: signatures match nfc.h and freefare.h.
        unsafe {
            Ok(Self {
                nfc_init: symbol(&libnfc, "nfc_init")?,
                nfc_exit: symbol(&libnfc, "nfc_exit")?,
                nfc_list_devices: symbol(&libnfc, "nfc_list_devices")?,
                nfc_open: symbol(&libnfc, "nfc_open")?,
                nfc_close: symbol(&libnfc, "nfc_close")?,
                freefare_get_tags: symbol(&libfreefare, "freefare_get_tags")?,
                freefare_get_tag_uid: symbol(&libfreefare, "freefare_get_tag_uid")?,
                freefare_free_tags: symbol(&libfreefare, "freefare_free_tags")?,
                free: symbol(&libfreefare, "free")?,
                _libfreefare: libfreefare,
                _libnfc: libnfc,
            })
        }
    }
}

/// NFC reader backed by libnfc, with MIFARE tag enumeration from libfreefare
///
/// The libnfc context is created by [`NfcReader::open`] and released on drop,
/// together with any selected device.
pub struct NfcReader {
    api: NfcApi,
    context: *mut c_void,
    device: *mut c_void,
}

impl NfcReader {
    pub fn open(libs: &NfcLibraries) -> Result<Self, ReaderError> {
        let api = NfcApi::load(libs)?;

        let mut context: *mut c_void = ptr::null_mut();
        // Safety: nfc_init writes a context pointer (or NULL) through the argument.
        unsafe { (api.nfc_init)(&mut context) };
        if context.is_null() {
            return Err(ReaderError::Library("nfc_init failed".to_string()));
        }

        log::debug!("libnfc context initialised");
        Ok(Self {
            api,
            context,
            device: ptr::null_mut(),
        })
    }
}

impl CardReader for NfcReader {
    fn list_devices(&mut self) -> Result<Vec<DeviceDescriptor>, ReaderError> {
        let mut buf: [NfcConnstring; NFC_MAX_DEVICES] = [[0; NFC_BUFSIZE_CONNSTRING]; NFC_MAX_DEVICES];

        // Safety: buf holds NFC_MAX_DEVICES connstrings, as announced.
        let count =
            unsafe { (self.api.nfc_list_devices)(self.context, buf.as_mut_ptr(), NFC_MAX_DEVICES) };

        let devices = buf
            .iter()
            .take(count.min(NFC_MAX_DEVICES))
            .map(|raw| {
                // Safety: libnfc NUL-terminates every connstring it fills in, and
                // the buffer was zeroed beforehand.
                let s = unsafe { CStr::from_ptr(raw.as_ptr()) };
                DeviceDescriptor(s.to_string_lossy().into_owned())
            })
            .collect();
        Ok(devices)
    }

    fn select(&mut self, device: &DeviceDescriptor) -> Result<(), ReaderError> {
        if !self.device.is_null() {
            return Err(ReaderError::AlreadySelected);
        }

        let bytes = device.0.as_bytes();
        if bytes.len() >= NFC_BUFSIZE_CONNSTRING || bytes.contains(&0) {
            return Err(ReaderError::OpenFailed(device.0.clone()));
        }
        let mut connstring: NfcConnstring = [0; NFC_BUFSIZE_CONNSTRING];
        for (dst, src) in connstring.iter_mut().zip(bytes) {
            *dst = *src as c_char;
        }

        // Safety: connstring is a NUL-terminated buffer of the size libnfc expects.
        let handle = unsafe { (self.api.nfc_open)(self.context, connstring.as_ptr()) };
        if handle.is_null() {
            return Err(ReaderError::OpenFailed(device.0.clone()));
        }

        self.device = handle;
        log::info!("Opened reader {}", device);
        Ok(())
    }

    fn poll(&mut self) -> Result<HashSet<CardUid>, ReaderError> {
        if self.device.is_null() {
            return Err(ReaderError::NotSelected);
        }

        // Safety: device is an open nfc_device.
        let tags = unsafe { (self.api.freefare_get_tags)(self.device) };
        if tags.is_null() {
            return Err(ReaderError::Poll("freefare_get_tags error".to_string()));
        }

        let mut uids = HashSet::new();
        let mut failure = None;
        let mut i = 0;
        loop {
            // Safety: the tag list is NULL-terminated.
            let tag = unsafe { *tags.add(i) };
            if tag.is_null() {
                break;
            }
            i += 1;

            // Safety: tag comes from the list above; the returned string is ours to free.
            let raw_uid = unsafe { (self.api.freefare_get_tag_uid)(tag) };
            if raw_uid.is_null() {
                failure = Some("freefare_get_tag_uid returned NULL".to_string());
                continue;
            }
            let text = unsafe { CStr::from_ptr(raw_uid) }
                .to_string_lossy()
                .into_owned();
            unsafe { (self.api.free)(raw_uid as *mut c_void) };

            match CardUid::from_hex(&text) {
                Ok(uid) => {
                    uids.insert(uid);
                }
                Err(e) => failure = Some(e.to_string()),
            }
        }

        // Safety: releases the list and every tag in it.
        unsafe { (self.api.freefare_free_tags)(tags) };

        match failure {
            Some(reason) => Err(ReaderError::Poll(reason)),
            None => Ok(uids),
        }
    }
}

impl Drop for NfcReader {
    fn drop(&mut self) {
        // Safety: device and context were obtained from libnfc and are released once.
        unsafe {
            if !self.device.is_null() {
                (self.api.nfc_close)(self.device);
            }
            (self.api.nfc_exit)(self.context);
        }
    }
}
