use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("No HID device matching {vendor_id:04x}:{product_id:04x}")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    #[error("Permission denied opening {0:?}")]
    PermissionDenied(PathBuf),

    #[error("Connection is already open")]
    AlreadyOpen,

    #[error("Connection is not open")]
    NotConnected,

    #[error("HID I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    #[error("Report too short to decode {field}: need {needed} bytes, got {actual}")]
    Decode {
        field: &'static str,
        needed: usize,
        actual: usize,
    },

    #[error("Output buffer too small: need {needed} bytes, got {actual}")]
    Encode { needed: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

