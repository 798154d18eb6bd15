//! Backend selection module.
//!
//! This module defines the computation backends a layer can be bound to and
//! the process-wide default used when a layer is built without an explicit
//! choice.
//!
//! # Backends
//!
//! - `Internal` — Pure Rust kernels (default without the `simd` feature).
//! - `Avx` — AVX2 vectorized kernels (default with the `simd` feature).
//! - `Nnpack` — Vendor-optimized CPU kernels.
//! - `LibDnn`, `OpenCl`, `Cblas`, `IntelMkl` — Known engines that layers may
//!   refuse at construction time.
//!
//! Which of these a layer accepts is decided by the layer's kernel selection,
//! not by this module.
//!
//! The default backend is stored globally using an `AtomicU8`, so reading it
//! on every layer construction is cheap.

use crate::error::Error;
use core::convert::TryFrom;
use core::fmt;
use core::str::FromStr;
use core::sync::atomic::{AtomicU8, Ordering};

/// Enumeration of known computation backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Backend {
    /// Portable Rust kernels.
    Internal = 0,
    /// NNPACK-style vendor CPU kernels.
    Nnpack = 1,
    /// Greentea LibDNN kernels.
    LibDnn = 2,
    /// AVX2 vectorized kernels.
    Avx = 3,
    /// OpenCL device kernels.
    OpenCl = 4,
    /// CBLAS routines.
    Cblas = 5,
    /// Intel MKL routines.
    IntelMkl = 6,
}

impl Backend {
    /// Every known backend, in discriminant order.
    pub const ALL: [Self; 7] = [
        Self::Internal,
        Self::Nnpack,
        Self::LibDnn,
        Self::Avx,
        Self::OpenCl,
        Self::Cblas,
        Self::IntelMkl,
    ];

    /// The canonical lowercase name of the backend.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::Nnpack => "nnpack",
            Self::LibDnn => "libdnn",
            Self::Avx => "avx",
            Self::OpenCl => "opencl",
            Self::Cblas => "cblas",
            Self::IntelMkl => "intel_mkl",
        }
    }

    /// The backend picked when nothing else is configured.
    #[must_use]
    pub const fn default_engine() -> Self {
        if cfg!(feature = "simd") {
            Self::Avx
        } else {
            Self::Internal
        }
    }
}

impl Default for Backend {
    fn default() -> Self {
        Self::default_engine()
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for Backend {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Internal),
            1 => Ok(Self::Nnpack),
            2 => Ok(Self::LibDnn),
            3 => Ok(Self::Avx),
            4 => Ok(Self::OpenCl),
            5 => Ok(Self::Cblas),
            6 => Ok(Self::IntelMkl),
            _ => Err(()),
        }
    }
}

impl FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|b| b.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::UnknownBackend(wanted.to_owned()))
    }
}

/// Internal global state for the default backend.
///
/// Relaxed ordering is enough: the value is only read when a layer is built.
static GLOBAL_DEFAULT_BACKEND: AtomicU8 = AtomicU8::new(Backend::default_engine() as u8);

/// Sets the backend used by layers built without an explicit choice.
///
/// Layers that already exist keep the backend they were built with.
///
/// # Example
/// ```
/// use fc_core::backend::{get_backend, set_backend, Backend};
/// set_backend(Backend::Nnpack);
/// assert_eq!(get_backend(), Backend::Nnpack);
/// # set_backend(Backend::default_engine());
/// ```
pub fn set_backend(b: Backend) {
    GLOBAL_DEFAULT_BACKEND.store(b as u8, Ordering::Relaxed);
}

/// Returns the backend used by layers built without an explicit choice.
///
/// If the stored value is invalid, defaults to [`Backend::default_engine`].
pub fn get_backend() -> Backend {
    Backend::try_from(GLOBAL_DEFAULT_BACKEND.load(Ordering::Relaxed)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_str() {
        for b in Backend::ALL {
            assert_eq!(b.name().parse::<Backend>().unwrap(), b);
            assert_eq!(b.to_string(), b.name());
        }
        assert_eq!(" AVX ".parse::<Backend>().unwrap(), Backend::Avx);
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = "tpu".parse::<Backend>().unwrap_err();
        assert!(matches!(err, Error::UnknownBackend(ref s) if s == "tpu"));
    }

    #[test]
    fn try_from_u8_matches_discriminants() {
        for b in Backend::ALL {
            assert_eq!(Backend::try_from(b as u8), Ok(b));
        }
        assert_eq!(Backend::try_from(7), Err(()));
    }
}
