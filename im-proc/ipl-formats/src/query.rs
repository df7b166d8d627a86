//! Two-phase queries against property backends which report the size they
//! need when the caller's buffer is too small.

use crate::{Error, Result};

/// Result of one attempt to fill a caller-provided buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    /// The buffer was large enough and this many elements were written.
    Done(usize),
    /// The buffer must hold at least this many elements.
    TooSmall(usize),
}

/// Call `fill` with a buffer, growing it once if the backend asks for more.
pub fn query_with_growable_buffer<T, F>(mut fill: F) -> Result<Vec<T>>
where
    T: Default + Clone,
    F: FnMut(&mut [T]) -> Result<Fill>,
{
    let mut buf: Vec<T> = Vec::new();
    for _ in 0..2 {
        match fill(&mut buf)? {
            Fill::Done(n) => {
                buf.truncate(n);
                return Ok(buf);
            }
            Fill::TooSmall(required) => buf.resize(required, T::default()),
        }
    }
    // The backend grew its requirement between the two calls.
    Err(Error::BufferTooSmall {
        required: buf.len() + 1,
        actual: buf.len(),
    })
}

/// Like [query_with_growable_buffer] for NUL-terminated strings.
pub fn query_string<F>(fill: F) -> Result<String>
where
    F: FnMut(&mut [u8]) -> Result<Fill>,
{
    let mut bytes = query_with_growable_buffer(fill)?;
    if let Some(nul) = bytes.iter().position(|&b| b == 0) {
        bytes.truncate(nul);
    }
    String::from_utf8(bytes).map_err(|e| Error::InvalidCast(format!("invalid UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(value: &'static [u8]) -> impl FnMut(&mut [u8]) -> Result<Fill> {
        move |buf: &mut [u8]| {
            if buf.len() < value.len() {
                return Ok(Fill::TooSmall(value.len()));
            }
            buf[..value.len()].copy_from_slice(value);
            Ok(Fill::Done(value.len()))
        }
    }

    #[test]
    fn test_grows_once() {
        let mut calls = 0;
        let mut inner = backend(b"BayerRG8\0");
        let s = query_string(|buf| {
            calls += 1;
            inner(buf)
        })
        .unwrap();
        assert_eq!(s, "BayerRG8");
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_moving_target_fails() {
        let mut need = 4;
        let err = query_with_growable_buffer::<u32, _>(|buf| {
            if buf.len() < need {
                let n = need;
                need *= 2;
                return Ok(Fill::TooSmall(n));
            }
            Ok(Fill::Done(need))
        })
        .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::BufferTooSmall);
    }

    #[test]
    fn test_backend_error_propagates() {
        let err = query_with_growable_buffer::<u8, _>(|_| Err(Error::Busy("device".into())))
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Busy);
    }
}
