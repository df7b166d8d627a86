//! The image value shared by the converter and the pixel algorithms.
//!
//! An [Image] is a rectangular buffer of pixels in a [PixelFormat]. Its
//! metadata (dimensions, format, timestamp) never changes after
//! construction. Pixel storage is reference counted: [Clone] produces a
//! shallow copy sharing the same bytes, while [Image::to_owned_image] copies
//! them.
//!
//! Storage is either owned by the image (freed or returned to its
//! [BufferPool] when the last copy is dropped) or borrowed from the caller.
//! Borrowed views carry the lifetime of the borrowed memory, so the compiler
//! ensures the source (e.g. an acquisition buffer) outlives them.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub use ipl_formats::{
    BayerPattern, Error, ErrorKind, PixelFormat, Point2D, Rect2D, Result, Size2D,
};

pub mod buffer;
pub mod samples;
mod storage;

pub use storage::{BufferPool, PooledBuffer};
use storage::Storage;

/// Acquisition or capture time in nanoseconds.
pub type Timestamp = u64;

#[derive(Clone)]
pub struct Image<'a> {
    width: usize,
    height: usize,
    pixel_format: PixelFormat,
    timestamp: Option<Timestamp>,
    byte_len: usize,
    storage: Arc<RwLock<Storage<'a>>>,
}

/// Bytes needed by a `width` x `height` image in `fmt`.
///
/// YUV 4:2:0 frames must have even dimensions.
pub(crate) fn storage_len(width: usize, height: usize, fmt: PixelFormat) -> Result<usize> {
    if fmt.is_yuv() && (width % 2 != 0 || height % 2 != 0) {
        return Err(Error::InvalidArgument(format!(
            "{fmt} needs even dimensions, got {width}x{height}"
        )));
    }
    width
        .checked_mul(height)
        .and_then(|n| fmt.checked_storage_size_of_pixels(n))
        .ok_or_else(|| Error::InvalidArgument(format!("image size {width}x{height} overflows")))
}

fn check_len(width: usize, height: usize, fmt: PixelFormat, len: usize) -> Result<usize> {
    let required = storage_len(width, height, fmt)?;
    if len < required {
        return Err(Error::InvalidArgument(format!(
            "{len} bytes cannot hold a {width}x{height} {fmt} image ({required} bytes required)"
        )));
    }
    Ok(required)
}

impl Image<'static> {
    /// Allocate a zeroed image.
    pub fn new(width: usize, height: usize, pixel_format: PixelFormat) -> Result<Self> {
        let data = vec![0u8; storage_len(width, height, pixel_format)?];
        Self::from_vec(width, height, pixel_format, data)
    }

    /// Take ownership of `data` as pixel storage.
    ///
    /// Fails with [Error::InvalidArgument] if `data` is too small.
    pub fn from_vec(
        width: usize,
        height: usize,
        pixel_format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self> {
        Self::from_pooled(width, height, pixel_format, data.into())
    }

    /// Use a buffer obtained from a [BufferPool] as pixel storage.
    pub fn from_pooled(
        width: usize,
        height: usize,
        pixel_format: PixelFormat,
        data: PooledBuffer,
    ) -> Result<Self> {
        let byte_len = check_len(width, height, pixel_format, data.len())?;
        Ok(Self::with_storage(
            width,
            height,
            pixel_format,
            byte_len,
            Storage::Owned(data),
        ))
    }
}

impl<'a> Image<'a> {
    fn with_storage(
        width: usize,
        height: usize,
        pixel_format: PixelFormat,
        byte_len: usize,
        storage: Storage<'a>,
    ) -> Self {
        Self {
            width,
            height,
            pixel_format,
            timestamp: None,
            byte_len,
            storage: Arc::new(RwLock::new(storage)),
        }
    }

    /// Wrap read-only external memory without copying.
    ///
    /// Images created this way refuse mutable access with
    /// [Error::NotPermitted].
    pub fn from_slice(
        data: &'a [u8],
        width: usize,
        height: usize,
        pixel_format: PixelFormat,
    ) -> Result<Self> {
        let byte_len = check_len(width, height, pixel_format, data.len())?;
        Ok(Self::with_storage(
            width,
            height,
            pixel_format,
            byte_len,
            Storage::Borrowed(data),
        ))
    }

    /// Wrap mutable external memory without copying.
    pub fn from_slice_mut(
        data: &'a mut [u8],
        width: usize,
        height: usize,
        pixel_format: PixelFormat,
    ) -> Result<Self> {
        let byte_len = check_len(width, height, pixel_format, data.len())?;
        Ok(Self::with_storage(
            width,
            height,
            pixel_format,
            byte_len,
            Storage::BorrowedMut(data),
        ))
    }

    pub fn with_timestamp(mut self, timestamp: Option<Timestamp>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn size(&self) -> Size2D {
        Size2D::new(self.width, self.height)
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    pub fn timestamp(&self) -> Option<Timestamp> {
        self.timestamp
    }

    /// Number of bytes holding pixel data.
    pub fn byte_count(&self) -> usize {
        self.byte_len
    }

    /// Read access to the pixel bytes.
    ///
    /// The returned guard blocks writers on shallow copies until dropped.
    pub fn data(&self) -> ImageData<'_, 'a> {
        let guard = self
            .storage
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        ImageData {
            guard,
            len: self.byte_count(),
        }
    }

    /// Write access to the pixel bytes.
    ///
    /// Every shallow copy observes the changes.
    pub fn data_mut(&self) -> Result<ImageDataMut<'_, 'a>> {
        let guard = self
            .storage
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if !guard.is_writable() {
            return Err(Error::NotPermitted(
                "image is a read-only view of external memory".into(),
            ));
        }
        Ok(ImageDataMut {
            guard,
            len: self.byte_count(),
        })
    }

    pub fn is_writable(&self) -> bool {
        self.storage
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .is_writable()
    }

    /// True if both images are views of the same pixel storage.
    pub fn shares_storage_with(&self, other: &Image<'_>) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.storage) as *const (),
            Arc::as_ptr(&other.storage) as *const (),
        )
    }

    /// Number of images sharing this image's pixel storage.
    pub fn storage_ref_count(&self) -> usize {
        Arc::strong_count(&self.storage)
    }

    /// Copy the pixel data into a new, independently owned image.
    pub fn to_owned_image(&self) -> Image<'static> {
        let data = self.data().to_vec();
        Image::with_storage(
            self.width,
            self.height,
            self.pixel_format,
            self.byte_len,
            Storage::Owned(data.into()),
        )
        .with_timestamp(self.timestamp)
    }

    /// View the same pixel storage under different metadata.
    ///
    /// The new dimensions and format must need exactly as many bytes as the
    /// current ones. Used after in-place operations that change the Bayer
    /// pattern label or swap width and height.
    pub fn reinterpret(
        &self,
        width: usize,
        height: usize,
        pixel_format: PixelFormat,
    ) -> Result<Image<'a>> {
        let required = storage_len(width, height, pixel_format)?;
        if required != self.byte_len {
            return Err(Error::InvalidArgument(format!(
                "cannot view {} bytes as a {width}x{height} {pixel_format} image",
                self.byte_count()
            )));
        }
        Ok(Image {
            width,
            height,
            pixel_format,
            timestamp: self.timestamp,
            byte_len: required,
            storage: self.storage.clone(),
        })
    }

    /// Byte offset of the pixel at `(x, y)` from the start of the data.
    pub fn pixel_offset(&self, x: usize, y: usize) -> Result<usize> {
        if x >= self.width || y >= self.height {
            return Err(Error::OutOfRange(format!(
                "pixel ({x}, {y}) outside {}x{} image",
                self.width, self.height
            )));
        }
        let fmt = self.pixel_format;
        if fmt.is_yuv() || fmt.num_storage_bits_per_pixel() % 8 != 0 {
            return Err(Error::ImageFormatNotSupported(format!(
                "pixels of {fmt} do not start on a byte boundary"
            )));
        }
        let bytes_per_pixel = fmt.num_storage_bits_per_pixel() as usize / 8;
        Ok((y * self.width + x) * bytes_per_pixel)
    }

    /// Copy a rectangular region into a new image.
    ///
    /// Bayer images report the pattern seen from the new origin.
    pub fn crop(&self, rect: Rect2D) -> Result<Image<'static>> {
        let fmt = self.pixel_format;
        if !fmt.has_unpacked_samples() {
            return Err(Error::ImageFormatNotSupported(format!(
                "cannot crop {fmt} images"
            )));
        }
        if rect.width == 0 || rect.height == 0 || !rect.fits_within(self.size()) {
            return Err(Error::OutOfRange(format!(
                "crop {rect:?} outside {}x{} image",
                self.width, self.height
            )));
        }
        let out_fmt = if fmt.is_bayered() {
            fmt.with_bayer_pattern(fmt.bayer_pattern().shifted(rect.x, rect.y))?
        } else {
            fmt
        };
        let bpp = fmt.num_storage_bits_per_pixel() as usize / 8;
        let src_stride = self.width * bpp;
        let dst_stride = rect.width * bpp;
        let mut out = vec![0u8; dst_stride * rect.height];
        {
            let src = self.data();
            for (row, dst_row) in out.chunks_exact_mut(dst_stride).enumerate() {
                let start = (rect.y + row) * src_stride + rect.x * bpp;
                dst_row.copy_from_slice(&src[start..start + dst_stride]);
            }
        }
        Ok(Image::from_vec(rect.width, rect.height, out_fmt, out)?.with_timestamp(self.timestamp))
    }
}

impl std::fmt::Debug for Image<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("pixel_format", &self.pixel_format)
            .field("timestamp", &self.timestamp)
            .finish_non_exhaustive()
    }
}

/// Read guard over an image's pixel bytes.
pub struct ImageData<'g, 'a> {
    guard: RwLockReadGuard<'g, Storage<'a>>,
    len: usize,
}

impl std::ops::Deref for ImageData<'_, '_> {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.guard.as_slice()[..self.len]
    }
}

/// Write guard over an image's pixel bytes.
pub struct ImageDataMut<'g, 'a> {
    guard: RwLockWriteGuard<'g, Storage<'a>>,
    len: usize,
}

impl std::fmt::Debug for ImageDataMut<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageDataMut")
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

impl std::ops::Deref for ImageDataMut<'_, '_> {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.guard.as_slice()[..self.len]
    }
}

impl std::ops::DerefMut for ImageDataMut<'_, '_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        let len = self.len;
        // writability is checked when the guard is created
        match self.guard.as_mut_slice() {
            Some(data) => &mut data[..len],
            None => &mut [],
        }
    }
}

fn _test_image_is_send_sync() {
    // Compile-time test to ensure Image can cross threads.
    fn implements<T: Send + Sync>() {}
    implements::<Image<'static>>();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construct_checks_length() {
        let buf = vec![0u8; 99];
        let err = Image::from_slice(&buf, 10, 10, PixelFormat::Mono8).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let im = Image::from_slice(&buf, 9, 11, PixelFormat::Mono8).unwrap();
        assert_eq!(im.byte_count(), 99);
        assert!(Image::from_vec(4, 4, PixelFormat::Mono10p, vec![0; 19]).is_err());
        assert!(Image::from_vec(4, 4, PixelFormat::Mono10p, vec![0; 20]).is_ok());
    }

    #[test]
    fn test_borrowed_read_only() {
        let buf = vec![7u8; 12];
        let im = Image::from_slice(&buf, 2, 2, PixelFormat::RGB8).unwrap();
        assert!(!im.is_writable());
        assert_eq!(im.data_mut().unwrap_err().kind(), ErrorKind::NotPermitted);
        assert_eq!(&*im.data(), &buf[..]);
    }

    #[test]
    fn test_borrowed_mut_writes_through() {
        let mut buf = vec![0u8; 4];
        {
            let im = Image::from_slice_mut(&mut buf, 2, 2, PixelFormat::Mono8).unwrap();
            im.data_mut().unwrap()[3] = 42;
        }
        assert_eq!(buf, vec![0, 0, 0, 42]);
    }

    #[test]
    fn test_pixel_offset() {
        let im = Image::new(10, 5, PixelFormat::RGBa12).unwrap();
        assert_eq!(im.pixel_offset(0, 0).unwrap(), 0);
        assert_eq!(im.pixel_offset(3, 2).unwrap(), (2 * 10 + 3) * 8);
        assert_eq!(im.pixel_offset(10, 0).unwrap_err().kind(), ErrorKind::OutOfRange);
        let packed = Image::new(8, 2, PixelFormat::Mono12p).unwrap();
        assert_eq!(
            packed.pixel_offset(1, 1).unwrap_err().kind(),
            ErrorKind::ImageFormatNotSupported
        );
    }

    #[test]
    fn test_crop_shifts_bayer_pattern() {
        let data: Vec<u8> = (0..64).collect();
        let im = Image::from_vec(8, 8, PixelFormat::BayerRG8, data).unwrap();
        let c = im.crop(Rect2D::new(1, 2, 3, 2)).unwrap();
        assert_eq!(c.pixel_format(), PixelFormat::BayerGR8);
        assert_eq!(&*c.data(), &[17, 18, 19, 25, 26, 27]);
        let c = im.crop(Rect2D::new(1, 1, 2, 2)).unwrap();
        assert_eq!(c.pixel_format(), PixelFormat::BayerBG8);
        assert!(im.crop(Rect2D::new(7, 0, 2, 2)).is_err());
    }

    #[test]
    fn test_reinterpret_shares_storage() {
        let im = Image::new(4, 2, PixelFormat::BayerRG8).unwrap();
        let view = im.reinterpret(2, 4, PixelFormat::BayerGB8).unwrap();
        assert!(view.shares_storage_with(&im));
        assert_eq!(view.size(), Size2D::new(2, 4));
        assert!(im.reinterpret(4, 2, PixelFormat::Mono10).is_err());
    }

    #[test]
    fn test_reinterpret_rejects_overflowing_size() {
        let im = Image::new(4, 2, PixelFormat::Mono8).unwrap();
        let err = im
            .reinterpret(usize::MAX, usize::MAX, PixelFormat::Mono8)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err = im.reinterpret(usize::MAX, 1, PixelFormat::RGB8).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(im.byte_count(), 8);
    }

    #[test]
    fn test_yuv_needs_even_dimensions() {
        let fmt = PixelFormat::YUV420_8_YY_UV_SemiplanarIDS;
        for (w, h) in [(3, 2), (2, 3), (1, 1)] {
            let err = Image::new(w, h, fmt).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{w}x{h}");
            assert!(Image::from_vec(w, h, fmt, vec![0; 64]).is_err());
        }
        assert_eq!(Image::new(4, 2, fmt).unwrap().byte_count(), 12);
    }
}
