//! Zero-copy interpretation of acquisition buffers as images.
//!
//! The acquisition layer fills buffers and describes them through the
//! [AcquisitionBuffer] trait. The functions here locate the pixel data
//! inside such a buffer, honoring line-crop chunks and chunk-only payloads,
//! and wrap it as a borrowed [Image]. The image borrows the buffer, so the
//! buffer cannot be re-queued while the image is alive.

use crate::{Error, Image, PixelFormat, Result, Timestamp};

/// Chunk carrying the usable height and vertical offset of a line-cropped
/// image.
pub const CROP_CHUNK_ID: u32 = 0x7302_0405;

/// Location of one chunk within a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkInfo {
    pub id: u32,
    /// Byte offset from the start of the buffer.
    pub offset: usize,
    pub size: usize,
}

/// A buffer filled by the acquisition layer.
pub trait AcquisitionBuffer {
    /// The complete buffer memory.
    fn bytes(&self) -> &[u8];
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    /// PFNC code of the pixel format.
    fn pixel_format_code(&self) -> u32;
    /// Offset of the first pixel from the start of the buffer.
    fn image_offset(&self) -> usize;
    /// False if the payload consists of chunks only.
    fn has_image(&self) -> bool;
    fn has_chunks(&self) -> bool;
    fn chunks(&self) -> Vec<ChunkInfo>;
    fn timestamp(&self) -> Option<Timestamp> {
        None
    }
}

pub trait AcquisitionBufferMut: AcquisitionBuffer {
    fn bytes_mut(&mut self) -> &mut [u8];
}

/// String-keyed device properties, as exposed by a GenICam node map.
pub trait NodeMap {
    fn integer(&self, name: &str) -> Option<i64>;
    /// The integer value of an enumeration entry.
    fn enumeration(&self, name: &str) -> Option<i64> {
        self.integer(name)
    }
}

/// Where the image lives inside a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageWindow {
    pub offset: usize,
    pub len: usize,
    pub width: usize,
    pub height: usize,
    pub pixel_format: PixelFormat,
}

/// Compute the pixel window of `buffer`.
///
/// `node_map` is only consulted for chunk-only payloads.
pub fn locate_image<B>(buffer: &B, node_map: Option<&dyn NodeMap>) -> Result<ImageWindow>
where
    B: AcquisitionBuffer + ?Sized,
{
    let bytes = buffer.bytes();
    if bytes.is_empty() {
        return Err(Error::InvalidArgument("buffer has no memory".into()));
    }

    let window = if buffer.has_image() {
        image_payload_window(buffer)?
    } else if buffer.has_chunks() {
        chunk_payload_window(buffer, node_map)?
    } else {
        return Err(Error::InvalidCast(
            "Buffer has no image data and no chunks.".into(),
        ));
    };

    let in_bounds = window
        .offset
        .checked_add(window.len)
        .is_some_and(|end| end <= bytes.len());
    if !in_bounds {
        return Err(Error::InvalidArgument(format!(
            "image window {}+{} exceeds the {} byte buffer",
            window.offset,
            window.len,
            bytes.len()
        )));
    }
    Ok(window)
}

fn image_payload_window<B>(buffer: &B) -> Result<ImageWindow>
where
    B: AcquisitionBuffer + ?Sized,
{
    let pixel_format = PixelFormat::try_from(buffer.pixel_format_code())?;
    let size = buffer.bytes().len();
    let offset = buffer.image_offset();
    if offset > size {
        return Err(Error::InvalidArgument(format!(
            "image offset {offset} beyond the {size} byte buffer"
        )));
    }
    let mut window = ImageWindow {
        offset,
        len: size - offset,
        width: buffer.width(),
        height: buffer.height(),
        pixel_format,
    };

    if buffer.has_chunks() {
        let chunks = buffer.chunks();
        let Some(image_chunk) = chunks.first() else {
            return Err(Error::Internal("Buffer has no chunks.".into()));
        };
        if let Some(crop) = chunks.iter().find(|c| c.id == CROP_CHUNK_ID) {
            let (usable_height, offset_y) = read_crop_chunk(buffer.bytes(), crop)?;
            if window.height == 0 {
                return Err(Error::InvalidArgument("buffer height is zero".into()));
            }
            if usable_height + offset_y > window.height {
                return Err(Error::InvalidCast(format!(
                    "crop chunk declares rows {offset_y}..{} of a {} row image",
                    usable_height + offset_y,
                    window.height
                )));
            }
            let image_size_without_chunks = image_chunk.size;
            let pitch = image_size_without_chunks / window.height;
            tracing::debug!(
                "line crop chunk: usable height {usable_height} at row {offset_y}, pitch {pitch}"
            );
            window.offset += pitch * offset_y;
            window.len = image_size_without_chunks - pitch * (window.height - usable_height);
            window.height = usable_height;
        }
    }
    Ok(window)
}

/// Usable height and vertical offset, stored as the second and fourth
/// little-endian `u16` of the crop chunk.
fn read_crop_chunk(bytes: &[u8], chunk: &ChunkInfo) -> Result<(usize, usize)> {
    let data = chunk
        .offset
        .checked_add(chunk.size)
        .and_then(|end| bytes.get(chunk.offset..end))
        .filter(|data| data.len() >= 8)
        .ok_or_else(|| {
            Error::InvalidCast(format!(
                "crop chunk of {} bytes at {} is truncated",
                chunk.size, chunk.offset
            ))
        })?;
    let word = |i: usize| u16::from_le_bytes([data[2 * i], data[2 * i + 1]]) as usize;
    Ok((word(1), word(3)))
}

fn chunk_payload_window<B>(buffer: &B, node_map: Option<&dyn NodeMap>) -> Result<ImageWindow>
where
    B: AcquisitionBuffer + ?Sized,
{
    let missing = |name: &str| Error::InvalidCast(format!("node {name} is not available"));
    let node_map = node_map.ok_or_else(|| {
        Error::InvalidCast("chunk-only payload requires the device node map".into())
    })?;
    let width = node_map
        .integer("ChunkWidth")
        .ok_or_else(|| missing("ChunkWidth"))?;
    let height = node_map
        .integer("ChunkHeight")
        .ok_or_else(|| missing("ChunkHeight"))?;
    let code = node_map
        .enumeration("ChunkPixelFormat")
        .ok_or_else(|| missing("ChunkPixelFormat"))?;
    let to_usize = |v: i64, name: &str| {
        usize::try_from(v).map_err(|_| Error::InvalidCast(format!("{name} is negative: {v}")))
    };
    let width = to_usize(width, "ChunkWidth")?;
    let height = to_usize(height, "ChunkHeight")?;
    let pixel_format = u32::try_from(code)
        .map_err(|_| Error::InvalidCast(format!("invalid ChunkPixelFormat {code}")))
        .and_then(PixelFormat::try_from)?;

    let chunks = buffer.chunks();
    let Some(first) = chunks.first() else {
        return Err(Error::Internal("Buffer has no chunks.".into()));
    };
    let expected = crate::storage_len(width, height, pixel_format).map_err(|_| {
        Error::InvalidCast(format!(
            "chunk image size {width}x{height} is not valid for {pixel_format}"
        ))
    })?;
    if first.size < expected {
        return Err(Error::InvalidCast(format!(
            "The buffer's first chunk's size ({}) is smaller than the expected data size ({expected}).",
            first.size
        )));
    }
    Ok(ImageWindow {
        offset: first.offset,
        len: first.size,
        width,
        height,
        pixel_format,
    })
}

/// Wrap the pixels of `buffer` as a read-only image without copying.
pub fn image_from_buffer<'a, B>(buffer: &'a B, node_map: Option<&dyn NodeMap>) -> Result<Image<'a>>
where
    B: AcquisitionBuffer + ?Sized,
{
    let w = locate_image(buffer, node_map)?;
    let data = &buffer.bytes()[w.offset..w.offset + w.len];
    Ok(Image::from_slice(data, w.width, w.height, w.pixel_format)?
        .with_timestamp(buffer.timestamp()))
}

/// Wrap the pixels of `buffer` as a writable image without copying.
pub fn image_from_buffer_mut<'a, B>(
    buffer: &'a mut B,
    node_map: Option<&dyn NodeMap>,
) -> Result<Image<'a>>
where
    B: AcquisitionBufferMut + ?Sized,
{
    let w = locate_image(&*buffer, node_map)?;
    let timestamp = buffer.timestamp();
    let data = &mut buffer.bytes_mut()[w.offset..w.offset + w.len];
    Ok(Image::from_slice_mut(data, w.width, w.height, w.pixel_format)?.with_timestamp(timestamp))
}

/// A plain in-memory [AcquisitionBuffer].
#[derive(Debug, Clone)]
pub struct SimpleBuffer<T> {
    pub data: T,
    pub width: usize,
    pub height: usize,
    pub pixel_format_code: u32,
    pub image_offset: usize,
    pub has_image: bool,
    /// `None` if the buffer carries no chunk data.
    pub chunks: Option<Vec<ChunkInfo>>,
    pub timestamp: Option<Timestamp>,
}

impl<T: AsRef<[u8]>> SimpleBuffer<T> {
    /// A buffer holding a single image at offset zero.
    pub fn new(data: T, width: usize, height: usize, pixel_format: PixelFormat) -> Self {
        Self {
            data,
            width,
            height,
            pixel_format_code: pixel_format.code(),
            image_offset: 0,
            has_image: true,
            chunks: None,
            timestamp: None,
        }
    }
}

impl<T: AsRef<[u8]>> AcquisitionBuffer for SimpleBuffer<T> {
    fn bytes(&self) -> &[u8] {
        self.data.as_ref()
    }
    fn width(&self) -> usize {
        self.width
    }
    fn height(&self) -> usize {
        self.height
    }
    fn pixel_format_code(&self) -> u32 {
        self.pixel_format_code
    }
    fn image_offset(&self) -> usize {
        self.image_offset
    }
    fn has_image(&self) -> bool {
        self.has_image
    }
    fn has_chunks(&self) -> bool {
        self.chunks.is_some()
    }
    fn chunks(&self) -> Vec<ChunkInfo> {
        self.chunks.clone().unwrap_or_default()
    }
    fn timestamp(&self) -> Option<Timestamp> {
        self.timestamp
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> AcquisitionBufferMut for SimpleBuffer<T> {
    fn bytes_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }
}
