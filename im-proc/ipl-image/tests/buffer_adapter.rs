use std::collections::HashMap;

use ipl_image::{
    ErrorKind, PixelFormat,
    buffer::{
        AcquisitionBuffer, CROP_CHUNK_ID, ChunkInfo, NodeMap, SimpleBuffer, image_from_buffer,
        image_from_buffer_mut, locate_image,
    },
};

struct Nodes(HashMap<&'static str, i64>);

impl NodeMap for Nodes {
    fn integer(&self, name: &str) -> Option<i64> {
        self.0.get(name).copied()
    }
}

fn crop_chunk(usable_height: u16, offset_y: u16) -> Vec<u8> {
    [0u16, usable_height, 0, offset_y]
        .iter()
        .flat_map(|w| w.to_le_bytes())
        .collect()
}

#[test_log::test]
fn plain_image_is_zero_copy() {
    let data: Vec<u8> = (0..=255).collect();
    let mut buf = SimpleBuffer::new(&data[..], 16, 15, PixelFormat::Mono8);
    buf.image_offset = 16;
    buf.timestamp = Some(99);
    let im = image_from_buffer(&buf, None).unwrap();
    assert_eq!(im.size().area(), 240);
    assert_eq!(im.data()[0], 16);
    assert_eq!(im.timestamp(), Some(99));
    assert!(!im.is_writable());
    assert!(std::ptr::eq(im.data().as_ptr(), data[16..].as_ptr()));
}

#[test_log::test]
fn null_buffer_is_invalid_argument() {
    let buf = SimpleBuffer::new(&[0u8; 0][..], 0, 0, PixelFormat::Mono8);
    let err = locate_image(&buf, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test_log::test]
fn crop_chunk_restricts_window() {
    const W: usize = 10;
    const H: usize = 8;
    let pitch = W;
    let image_size = pitch * H;
    let mut data: Vec<u8> = (0..image_size as u8).collect();
    let chunk_offset = data.len();
    data.extend(crop_chunk(5, 2));

    let mut buf = SimpleBuffer::new(data, W, H, PixelFormat::Mono8);
    buf.chunks = Some(vec![
        ChunkInfo {
            id: 1,
            offset: 0,
            size: image_size,
        },
        ChunkInfo {
            id: CROP_CHUNK_ID,
            offset: chunk_offset,
            size: 8,
        },
    ]);

    let window = locate_image(&buf, None).unwrap();
    assert_eq!(window.offset, pitch * 2);
    assert_eq!(window.len, pitch * 5);
    assert_eq!(window.height, 5);
    assert_eq!(window.width, W);

    let im = image_from_buffer_mut(&mut buf, None).unwrap();
    assert_eq!(im.height(), 5);
    assert_eq!(im.data()[0], 20);
    im.data_mut().unwrap()[0] = 0xFF;
    drop(im);
    assert_eq!(buf.bytes()[20], 0xFF);
}

#[test_log::test]
fn crop_chunk_beyond_height_is_invalid_cast() {
    let mut data = vec![0u8; 16];
    data.extend(crop_chunk(4, 1));
    let mut buf = SimpleBuffer::new(data, 4, 4, PixelFormat::Mono8);
    buf.chunks = Some(vec![
        ChunkInfo {
            id: 1,
            offset: 0,
            size: 16,
        },
        ChunkInfo {
            id: CROP_CHUNK_ID,
            offset: 16,
            size: 8,
        },
    ]);
    assert_eq!(
        locate_image(&buf, None).unwrap_err().kind(),
        ErrorKind::InvalidCast
    );
}

#[test_log::test]
fn empty_chunk_list_is_internal_error() {
    let mut buf = SimpleBuffer::new(vec![0u8; 16], 4, 4, PixelFormat::Mono8);
    buf.chunks = Some(vec![]);
    assert_eq!(
        locate_image(&buf, None).unwrap_err().kind(),
        ErrorKind::Internal
    );
}

#[test_log::test]
fn chunk_only_payload_uses_node_map() {
    let mut data = vec![0u8; 4];
    data.extend(std::iter::repeat_n(7u8, 2 * 4 * 3));
    let mut buf = SimpleBuffer::new(data, 0, 0, PixelFormat::Mono8);
    buf.has_image = false;
    buf.chunks = Some(vec![ChunkInfo {
        id: 42,
        offset: 4,
        size: 24,
    }]);
    let nodes = Nodes(HashMap::from([
        ("ChunkWidth", 4),
        ("ChunkHeight", 3),
        ("ChunkPixelFormat", PixelFormat::Mono12.code() as i64),
    ]));

    let im = image_from_buffer(&buf, Some(&nodes)).unwrap();
    assert_eq!(im.pixel_format(), PixelFormat::Mono12);
    assert_eq!(im.samples().unwrap(), vec![0x0707; 12]);

    let mut small = nodes.0.clone();
    small.insert("ChunkHeight", 4);
    let err = image_from_buffer(&buf, Some(&Nodes(small))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidCast);
    assert!(err.to_string().contains("(24)"));
    assert!(err.to_string().contains("(32)"));

    let mut missing = nodes.0.clone();
    missing.remove("ChunkPixelFormat");
    let err = image_from_buffer(&buf, Some(&Nodes(missing))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidCast);
    assert_eq!(
        image_from_buffer(&buf, None).unwrap_err().kind(),
        ErrorKind::InvalidCast
    );
}

#[test_log::test]
fn chunk_only_payload_with_huge_size_is_invalid_cast() {
    let mut buf = SimpleBuffer::new(vec![0u8; 16], 0, 0, PixelFormat::Mono8);
    buf.has_image = false;
    buf.chunks = Some(vec![ChunkInfo {
        id: 42,
        offset: 0,
        size: 16,
    }]);
    for (w, h) in [(i64::MAX, i64::MAX), (i64::MAX, 1)] {
        let nodes = Nodes(HashMap::from([
            ("ChunkWidth", w),
            ("ChunkHeight", h),
            ("ChunkPixelFormat", PixelFormat::RGB8.code() as i64),
        ]));
        let err = image_from_buffer(&buf, Some(&nodes)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCast, "{w}x{h}");
    }
}

#[test_log::test]
fn no_image_and_no_chunks() {
    let mut buf = SimpleBuffer::new(vec![0u8; 4], 2, 2, PixelFormat::Mono8);
    buf.has_image = false;
    assert_eq!(
        locate_image(&buf, None).unwrap_err().kind(),
        ErrorKind::InvalidCast
    );
}

#[test_log::test]
fn unknown_pixel_format_code() {
    let mut buf = SimpleBuffer::new(vec![0u8; 4], 2, 2, PixelFormat::Mono8);
    buf.pixel_format_code = 0xDEAD_BEEF;
    assert_eq!(
        locate_image(&buf, None).unwrap_err().kind(),
        ErrorKind::ImageFormatNotSupported
    );
}
