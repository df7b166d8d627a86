use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size2D {
    pub width: usize,
    pub height: usize,
}

impl Size2D {
    pub const fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    pub const fn area(&self) -> usize {
        self.width * self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Point2D {
    pub x: usize,
    pub y: usize,
}

impl Point2D {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle with its origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect2D {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Rect2D {
    pub const fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub const fn size(&self) -> Size2D {
        Size2D::new(self.width, self.height)
    }

    /// True if the rectangle lies completely within an image of `size`.
    pub fn fits_within(&self, size: Size2D) -> bool {
        self.x
            .checked_add(self.width)
            .is_some_and(|right| right <= size.width)
            && self
                .y
                .checked_add(self.height)
                .is_some_and(|bottom| bottom <= size.height)
    }

    pub fn contains(&self, p: Point2D) -> bool {
        p.x >= self.x && p.y >= self.y && p.x - self.x < self.width && p.y - self.y < self.height
    }
}

#[test]
fn test_rect_fits() {
    let size = Size2D::new(100, 50);
    assert!(Rect2D::new(0, 0, 100, 50).fits_within(size));
    assert!(!Rect2D::new(1, 0, 100, 50).fits_within(size));
    assert!(!Rect2D::new(usize::MAX, 0, 2, 1).fits_within(size));
    assert!(Rect2D::new(10, 10, 5, 5).contains(Point2D::new(14, 10)));
    assert!(!Rect2D::new(10, 10, 5, 5).contains(Point2D::new(15, 10)));
}
