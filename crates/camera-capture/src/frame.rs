//! Video frame types and processing

use serde::{Deserialize, Serialize};

/// Axis-aligned pixel rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoiRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl RoiRect {
    /// Build a rectangle from two opposite corners given in any order
    ///
    /// Coordinates are floored, negative values saturate to zero, and the
    /// result is clamped to a `frame_width` x `frame_height` image.
    pub fn from_corners(
        (x0, y0): (f32, f32),
        (x1, y1): (f32, f32),
        frame_width: u32,
        frame_height: u32,
    ) -> Self {
        let clamp = |v: f32, max: u32| -> u32 {
            if v.is_nan() || v <= 0.0 {
                0
            } else {
                (v.floor() as u32).min(max)
            }
        };

        let left = clamp(x0.min(x1), frame_width);
        let right = clamp(x0.max(x1), frame_width);
        let top = clamp(y0.min(y1), frame_height);
        let bottom = clamp(y0.max(y1), frame_height);

        Self {
            x: left,
            y: top,
            width: right - left,
            height: bottom - top,
        }
    }

    /// Check if the rectangle covers no pixels
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Pixel area
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Decoded video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Interleaved pixel data (width * height * channels)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Bytes per pixel (3 for RGB)
    pub channels: u8,
    /// Capture timestamp (nanoseconds since the source opened)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u64,
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp_ns: u64, sequence: u64) -> Self {
        Self {
            data,
            width,
            height,
            channels: 3,
            timestamp_ns,
            sequence,
        }
    }

    /// Create a uniformly filled RGB frame
    pub fn filled(width: u32, height: u32, value: u8, timestamp_ns: u64, sequence: u64) -> Self {
        let len = width as usize * height as usize * 3;
        Self::new(vec![value; len], width, height, timestamp_ns, sequence)
    }

    /// Capture time in seconds
    pub fn timestamp_secs(&self) -> f64 {
        self.timestamp_ns as f64 / 1e9
    }

    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let channels = self.channels as usize;
        let idx = (y as usize * self.width as usize + x as usize) * channels;
        self.data.get(idx..idx + channels)
    }

    /// Copy out a region of the frame
    ///
    /// Returns `None` when the rectangle is empty or not fully inside the frame.
    pub fn crop(&self, rect: &RoiRect) -> Option<VideoFrame> {
        if rect.is_empty()
            || rect.x + rect.width > self.width
            || rect.y + rect.height > self.height
        {
            return None;
        }

        let channels = self.channels as usize;
        let row_len = rect.width as usize * channels;
        let mut cropped = Vec::with_capacity(rect.height as usize * row_len);
        for row in rect.y..(rect.y + rect.height) {
            let start = (row as usize * self.width as usize + rect.x as usize) * channels;
            cropped.extend_from_slice(self.data.get(start..start + row_len)?);
        }

        Some(VideoFrame {
            data: cropped,
            width: rect.width,
            height: rect.height,
            channels: self.channels,
            timestamp_ns: self.timestamp_ns,
            sequence: self.sequence,
        })
    }

    /// View the frame as an `image` RGB buffer for model preprocessing
    pub fn to_rgb_image(&self) -> Option<image::RgbImage> {
        if self.channels != 3 {
            return None;
        }
        image::RgbImage::from_raw(self.width, self.height, self.data.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn gradient(width: u32, height: u32) -> VideoFrame {
        let mut data = Vec::new();
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[x as u8, y as u8, 0]);
            }
        }
        VideoFrame::new(data, width, height, 0, 0)
    }

    #[test]
    fn test_rect_from_unordered_corners() {
        let rect = RoiRect::from_corners((50.7, 40.0), (10.2, 20.9), 640, 480);
        assert_eq!(rect, RoiRect { x: 10, y: 20, width: 40, height: 20 });
    }

    #[test]
    fn test_rect_clamped_to_frame() {
        let rect = RoiRect::from_corners((-15.0, 470.0), (30.0, 900.0), 640, 480);
        assert_eq!(rect, RoiRect { x: 0, y: 470, width: 30, height: 10 });

        let outside = RoiRect::from_corners((700.0, 10.0), (800.0, 20.0), 640, 480);
        assert!(outside.is_empty());
    }

    #[test]
    fn test_crop_copies_region() {
        let frame = gradient(8, 6);
        let crop = frame.crop(&RoiRect { x: 2, y: 1, width: 3, height: 2 }).unwrap();

        assert_eq!(crop.width, 3);
        assert_eq!(crop.height, 2);
        assert_eq!(crop.get_pixel(0, 0), Some(&[2u8, 1, 0][..]));
        assert_eq!(crop.get_pixel(2, 1), Some(&[4u8, 2, 0][..]));
    }

    #[test]
    fn test_crop_rejects_out_of_bounds() {
        let frame = gradient(8, 6);
        assert!(frame.crop(&RoiRect { x: 6, y: 0, width: 3, height: 2 }).is_none());
        assert!(frame.crop(&RoiRect { x: 0, y: 0, width: 0, height: 2 }).is_none());
    }

    #[test]
    fn test_rgb_image_view() {
        let frame = VideoFrame::filled(4, 2, 9, 0, 0);
        let img = frame.to_rgb_image().unwrap();
        assert_eq!(img.dimensions(), (4, 2));
        assert_eq!(img.get_pixel(3, 1).0, [9, 9, 9]);
    }

    proptest! {
        #[test]
        fn prop_rect_always_croppable(
            x0 in -100.0f32..800.0, y0 in -100.0f32..600.0,
            x1 in -100.0f32..800.0, y1 in -100.0f32..600.0,
        ) {
            let frame = VideoFrame::filled(64, 48, 0, 0, 0);
            let rect = RoiRect::from_corners((x0, y0), (x1, y1), frame.width, frame.height);
            prop_assert!(rect.x + rect.width <= frame.width);
            prop_assert!(rect.y + rect.height <= frame.height);
            prop_assert_eq!(frame.crop(&rect).is_some(), !rect.is_empty());
        }
    }
}
