use std::borrow::Cow;

use image::imageops;

use crate::orientation::domain::device_orientation::{CameraPosition, DeviceOrientation};
use crate::shared::frame::Frame;

/// The eight EXIF orientation codes: how the stored pixel rows map onto the
/// upright image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ExifOrientation {
    /// Row 0 at the top, column 0 on the left.
    Up = 1,
    UpMirrored = 2,
    Down = 3,
    DownMirrored = 4,
    LeftMirrored = 5,
    /// Row 0 on the right, column 0 at the top. The default for a
    /// portrait-held camera whose sensor is mounted in landscape.
    Right = 6,
    RightMirrored = 7,
    Left = 8,
}

impl ExifOrientation {
    pub const ALL: [ExifOrientation; 8] = [
        ExifOrientation::Up,
        ExifOrientation::UpMirrored,
        ExifOrientation::Down,
        ExifOrientation::DownMirrored,
        ExifOrientation::LeftMirrored,
        ExifOrientation::Right,
        ExifOrientation::RightMirrored,
        ExifOrientation::Left,
    ];

    /// Maps the device orientation and active camera to the code the
    /// detector needs to see the image upright. The front camera mirrors
    /// the landscape cases.
    pub fn from_device(orientation: DeviceOrientation, position: CameraPosition) -> Self {
        match orientation {
            DeviceOrientation::PortraitUpsideDown => ExifOrientation::Left,
            DeviceOrientation::LandscapeLeft => match position {
                CameraPosition::Front => ExifOrientation::Down,
                CameraPosition::Back => ExifOrientation::Up,
            },
            DeviceOrientation::LandscapeRight => match position {
                CameraPosition::Front => ExifOrientation::Up,
                CameraPosition::Back => ExifOrientation::Down,
            },
            _ => ExifOrientation::Right,
        }
    }

    pub fn from_raw(value: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.raw() == value)
    }

    pub fn raw(self) -> u32 {
        self as u32
    }

    /// Codes 5..=8 rotate by a quarter turn, so width and height swap.
    pub fn swaps_dimensions(self) -> bool {
        self.raw() >= 5
    }

    pub fn upright_dimensions(self, width: u32, height: u32) -> (u32, u32) {
        if self.swaps_dimensions() {
            (height, width)
        } else {
            (width, height)
        }
    }

    /// Returns the frame as it looks upright.
    ///
    /// `Up` borrows the input untouched. Every other code needs a
    /// well-formed RGB frame and yields `None` otherwise.
    pub fn apply<'a>(self, frame: &'a Frame) -> Option<Cow<'a, Frame>> {
        if self == ExifOrientation::Up {
            return Some(Cow::Borrowed(frame));
        }
        let img = frame.to_rgb_image()?;
        let upright = match self {
            ExifOrientation::Up => img,
            ExifOrientation::UpMirrored => imageops::flip_horizontal(&img),
            ExifOrientation::Down => imageops::rotate180(&img),
            ExifOrientation::DownMirrored => imageops::flip_vertical(&img),
            ExifOrientation::LeftMirrored => imageops::flip_horizontal(&imageops::rotate90(&img)),
            ExifOrientation::Right => imageops::rotate90(&img),
            ExifOrientation::RightMirrored => imageops::flip_vertical(&imageops::rotate90(&img)),
            ExifOrientation::Left => imageops::rotate270(&img),
        };
        Some(Cow::Owned(Frame::from_rgb_image(upright, frame.index())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    // ── Device mapping ───────────────────────────────────────────────

    #[rstest]
    #[case::upside_down_back(DeviceOrientation::PortraitUpsideDown, CameraPosition::Back, ExifOrientation::Left)]
    #[case::upside_down_front(DeviceOrientation::PortraitUpsideDown, CameraPosition::Front, ExifOrientation::Left)]
    #[case::landscape_left_back(DeviceOrientation::LandscapeLeft, CameraPosition::Back, ExifOrientation::Up)]
    #[case::landscape_left_front(DeviceOrientation::LandscapeLeft, CameraPosition::Front, ExifOrientation::Down)]
    #[case::landscape_right_back(DeviceOrientation::LandscapeRight, CameraPosition::Back, ExifOrientation::Down)]
    #[case::landscape_right_front(DeviceOrientation::LandscapeRight, CameraPosition::Front, ExifOrientation::Up)]
    #[case::portrait_back(DeviceOrientation::Portrait, CameraPosition::Back, ExifOrientation::Right)]
    #[case::portrait_front(DeviceOrientation::Portrait, CameraPosition::Front, ExifOrientation::Right)]
    #[case::face_up(DeviceOrientation::FaceUp, CameraPosition::Back, ExifOrientation::Right)]
    #[case::face_down(DeviceOrientation::FaceDown, CameraPosition::Front, ExifOrientation::Right)]
    #[case::unknown(DeviceOrientation::Unknown, CameraPosition::Back, ExifOrientation::Right)]
    fn test_from_device_table(
        #[case] orientation: DeviceOrientation,
        #[case] position: CameraPosition,
        #[case] expected: ExifOrientation,
    ) {
        assert_eq!(ExifOrientation::from_device(orientation, position), expected);
    }

    #[test]
    fn test_mapping_is_total_and_deterministic() {
        for &o in DeviceOrientation::ALL {
            for p in [CameraPosition::Back, CameraPosition::Front] {
                let first = ExifOrientation::from_device(o, p);
                assert!((1..=8).contains(&first.raw()));
                for _ in 0..3 {
                    assert_eq!(ExifOrientation::from_device(o, p), first);
                }
            }
        }
    }

    #[test]
    fn test_landscape_codes_swap_with_camera_facing() {
        let left_back = ExifOrientation::from_device(DeviceOrientation::LandscapeLeft, CameraPosition::Back);
        let right_back = ExifOrientation::from_device(DeviceOrientation::LandscapeRight, CameraPosition::Back);
        let left_front = ExifOrientation::from_device(DeviceOrientation::LandscapeLeft, CameraPosition::Front);
        let right_front = ExifOrientation::from_device(DeviceOrientation::LandscapeRight, CameraPosition::Front);
        assert_ne!(left_back, right_back);
        assert_eq!(left_back, right_front);
        assert_eq!(right_back, left_front);
    }

    // ── Raw codes ────────────────────────────────────────────────────

    #[test]
    fn test_raw_round_trip() {
        for o in ExifOrientation::ALL {
            assert_eq!(ExifOrientation::from_raw(o.raw()), Some(o));
        }
    }

    #[rstest]
    #[case(0)]
    #[case(9)]
    #[case(u32::MAX)]
    fn test_from_raw_rejects_out_of_range(#[case] raw: u32) {
        assert_eq!(ExifOrientation::from_raw(raw), None);
    }

    // ── Applying to pixels ───────────────────────────────────────────

    /// 3x2 frame whose red channel encodes the pixel position: `10*row + col`.
    fn numbered_frame() -> Frame {
        let mut data = Vec::new();
        for row in 0..2u8 {
            for col in 0..3u8 {
                data.extend_from_slice(&[10 * row + col, 0, 0]);
            }
        }
        Frame::new(data, 3, 2, 3, 4)
    }

    fn red_at(frame: &Frame, x: u32, y: u32) -> u8 {
        frame.as_ndarray().unwrap()[[y as usize, x as usize, 0]]
    }

    #[test]
    fn test_up_borrows_without_copy() {
        let frame = numbered_frame();
        assert!(matches!(ExifOrientation::Up.apply(&frame), Some(Cow::Borrowed(_))));
    }

    #[test]
    fn test_upright_dimensions_match_applied_frame() {
        let frame = numbered_frame();
        for o in ExifOrientation::ALL {
            let upright = o.apply(&frame).unwrap();
            assert_eq!(
                (upright.width(), upright.height()),
                o.upright_dimensions(3, 2),
                "{o:?}"
            );
            assert_eq!(upright.index(), 4);
        }
    }

    #[test]
    fn test_right_rotates_clockwise() {
        // Clockwise quarter turn: the bottom-left source pixel ends up top-left.
        let frame = numbered_frame();
        let upright = ExifOrientation::Right.apply(&frame).unwrap();
        assert_eq!(red_at(&upright, 0, 0), 10);
        assert_eq!(red_at(&upright, 1, 0), 0);
    }

    #[test]
    fn test_down_rotates_half_turn() {
        let frame = numbered_frame();
        let upright = ExifOrientation::Down.apply(&frame).unwrap();
        assert_eq!(red_at(&upright, 0, 0), 12);
        assert_eq!(red_at(&upright, 2, 1), 0);
    }

    #[test]
    fn test_left_mirrored_transposes() {
        let frame = numbered_frame();
        let upright = ExifOrientation::LeftMirrored.apply(&frame).unwrap();
        assert_eq!(red_at(&upright, 0, 0), 0);
        assert_eq!(red_at(&upright, 1, 0), 10);
        assert_eq!(red_at(&upright, 0, 2), 2);
    }

    #[test]
    fn test_non_rgb_frame_cannot_be_rotated() {
        let gray = Frame::new(vec![0u8; 6], 3, 2, 1, 0);
        assert!(ExifOrientation::Right.apply(&gray).is_none());
        assert!(ExifOrientation::Up.apply(&gray).is_some());
    }
}
