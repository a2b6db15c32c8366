use crate::gpu::types::{
    CropRect, ShaderParams, PARAM_COUNT, PARAM_CROP_BOTTOM, PARAM_CROP_LEFT, PARAM_CROP_RIGHT,
    PARAM_CROP_TOP, PARAM_IMAGE_HEIGHT, PARAM_IMAGE_WIDTH,
};

impl CropRect {
    /// Clamps the rectangle to the unit square and repairs any ordering
    /// violation to the full frame. Invalid crops never fail a call.
    pub fn sanitized(self) -> CropRect {
        let mut rect = CropRect {
            left: self.left.max(0.0),
            top: self.top.max(0.0),
            right: self.right.min(1.0),
            bottom: self.bottom.min(1.0),
        };
        if rect.left >= rect.right || rect.top >= rect.bottom {
            rect = CropRect::FULL;
        }
        rect
    }

    /// Pixel-space crop bounds as (left, top, right, bottom).
    ///
    /// Each edge rounds to the nearest pixel independently; the output span
    /// is the difference of rounded edges, never a rounded difference.
    pub fn pixel_bounds(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let left_px = (self.left * width as f32).round() as u32;
        let top_px = (self.top * height as f32).round() as u32;
        let right_px = (self.right * width as f32).round() as u32;
        let bottom_px = (self.bottom * height as f32).round() as u32;
        (left_px, top_px, right_px, bottom_px)
    }

    /// Output dimensions after cropping a `width` x `height` image.
    pub fn output_dims(&self, width: u32, height: u32) -> (u32, u32) {
        let (left_px, top_px, right_px, bottom_px) = self.pixel_bounds(width, height);
        (right_px - left_px, bottom_px - top_px)
    }
}

/// Packs the caller's adjustment slice and the resolved crop into the
/// fixed-layout uniform block.
///
/// Up to [`PARAM_COUNT`] values are copied positionally and the tail is
/// zero-filled; the image dimension and crop slots are then overwritten
/// unconditionally so the kernel always sees authoritative geometry.
pub fn pack_params(
    adjustments: &[f32],
    width: u32,
    height: u32,
    crop: CropRect,
) -> ShaderParams {
    let mut values = [0.0f32; PARAM_COUNT];
    let count = adjustments.len().min(PARAM_COUNT);
    values[..count].copy_from_slice(&adjustments[..count]);

    values[PARAM_IMAGE_WIDTH] = width as f32;
    values[PARAM_IMAGE_HEIGHT] = height as f32;
    values[PARAM_CROP_LEFT] = crop.left;
    values[PARAM_CROP_TOP] = crop.top;
    values[PARAM_CROP_RIGHT] = crop.right;
    values[PARAM_CROP_BOTTOM] = crop.bottom;

    ShaderParams { values }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_frame_output_dims() {
        let rect = CropRect::FULL;
        assert_eq!(rect.output_dims(4032, 3024), (4032, 3024));
        assert_eq!(rect.output_dims(1, 1), (1, 1));
    }

    #[test]
    fn test_crop_rounds_edges_independently() {
        // 0.25 * 4 = 1, 0.75 * 4 = 3 -> a 2 pixel span.
        let rect = CropRect::new(0.25, 0.25, 0.75, 0.75);
        assert_eq!(rect.output_dims(4, 4), (2, 2));

        // Half-pixel edges on a 5 pixel axis: 0.1*5 rounds up to 1 and
        // 0.9*5 rounds up to 5, so the window is 1..5, four pixels wide.
        let rect = CropRect::new(0.1, 0.1, 0.9, 0.9);
        assert_eq!(rect.pixel_bounds(5, 5), (1, 1, 5, 5));
        assert_eq!(rect.output_dims(5, 5), (4, 4));
    }

    #[test]
    fn test_invalid_crop_repairs_to_full_frame() {
        for rect in [
            CropRect::new(0.8, 0.1, 0.2, 0.9), // left >= right
            CropRect::new(0.1, 0.9, 0.9, 0.1), // top >= bottom
            CropRect::new(0.5, 0.5, 0.5, 0.5), // degenerate
            CropRect::new(-0.5, -0.5, 1.5, 1.5), // clamps back to full frame
        ] {
            let fixed = rect.sanitized();
            assert_eq!(
                fixed.output_dims(640, 480),
                (640, 480),
                "crop {rect:?} should fall back to the full frame"
            );
        }
    }

    #[test]
    fn test_out_of_range_crop_is_clamped() {
        let rect = CropRect::new(-0.25, 0.0, 0.5, 2.0).sanitized();
        assert_eq!(rect, CropRect::new(0.0, 0.0, 0.5, 1.0));
    }

    #[test]
    fn test_pack_short_adjustment_slice() {
        let params = pack_params(&[1.5, -0.5, 2.0], 640, 480, CropRect::FULL);
        assert_eq!(params.values[0], 1.5);
        assert_eq!(params.values[1], -0.5);
        assert_eq!(params.values[2], 2.0);
        // Zero-filled tail apart from geometry slots.
        for i in 3..PARAM_COUNT {
            match i {
                PARAM_IMAGE_WIDTH => assert_eq!(params.values[i], 640.0),
                PARAM_IMAGE_HEIGHT => assert_eq!(params.values[i], 480.0),
                PARAM_CROP_LEFT | PARAM_CROP_TOP => assert_eq!(params.values[i], 0.0),
                PARAM_CROP_RIGHT | PARAM_CROP_BOTTOM => assert_eq!(params.values[i], 1.0),
                _ => assert_eq!(params.values[i], 0.0, "slot {i} should be zero"),
            }
        }
    }

    #[test]
    fn test_pack_overwrites_geometry_slots() {
        // Caller-supplied values in the dimension and crop slots never
        // reach the kernel; the resolved geometry always wins.
        let mut adjustments = [9.0f32; PARAM_COUNT];
        adjustments[PARAM_IMAGE_WIDTH] = 123.0;
        adjustments[PARAM_CROP_RIGHT] = 0.123;
        let crop = CropRect::new(0.1, 0.2, 0.8, 0.9);
        let params = pack_params(&adjustments, 100, 200, crop);
        assert_eq!(params.values[PARAM_IMAGE_WIDTH], 100.0);
        assert_eq!(params.values[PARAM_IMAGE_HEIGHT], 200.0);
        assert_eq!(params.values[PARAM_CROP_LEFT], 0.1);
        assert_eq!(params.values[PARAM_CROP_TOP], 0.2);
        assert_eq!(params.values[PARAM_CROP_RIGHT], 0.8);
        assert_eq!(params.values[PARAM_CROP_BOTTOM], 0.9);
        assert_eq!(params.values[0], 9.0);
    }

    #[test]
    fn test_pack_truncates_long_slice() {
        let adjustments = [1.0f32; 32];
        let params = pack_params(&adjustments, 10, 10, CropRect::FULL);
        assert_eq!(params.values.len(), PARAM_COUNT);
    }
}
