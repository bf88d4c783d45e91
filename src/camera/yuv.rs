use image::{GrayImage, RgbaImage};

/// YUV_420_888 的三个平面，每个平面有自己的行步长；U/V 还有像素步长
/// (1 是平面存放，2 是 NV12/NV21 交错存放)
pub struct YuvPlanes<'a> {
    pub y: &'a [u8],
    pub y_row_stride: usize,
    pub u: &'a [u8],
    pub v: &'a [u8],
    pub uv_row_stride: usize,
    pub uv_pixel_stride: usize,
}

impl<'a> YuvPlanes<'a> {
    fn luma_fits(&self, width: usize, height: usize) -> bool {
        width > 0
            && height > 0
            && self.y_row_stride >= width
            && self.y.len() >= (height - 1) * self.y_row_stride + width
    }

    fn chroma_fits(&self, width: usize, height: usize) -> bool {
        let last = ((height + 1) / 2 - 1) * self.uv_row_stride
            + ((width + 1) / 2 - 1) * self.uv_pixel_stride;
        self.uv_pixel_stride > 0 && self.u.len() > last && self.v.len() > last
    }

    /// Packs the Y plane into a `GrayImage`, dropping row padding.
    /// `None` when the plane is shorter than `width`x`height`.
    pub fn luma(&self, width: u32, height: u32) -> Option<GrayImage> {
        let (w, h) = (width as usize, height as usize);
        if !self.luma_fits(w, h) {
            return None;
        }
        let mut packed = Vec::with_capacity(w * h);
        for row in 0..h {
            let start = row * self.y_row_stride;
            packed.extend_from_slice(&self.y[start..start + w]);
        }
        GrayImage::from_raw(width, height, packed)
    }

    /// BT.601 limited range -> RGBA.
    pub fn to_rgba(&self, width: u32, height: u32) -> Option<RgbaImage> {
        let (w, h) = (width as usize, height as usize);
        if !self.luma_fits(w, h) || !self.chroma_fits(w, h) {
            return None;
        }
        let mut rgba = Vec::with_capacity(w * h * 4);
        for row in 0..h {
            let y_row = &self.y[row * self.y_row_stride..];
            let uv_row = (row / 2) * self.uv_row_stride;
            for col in 0..w {
                let uv = uv_row + (col / 2) * self.uv_pixel_stride;
                let c = (y_row[col] as i32 - 16).max(0) * 298;
                let d = self.u[uv] as i32 - 128;
                let e = self.v[uv] as i32 - 128;
                let r = (c + 409 * e + 128) >> 8;
                let g = (c - 100 * d - 208 * e + 128) >> 8;
                let b = (c + 516 * d + 128) >> 8;
                rgba.extend_from_slice(&[
                    r.clamp(0, 255) as u8,
                    g.clamp(0, 255) as u8,
                    b.clamp(0, 255) as u8,
                    255,
                ]);
            }
        }
        RgbaImage::from_raw(width, height, rgba)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luma_drops_row_padding() {
        // 4x2，行步长 6
        let y = [1, 2, 3, 4, 0, 0, 5, 6, 7, 8];
        let planes = YuvPlanes {
            y: &y,
            y_row_stride: 6,
            u: &[128],
            v: &[128],
            uv_row_stride: 2,
            uv_pixel_stride: 1,
        };
        let gray = planes.luma(4, 2).unwrap();
        assert_eq!(gray.into_raw(), vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn short_planes_are_rejected_instead_of_overread() {
        let y = [16u8; 15];
        let uv = [128u8; 3];
        let planes = YuvPlanes {
            y: &y,
            y_row_stride: 4,
            u: &uv,
            v: &uv,
            uv_row_stride: 2,
            uv_pixel_stride: 1,
        };
        assert!(planes.luma(4, 4).is_none());

        let y = [16u8; 16];
        let planes = YuvPlanes { y: &y, ..planes };
        assert!(planes.luma(4, 4).is_some());
        // 4x4 需要 2x2 的色度
        assert!(planes.to_rgba(4, 4).is_none());
    }

    #[test]
    fn neutral_chroma_gives_gray_levels() {
        let y = [16, 235, 126, 126];
        let uv = [128u8];
        let planes = YuvPlanes {
            y: &y,
            y_row_stride: 2,
            u: &uv,
            v: &uv,
            uv_row_stride: 1,
            uv_pixel_stride: 1,
        };
        let rgba = planes.to_rgba(2, 2).unwrap();
        assert_eq!(rgba.get_pixel(0, 0).0, [0, 0, 0, 255]);
        assert_eq!(rgba.get_pixel(1, 0).0, [255, 255, 255, 255]);
        assert_eq!(rgba.get_pixel(0, 1).0, [128, 128, 128, 255]);
    }

    #[test]
    fn interleaved_chroma_uses_pixel_stride() {
        // NV21: V U V U，U 平面从第二个字节开始
        let y = [126u8; 8];
        let vu = [240u8, 128, 128, 240];
        let planes = YuvPlanes {
            y: &y,
            y_row_stride: 4,
            u: &vu[1..],
            v: &vu[..3],
            uv_row_stride: 4,
            uv_pixel_stride: 2,
        };
        let rgba = planes.to_rgba(4, 2).unwrap();
        // 左边两列 V 高 -> 偏红，右边两列 U 高 -> 偏蓝
        let left = rgba.get_pixel(0, 1).0;
        let right = rgba.get_pixel(3, 0).0;
        assert!(left[0] > left[2]);
        assert!(right[2] > right[0]);
    }
}
