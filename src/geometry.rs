/// 矩形，既用于界面坐标(逻辑像素)，也用于归一化坐标([0, 1])
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const UNIT: Rect = Rect {
        x: 0.,
        y: 0.,
        width: 1.,
        height: 1.,
    };

    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Restricts a normalized rect to the unit square.
    pub fn clamp_unit(&self) -> Rect {
        let x = self.x.clamp(0., 1.);
        let y = self.y.clamp(0., 1.);
        let right = (self.x + self.width).clamp(x, 1.);
        let bottom = (self.y + self.height).clamp(y, 1.);
        Rect::new(x, y, right - x, bottom - y)
    }

    /// Maps a normalized rect onto a `frame_width`x`frame_height` pixel grid.
    ///
    /// Returns `(x, y, width, height)`; the result always lies inside the
    /// frame and is at least 1x1 for a non-empty frame.
    pub fn to_pixels(&self, frame_width: u32, frame_height: u32) -> (u32, u32, u32, u32) {
        if frame_width == 0 || frame_height == 0 {
            return (0, 0, 0, 0);
        }
        let r = self.clamp_unit();
        let x = ((r.x * frame_width as f32).floor() as u32).min(frame_width - 1);
        let y = ((r.y * frame_height as f32).floor() as u32).min(frame_height - 1);
        let right = ((r.x + r.width) * frame_width as f32).ceil() as u32;
        let bottom = ((r.y + r.height) * frame_height as f32).ceil() as u32;
        let width = right.clamp(x + 1, frame_width) - x;
        let height = bottom.clamp(y + 1, frame_height) - y;
        (x, y, width, height)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0. || self.height <= 0.
    }
}

/// 传感器图像需要顺时针旋转多少度才能在竖屏上正向显示
///
/// 手机后置摄像头一般是 `Deg90`: 传感器是横向的，设备是竖着拿的。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SensorOrientation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl SensorOrientation {
    /// Parses the `ACAMERA_SENSOR_ORIENTATION` value. Anything that is not a
    /// multiple of 90 is treated as upright.
    pub fn from_degrees(degrees: i32) -> Self {
        match degrees.rem_euclid(360) {
            90 => SensorOrientation::Deg90,
            180 => SensorOrientation::Deg180,
            270 => SensorOrientation::Deg270,
            _ => SensorOrientation::Deg0,
        }
    }

    pub fn degrees(&self) -> i32 {
        match self {
            SensorOrientation::Deg0 => 0,
            SensorOrientation::Deg90 => 90,
            SensorOrientation::Deg180 => 180,
            SensorOrientation::Deg270 => 270,
        }
    }
}

/// 根据引导框在界面上的位置，计算识别区域(传感器坐标系，值在[0, 1])
///
/// 先把引导框换算成相对窗口的比例，再按传感器方向旋转。竖屏设备 + 横向传感器
/// (`Deg90`)时：`x = y, y = 1 - x - width, width = height, height = width`。
pub fn region_of_interest(guide: Rect, bounds: Size, orientation: SensorOrientation) -> Rect {
    if bounds.is_empty() {
        return Rect::UNIT;
    }
    let x = guide.x / bounds.width;
    let y = guide.y / bounds.height;
    let width = guide.width / bounds.width;
    let height = guide.height / bounds.height;

    let rotated = match orientation {
        SensorOrientation::Deg0 => Rect::new(x, y, width, height),
        SensorOrientation::Deg90 => Rect::new(y, 1. - x - width, height, width),
        SensorOrientation::Deg180 => Rect::new(1. - x - width, 1. - y - height, width, height),
        SensorOrientation::Deg270 => Rect::new(1. - y - height, x, height, width),
    };
    rotated.clamp_unit()
}
