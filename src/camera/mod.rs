use std::sync::mpsc::Sender;

#[cfg(target_os = "android")]
use self::camera2::AndroidCamera;
use image::{imageops, RgbaImage};
use slint::{Rgba8Pixel, SharedPixelBuffer};

use crate::{
    config::ScannerConfig,
    controller::CaptureSession,
    detector::{MetadataObject, QrDetector},
    error::{Result, ScanError},
    geometry::SensorOrientation,
};

#[cfg(target_os = "android")]
mod camera2;

#[cfg(not(target_os = "android"))]
mod pcam;

pub mod yuv;

/// ACAMERA_LENS_FACING_BACK
pub const LENS_FACING_BACK: u8 = 1;

/// 相机特性里读出来的信息，读不到的字段是 `None`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CameraInfo {
    pub lens_facing: Option<u8>,
    pub sensor_orientation: Option<i32>,
}

/// 选第一个后置摄像头，没有的话用第一个
///
/// Returns the index into `cameras` and its sensor orientation; a missing
/// orientation is taken as the usual rear-camera 90 degrees.
pub fn select_rear_camera(cameras: &[CameraInfo]) -> Option<(usize, SensorOrientation)> {
    let idx = cameras
        .iter()
        .position(|info| info.lens_facing == Some(LENS_FACING_BACK))
        .or(if cameras.is_empty() { None } else { Some(0) })?;
    let degrees = cameras[idx].sensor_orientation.unwrap_or(90);
    Some((idx, SensorOrientation::from_degrees(degrees)))
}

/// 把采集到的帧缩放到配置的预览尺寸，尺寸相同时不复制
pub fn scale_to_preview(image: RgbaImage, width: u32, height: u32) -> RgbaImage {
    if width == 0 || height == 0 || image.dimensions() == (width, height) {
        return image;
    }
    imageops::resize(&image, width, height, imageops::FilterType::Triangle)
}

/// 相机线程发给 UI 线程的事件
pub enum CameraEvent {
    /// 预览帧(已经旋转成正向)
    Frame(SharedPixelBuffer<Rgba8Pixel>),
    /// 本帧识别到的码，只有非空时才发送
    Metadata(Vec<MetadataObject>),
    /// 采集线程出错退出
    Failed(String),
}

pub struct Camera {
    #[cfg(target_os = "android")]
    camera: Box<AndroidCamera>,
    #[cfg(not(target_os = "android"))]
    camera: pcam::Camera,
    preview_width: u32,
    preview_height: u32,
    running: bool,
}

impl Camera {
    /// 选择后置摄像头，挂上二维码识别输出
    pub fn new(
        #[cfg(target_os = "android")] app: slint::android::AndroidApp,
        config: &ScannerConfig,
        detector: QrDetector,
        event_sender: Sender<CameraEvent>,
    ) -> Result<Self> {
        #[cfg(target_os = "android")]
        let camera = {
            let mut camera = Box::new(AndroidCamera::new(app, detector, event_sender));
            camera.open_back_camera().map_err(ScanError::from_device)?;
            camera
        };
        #[cfg(not(target_os = "android"))]
        let camera = pcam::Camera::new(config.camera_index, detector, event_sender);
        Ok(Camera {
            camera,
            preview_width: config.preview_width,
            preview_height: config.preview_height,
            running: false,
        })
    }
}

impl CaptureSession for Camera {
    fn start_running(&mut self) -> Result<()> {
        if self.running {
            return Ok(());
        }
        self.camera
            .start_preview(self.preview_width, self.preview_height)
            .map_err(ScanError::from_device)?;
        self.running = true;
        Ok(())
    }

    fn stop_running(&mut self) {
        #[cfg(target_os = "android")]
        self.camera.close();
        #[cfg(not(target_os = "android"))]
        self.camera.stop_preview();
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn sensor_orientation(&self) -> SensorOrientation {
        self.camera.sensor_orientation()
    }
}

/// 把传感器方向的图像旋转成正向，用于预览
pub fn upright_preview(
    image: &RgbaImage,
    orientation: SensorOrientation,
) -> SharedPixelBuffer<Rgba8Pixel> {
    let rotated = match orientation {
        SensorOrientation::Deg0 => None,
        SensorOrientation::Deg90 => Some(imageops::rotate90(image)),
        SensorOrientation::Deg180 => Some(imageops::rotate180(image)),
        SensorOrientation::Deg270 => Some(imageops::rotate270(image)),
    };
    let image = rotated.as_ref().unwrap_or(image);
    SharedPixelBuffer::clone_from_slice(image.as_raw(), image.width(), image.height())
}
