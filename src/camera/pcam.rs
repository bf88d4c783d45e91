use std::{
    sync::{mpsc::Sender, Arc, Mutex},
    time::{Duration, Instant},
};

use anyhow::{anyhow, Result};
use image::{imageops, RgbaImage};
use kamera::Camera as KCamera;
use log::{debug, error, info, warn};

use super::{scale_to_preview, upright_preview, CameraEvent};
use crate::{detector::QrDetector, error::ScanError, geometry::SensorOrientation};

/// 桌面摄像头(kamera)，画面本身就是正向的
pub struct Camera {
    index: usize,
    camera_handle: Option<Arc<Mutex<bool>>>,
    camera_task: Option<std::thread::JoinHandle<Result<()>>>,
    detector: QrDetector,
    event_sender: Sender<CameraEvent>,
}

impl Camera {
    pub fn new(index: usize, detector: QrDetector, event_sender: Sender<CameraEvent>) -> Self {
        Self {
            index,
            camera_handle: None,
            camera_task: None,
            detector,
            event_sender,
        }
    }

    pub fn sensor_orientation(&self) -> SensorOrientation {
        SensorOrientation::Deg0
    }

    /// 在后台线程打开摄像头并开始采集，不阻塞 UI 线程
    pub fn start_preview(&mut self, width: u32, height: u32) -> Result<()> {
        self.stop_preview();
        let camera_handle = Arc::new(Mutex::new(true));
        self.camera_handle = Some(camera_handle.clone());
        let index = self.index;
        let detector = self.detector.clone();
        let event_sender = self.event_sender.clone();
        info!("start preview: camera {index}, scaled to {width}x{height}");
        self.camera_task = Some(std::thread::spawn(move || {
            let res = capture_loop(
                index,
                (width, height),
                &camera_handle,
                &detector,
                &event_sender,
            );
            if let Err(err) = &res {
                error!("capture stopped: {err:#}");
                let _ = event_sender.send(CameraEvent::Failed(format!("{err:#}")));
            }
            res
        }));
        Ok(())
    }

    pub fn stop_preview(&mut self) {
        let mut need_close = false;
        if let Some(handle) = self.camera_handle.take() {
            if let Ok(mut handle) = handle.lock() {
                *handle = false;
                need_close = true;
            }
        }

        if need_close {
            info!("stop preview..");
            if let Some(handle) = self.camera_task.take() {
                let res = handle.join();
                info!("stop preview: {:?}", res.map(|r| r.is_ok()));
            }
        }
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        self.stop_preview();
    }
}

fn capture_loop(
    index: usize,
    preview_size: (u32, u32),
    camera_handle: &Mutex<bool>,
    detector: &QrDetector,
    event_sender: &Sender<CameraEvent>,
) -> Result<()> {
    let camera = match KCamera::new_device(index) {
        None => return Err(ScanError::CameraNotFound(index.to_string()).into()),
        Some(v) => v,
    };
    camera.start();
    let mut count = 0;
    let mut timer = Instant::now();
    let mut rgba_buffer = vec![];
    loop {
        if let Ok(opened) = camera_handle.lock() {
            if !*opened {
                break;
            }
        }

        let frame = match camera.wait_for_frame() {
            Some(f) => f,
            None => {
                warn!("failed to grab frame");
                std::thread::sleep(Duration::from_millis(10));
                continue;
            }
        };

        let (width, height) = frame.size_u32();
        if rgba_buffer.len() as u32 != width * height * 4 {
            rgba_buffer = vec![0; (width * height * 4) as usize];
        }
        let frame_data = frame.data();
        let data_u8 = frame_data.data_u8();
        // BGRA -> RGBA
        for (idx, bgra) in data_u8.chunks(4).enumerate() {
            rgba_buffer[idx * 4] = bgra[2];
            rgba_buffer[idx * 4 + 1] = bgra[1];
            rgba_buffer[idx * 4 + 2] = bgra[0];
            rgba_buffer[idx * 4 + 3] = bgra[3];
        }

        let image = RgbaImage::from_raw(width, height, rgba_buffer.clone())
            .ok_or_else(|| anyhow!("frame buffer does not match {width}x{height}"))?;
        let image = scale_to_preview(image, preview_size.0, preview_size.1);

        let objects = detector.detect(&imageops::grayscale(&image));
        if !objects.is_empty() {
            event_sender
                .send(CameraEvent::Metadata(objects))
                .map_err(|_| anyhow!("camera event receiver dropped"))?;
        }
        event_sender
            .send(CameraEvent::Frame(upright_preview(&image, SensorOrientation::Deg0)))
            .map_err(|_| anyhow!("camera event receiver dropped"))?;

        count += 1;
        if count == 30 {
            let time = timer.elapsed().as_millis();
            debug!("30 frames in {time}ms, {width}x{height}");
            count = 0;
            timer = Instant::now();
        }
    }
    camera.stop();
    Ok(())
}
