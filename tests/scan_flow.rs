use image::{GrayImage, Luma};
use qrcode::{Color, QrCode};
use url::Url;

use slint_qr_scanner::{
    browser::UrlPresenter,
    controller::{CaptureSession, ScanController, ScanState},
    detector::{QrDetector, SymbolKind},
    geometry::{Rect, SensorOrientation, Size},
    Result,
};

const MODULE_PX: u32 = 6;

/// Renders `text` as a QR code with its top-left module at (`left`, `top`)
/// on a white `width`x`height` frame.
fn frame_with_code(text: &str, width: u32, height: u32, left: u32, top: u32) -> GrayImage {
    let code = QrCode::new(text.as_bytes()).unwrap();
    let modules = code.width() as u32;
    let colors = code.to_colors();
    let mut frame = GrayImage::from_pixel(width, height, Luma([255]));
    for my in 0..modules {
        for mx in 0..modules {
            if colors[(my * modules + mx) as usize] != Color::Dark {
                continue;
            }
            for dy in 0..MODULE_PX {
                for dx in 0..MODULE_PX {
                    frame.put_pixel(left + mx * MODULE_PX + dx, top + my * MODULE_PX + dy, Luma([0]));
                }
            }
        }
    }
    frame
}

#[derive(Default)]
struct RecordingSession {
    running: bool,
    stops: usize,
}

impl CaptureSession for RecordingSession {
    fn start_running(&mut self) -> Result<()> {
        self.running = true;
        Ok(())
    }

    fn stop_running(&mut self) {
        self.running = false;
        self.stops += 1;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn sensor_orientation(&self) -> SensorOrientation {
        SensorOrientation::Deg0
    }
}

#[derive(Default)]
struct RecordingBrowser {
    opened: Vec<Url>,
}

impl UrlPresenter for RecordingBrowser {
    fn present(&mut self, url: &Url) -> Result<()> {
        self.opened.push(url.clone());
        Ok(())
    }
}

#[test]
fn detector_decodes_a_rendered_code() {
    let detector = QrDetector::new(&[SymbolKind::Qr]);
    let frame = frame_with_code("https://example.com", 480, 360, 40, 40);
    let objects = detector.detect(&frame);
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].kind, SymbolKind::Qr);
    assert_eq!(objects[0].payload.as_deref(), Some("https://example.com"));
}

#[test]
fn code_outside_the_region_is_not_reported() {
    let detector = QrDetector::new(&[SymbolKind::Qr]);
    // 码在左半边
    let frame = frame_with_code("https://example.com", 480, 360, 24, 80);

    detector.region().set(Rect::new(0.5, 0., 0.5, 1.));
    assert!(detector.detect(&frame).is_empty());

    detector.region().set(Rect::new(0., 0., 0.5, 1.));
    assert_eq!(detector.detect(&frame).len(), 1);
}

#[test]
fn first_scanned_url_is_opened_exactly_once() {
    let detector = QrDetector::new(&[SymbolKind::Qr]);
    let mut controller = ScanController::new(
        RecordingSession::default(),
        RecordingBrowser::default(),
        detector.region(),
    );
    controller.start().unwrap();

    // 引导框在窗口中间，对应帧的中间区域
    let roi = controller
        .on_layout(Rect::new(100., 100., 200., 200.), Size::new(400., 400.))
        .unwrap();
    assert_eq!(roi, Rect::new(0.25, 0.25, 0.5, 0.5));

    let text_frame = frame_with_code("hello, scanner", 400, 400, 120, 120);
    let objects = detector.detect(&text_frame);
    assert_eq!(objects.len(), 1);
    assert!(controller.on_metadata(&objects).is_none());
    assert_eq!(controller.state(), ScanState::Scanning);

    let url_frame = frame_with_code("https://example.com", 400, 400, 120, 120);
    let objects = detector.detect(&url_frame);
    let url = controller.on_metadata(&objects).unwrap();
    assert_eq!(url, Url::parse("https://example.com").unwrap());

    let other = frame_with_code("https://example.org", 400, 400, 120, 120);
    assert!(controller.on_metadata(&detector.detect(&other)).is_none());

    assert_eq!(controller.state(), ScanState::Detected);
    assert_eq!(controller.session().stops, 1);
    assert!(!controller.session().is_running());
    assert_eq!(controller.presenter().opened, vec![url]);
}
