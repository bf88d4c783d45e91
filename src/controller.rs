use log::{debug, error, info};
use url::Url;

use crate::{
    browser::UrlPresenter,
    detector::{MetadataObject, RegionOfInterest, SymbolKind},
    error::Result,
    geometry::{region_of_interest, Rect, SensorOrientation, Size},
};

/// A camera pipeline the controller can start and stop.
pub trait CaptureSession {
    /// Kicks off capture without blocking the caller.
    fn start_running(&mut self) -> Result<()>;
    fn stop_running(&mut self);
    fn is_running(&self) -> bool;
    fn sensor_orientation(&self) -> SensorOrientation;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Scanning,
    /// 已经识别成功，之后的事件全部忽略
    Detected,
}

/// 扫码界面的控制器
///
/// 所有方法都在 UI 线程调用。
pub struct ScanController<S, P> {
    session: S,
    presenter: P,
    region: RegionOfInterest,
    state: ScanState,
    layouted: bool,
}

impl<S: CaptureSession, P: UrlPresenter> ScanController<S, P> {
    pub fn new(session: S, presenter: P, region: RegionOfInterest) -> Self {
        Self {
            session,
            presenter,
            region,
            state: ScanState::Idle,
            layouted: false,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Idle -> Scanning. Calls after the first are no-ops.
    pub fn start(&mut self) -> Result<()> {
        if self.state != ScanState::Idle {
            return Ok(());
        }
        self.session.start_running()?;
        self.state = ScanState::Scanning;
        info!("scanning started");
        Ok(())
    }

    /// 只在第一次有效布局时计算识别区域，之后的布局变化忽略
    ///
    /// Returns the installed region, or `None` when the call was ignored.
    pub fn on_layout(&mut self, guide: Rect, bounds: Size) -> Option<Rect> {
        if self.layouted || bounds.is_empty() {
            return None;
        }
        self.layouted = true;
        let roi = region_of_interest(guide, bounds, self.session.sensor_orientation());
        self.region.set(roi);
        info!("rect of interest: {roi:?} (guide {guide:?} in {bounds:?})");
        Some(roi)
    }

    /// Handles the objects found in one frame.
    ///
    /// Only the first object is looked at. It must be a QR code with a payload
    /// that parses as an http(s) URL; anything else is dropped and scanning
    /// continues.
    pub fn on_metadata(&mut self, objects: &[MetadataObject]) -> Option<Url> {
        if self.state != ScanState::Scanning {
            return None;
        }
        let object = objects.first()?;
        if object.kind != SymbolKind::Qr {
            return None;
        }
        let text = object.payload.as_deref()?;
        let url = match Url::parse(text) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => url,
            Ok(url) => {
                debug!("ignored qr payload {text:?}: scheme {} not browsable", url.scheme());
                return None;
            }
            Err(err) => {
                debug!("ignored qr payload {text:?}: {err}");
                return None;
            }
        };

        self.session.stop_running();
        self.state = ScanState::Detected;
        if let Err(err) = self.presenter.present(&url) {
            error!("{err}");
        }
        info!("text:{text}");
        Some(url)
    }

    /// 关闭按钮
    pub fn dismiss(&mut self) {
        if self.session.is_running() {
            self.session.stop_running();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScanError;

    #[derive(Default)]
    struct FakeSession {
        running: bool,
        starts: usize,
        stops: usize,
        fail_start: bool,
    }

    impl CaptureSession for FakeSession {
        fn start_running(&mut self) -> Result<()> {
            if self.fail_start {
                return Err(ScanError::PermissionDenied);
            }
            self.starts += 1;
            self.running = true;
            Ok(())
        }

        fn stop_running(&mut self) {
            self.stops += 1;
            self.running = false;
        }

        fn is_running(&self) -> bool {
            self.running
        }

        fn sensor_orientation(&self) -> SensorOrientation {
            SensorOrientation::Deg90
        }
    }

    #[derive(Default)]
    struct FakeBrowser {
        opened: Vec<Url>,
    }

    impl UrlPresenter for FakeBrowser {
        fn present(&mut self, url: &Url) -> Result<()> {
            self.opened.push(url.clone());
            Ok(())
        }
    }

    fn scanning() -> ScanController<FakeSession, FakeBrowser> {
        let mut controller = ScanController::new(
            FakeSession::default(),
            FakeBrowser::default(),
            RegionOfInterest::default(),
        );
        controller.start().unwrap();
        controller
    }

    #[test]
    fn start_is_one_shot() {
        let mut controller = scanning();
        controller.start().unwrap();
        assert_eq!(controller.session().starts, 1);
        assert_eq!(controller.state(), ScanState::Scanning);
    }

    #[test]
    fn failed_start_stays_idle() {
        let mut controller = ScanController::new(
            FakeSession {
                fail_start: true,
                ..Default::default()
            },
            FakeBrowser::default(),
            RegionOfInterest::default(),
        );
        assert!(matches!(controller.start(), Err(ScanError::PermissionDenied)));
        assert_eq!(controller.state(), ScanState::Idle);
        assert!(controller.on_metadata(&[MetadataObject::qr("https://example.com")]).is_none());
    }

    #[test]
    fn first_valid_qr_stops_once_and_presents_once() {
        let mut controller = scanning();
        let url = controller
            .on_metadata(&[MetadataObject::qr("https://example.com")])
            .unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
        assert!(controller
            .on_metadata(&[MetadataObject::qr("https://example.org")])
            .is_none());

        assert_eq!(controller.state(), ScanState::Detected);
        assert_eq!(controller.session().stops, 1);
        assert_eq!(controller.presenter().opened, vec![url]);
    }

    #[test]
    fn non_qr_symbol_is_ignored() {
        let mut controller = scanning();
        let ean = MetadataObject {
            kind: SymbolKind::Other("ean13".into()),
            payload: Some("https://example.com".into()),
        };
        assert!(controller.on_metadata(&[ean]).is_none());
        assert_eq!(controller.state(), ScanState::Scanning);
        assert_eq!(controller.session().stops, 0);
    }

    #[test]
    fn invalid_url_and_missing_payload_are_ignored() {
        let mut controller = scanning();
        assert!(controller.on_metadata(&[MetadataObject::qr("not a url")]).is_none());
        let undecodable = MetadataObject {
            kind: SymbolKind::Qr,
            payload: None,
        };
        assert!(controller.on_metadata(&[undecodable]).is_none());
        assert!(controller.on_metadata(&[]).is_none());

        assert_eq!(controller.state(), ScanState::Scanning);
        assert!(controller.presenter().opened.is_empty());

        // 之后的有效码仍然会被处理
        assert!(controller
            .on_metadata(&[MetadataObject::qr("https://example.com/a")])
            .is_some());
    }

    #[test]
    fn non_web_schemes_are_ignored() {
        let mut controller = scanning();
        for payload in ["foo:bar", "intent://scan#Intent;scheme=zxing;end", "mailto:a@example.com"] {
            assert!(controller.on_metadata(&[MetadataObject::qr(payload)]).is_none());
        }
        assert_eq!(controller.state(), ScanState::Scanning);
        assert_eq!(controller.session().stops, 0);
        assert!(controller.presenter().opened.is_empty());

        assert!(controller
            .on_metadata(&[MetadataObject::qr("http://example.com/menu")])
            .is_some());
    }

    #[test]
    fn only_the_first_object_counts() {
        let mut controller = scanning();
        let objects = [
            MetadataObject::qr("plain text"),
            MetadataObject::qr("https://example.com"),
        ];
        assert!(controller.on_metadata(&objects).is_none());
        assert_eq!(controller.state(), ScanState::Scanning);
    }

    #[test]
    fn layout_installs_region_once() {
        let region = RegionOfInterest::default();
        let mut controller = ScanController::new(
            FakeSession::default(),
            FakeBrowser::default(),
            region.clone(),
        );

        assert!(controller
            .on_layout(Rect::new(0., 0., 0., 0.), Size::new(0., 0.))
            .is_none());
        assert_eq!(region.get(), Rect::UNIT);

        let roi = controller
            .on_layout(Rect::new(50., 100., 200., 200.), Size::new(400., 800.))
            .unwrap();
        assert_eq!(roi, Rect::new(0.125, 0.375, 0.25, 0.5));
        assert_eq!(region.get(), roi);

        assert!(controller
            .on_layout(Rect::new(0., 0., 400., 800.), Size::new(400., 800.))
            .is_none());
        assert_eq!(region.get(), roi);
    }

    #[test]
    fn dismiss_stops_a_running_session() {
        let mut controller = scanning();
        controller.dismiss();
        assert_eq!(controller.session().stops, 1);
        controller.dismiss();
        assert_eq!(controller.session().stops, 1);
    }
}
