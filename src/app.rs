use std::{cell::RefCell, rc::Rc, sync::mpsc::channel, time::Duration};

use anyhow::Result;
use log::{error, info};
use slint::{Timer, TimerMode};

use crate::{
    browser::SystemBrowser,
    camera::{Camera, CameraEvent},
    config::ScannerConfig,
    controller::ScanController,
    detector::{QrDetector, SymbolKind},
    geometry::{Rect, Size},
};

slint::slint! {
    import { Button } from "std-widgets.slint";
    export component MainWindow inherits Window {
        in-out property <image> camera-texture <=> preview.source;
        in property <string> status;
        in property <float> guide-ratio: 0.6;
        out property <length> guide-x: guide.x;
        out property <length> guide-y: guide.y;
        out property <length> guide-width: guide.width;
        out property <length> guide-height: guide.height;
        out property <length> view-width: root.width;
        out property <length> view-height: root.height;
        callback close();

        preferred-width: 400px;
        preferred-height: 800px;
        background: black;

        preview := Image {
            x: 0px;
            y: 0px;
            width: 100%;
            height: 100%;
            image-fit: cover;
        }

        // 正方形的引导框
        guide := Rectangle {
            width: min(root.width, root.height) * root.guide-ratio;
            height: self.width;
            x: (root.width - self.width) / 2;
            y: (root.height - self.height) / 2;
            background: transparent;
            border-width: 2px;
            border-color: #555555;
        }

        Text {
            x: 16px;
            y: guide.y + guide.height + 16px;
            width: root.width - 32px;
            text: root.status;
            color: white;
            horizontal-alignment: center;
            wrap: word-wrap;
        }

        Rectangle {
            x: 16px;
            y: 16px;
            width: 80px;
            height: 40px;
            Button {
                text: "Close";
                clicked => {
                    root.close();
                }
            }
        }
    }
}

pub fn run(
    config: ScannerConfig,
    #[cfg(target_os = "android")] android_app: slint::android::AndroidApp,
) -> Result<()> {
    let app = MainWindow::new()?;
    app.set_guide_ratio(config.guide_ratio);

    let (event_sender, event_receiver) = channel();
    let detector = QrDetector::new(&[SymbolKind::Qr]);
    let region = detector.region();

    let camera = Camera::new(
        #[cfg(target_os = "android")]
        android_app.clone(),
        &config,
        detector,
        event_sender,
    );
    let camera = match camera {
        Ok(camera) => camera,
        Err(err) => {
            // 没有相机或者没有权限时只显示提示，不退出
            error!("{err}");
            app.set_status(err.to_string().into());
            app.on_close(|| {
                let _ = slint::quit_event_loop();
            });
            app.run()?;
            return Ok(());
        }
    };
    let browser = SystemBrowser::new(
        #[cfg(target_os = "android")]
        android_app,
    );
    let controller = Rc::new(RefCell::new(ScanController::new(camera, browser, region)));

    let app_weak = app.as_weak();
    let timer_controller = controller.clone();
    let timer = Timer::default();
    timer.start(TimerMode::Repeated, Duration::from_millis(10), move || {
        let Some(app) = app_weak.upgrade() else {
            return;
        };
        let mut controller = timer_controller.borrow_mut();
        controller.on_layout(
            Rect::new(
                app.get_guide_x(),
                app.get_guide_y(),
                app.get_guide_width(),
                app.get_guide_height(),
            ),
            Size::new(app.get_view_width(), app.get_view_height()),
        );

        let mut latest_frame = None;
        while let Ok(event) = event_receiver.try_recv() {
            match event {
                CameraEvent::Frame(buffer) => latest_frame = Some(buffer),
                CameraEvent::Metadata(objects) => {
                    if let Some(url) = controller.on_metadata(&objects) {
                        app.set_status(url.as_str().into());
                    }
                }
                CameraEvent::Failed(msg) => app.set_status(msg.into()),
            }
        }
        if let Some(buffer) = latest_frame {
            app.set_camera_texture(slint::Image::from_rgba8(buffer));
        }
    });

    let close_controller = controller.clone();
    app.on_close(move || {
        close_controller.borrow_mut().dismiss();
        let _ = slint::quit_event_loop();
    });

    app.show()?;
    // 界面显示之后再开始采集
    if let Err(err) = controller.borrow_mut().start() {
        error!("{err}");
        app.set_status(err.to_string().into());
    }
    slint::run_event_loop()?;
    info!("scanner closed");
    controller.borrow_mut().dismiss();
    app.hide()?;
    Ok(())
}
