pub mod app;
pub mod browser;
pub mod camera;
pub mod config;
pub mod controller;
pub mod detector;
pub mod error;
pub mod geometry;

pub use error::{Result, ScanError};

#[cfg(target_os = "android")]
#[no_mangle]
fn android_main(app: slint::android::AndroidApp) {
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(log::LevelFilter::Info)
            .with_tag("slint_qr_scanner"),
    );
    if let Err(err) = slint::android::init(app.clone()) {
        log::error!("slint android init failed: {err}");
        return;
    }
    if let Err(err) = app::run(config::ScannerConfig::default(), app) {
        log::error!("{err:#}");
    }
}
