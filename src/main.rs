#[cfg(not(target_os = "android"))]
fn main() -> anyhow::Result<()> {
    use slint_qr_scanner::config::{ScannerConfig, USAGE};

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args: Vec<String> = std::env::args().collect();
    match ScannerConfig::from_args(&args)? {
        Some(config) => slint_qr_scanner::app::run(config),
        None => {
            println!("{USAGE}");
            Ok(())
        }
    }
}

#[cfg(target_os = "android")]
fn main() {}
