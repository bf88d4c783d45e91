use anyhow::{anyhow, bail, Context, Result};

pub const USAGE: &str = "Usage: slint_qr_scanner [--camera <index>] [--width <px>] [--height <px>] \
[--guide <ratio>]";

#[derive(Clone, Debug, PartialEq)]
pub struct ScannerConfig {
    /// 桌面端摄像头序号，Android 上总是选后置摄像头
    pub camera_index: usize,
    pub preview_width: u32,
    pub preview_height: u32,
    /// Guide box side as a fraction of the shorter window edge.
    pub guide_ratio: f32,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            camera_index: 0,
            preview_width: 1280,
            preview_height: 720,
            guide_ratio: 0.6,
        }
    }
}

impl ScannerConfig {
    /// Parses `--camera`, `--width`, `--height` and `--guide`. `args[0]` is
    /// the program name. Returns `None` when help was asked for.
    pub fn from_args(args: &[String]) -> Result<Option<Self>> {
        let mut config = ScannerConfig::default();
        let mut idx = 1;
        while idx < args.len() {
            let flag = args[idx].as_str();
            let value = args
                .get(idx + 1)
                .ok_or_else(|| anyhow!("{flag} requires a value\n\n{USAGE}"));
            match flag {
                "--camera" => {
                    config.camera_index = value?
                        .parse()
                        .with_context(|| format!("invalid camera index\n\n{USAGE}"))?;
                }
                "--width" => {
                    config.preview_width = value?
                        .parse()
                        .with_context(|| format!("invalid preview width\n\n{USAGE}"))?;
                }
                "--height" => {
                    config.preview_height = value?
                        .parse()
                        .with_context(|| format!("invalid preview height\n\n{USAGE}"))?;
                }
                "--guide" => {
                    config.guide_ratio = value?
                        .parse()
                        .with_context(|| format!("invalid guide ratio\n\n{USAGE}"))?;
                }
                "-h" | "--help" => return Ok(None),
                other => bail!("unknown argument {other}\n\n{USAGE}"),
            }
            idx += 2;
        }

        if config.preview_width == 0 || config.preview_height == 0 {
            bail!(
                "preview size must be non-zero, got {}x{}",
                config.preview_width,
                config.preview_height
            );
        }
        if !(config.guide_ratio > 0. && config.guide_ratio <= 1.) {
            bail!("guide ratio must be in (0, 1], got {}", config.guide_ratio);
        }
        Ok(Some(config))
    }
}
