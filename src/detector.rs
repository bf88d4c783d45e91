use std::sync::{Arc, Mutex};

use image::{imageops, GrayImage};
use log::debug;
use rqrr::PreparedImage;

use crate::geometry::Rect;

/// 识别到的码的类型
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SymbolKind {
    Qr,
    Other(String),
}

/// 一帧中识别到的一个码
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetadataObject {
    pub kind: SymbolKind,
    /// `None`: 找到了码，但内容解不出来
    pub payload: Option<String>,
}

impl MetadataObject {
    pub fn qr(payload: impl Into<String>) -> Self {
        Self {
            kind: SymbolKind::Qr,
            payload: Some(payload.into()),
        }
    }
}

/// Normalized scan region shared between the UI thread and the capture thread.
#[derive(Clone, Debug)]
pub struct RegionOfInterest(Arc<Mutex<Rect>>);

impl Default for RegionOfInterest {
    fn default() -> Self {
        Self(Arc::new(Mutex::new(Rect::UNIT)))
    }
}

impl RegionOfInterest {
    pub fn set(&self, rect: Rect) {
        if let Ok(mut region) = self.0.lock() {
            *region = rect.clamp_unit();
        }
    }

    pub fn get(&self) -> Rect {
        self.0.lock().map(|region| *region).unwrap_or(Rect::UNIT)
    }
}

/// QR detector over luminance frames in sensor coordinates.
#[derive(Clone, Debug)]
pub struct QrDetector {
    symbol_types: Vec<SymbolKind>,
    region: RegionOfInterest,
}

impl QrDetector {
    pub fn new(symbol_types: &[SymbolKind]) -> Self {
        Self {
            symbol_types: symbol_types.to_vec(),
            region: RegionOfInterest::default(),
        }
    }

    pub fn region(&self) -> RegionOfInterest {
        self.region.clone()
    }

    /// 在识别区域内查找并解码二维码
    pub fn detect(&self, frame: &GrayImage) -> Vec<MetadataObject> {
        if !self.symbol_types.contains(&SymbolKind::Qr) {
            return vec![];
        }
        let (x, y, width, height) = self.region.get().to_pixels(frame.width(), frame.height());
        if width == 0 || height == 0 {
            return vec![];
        }
        let crop = imageops::crop_imm(frame, x, y, width, height).to_image();

        let mut prepared = PreparedImage::prepare_from_greyscale(
            width as usize,
            height as usize,
            |px, py| crop.get_pixel(px as u32, py as u32)[0],
        );
        prepared
            .detect_grids()
            .into_iter()
            .map(|grid| {
                let payload = match grid.decode() {
                    Ok((_meta, content)) => Some(content),
                    Err(err) => {
                        debug!("qr grid found but not decodable: {err:?}");
                        None
                    }
                };
                MetadataObject {
                    kind: SymbolKind::Qr,
                    payload,
                }
            })
            .collect()
    }
}
