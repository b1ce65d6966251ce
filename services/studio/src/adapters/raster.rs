//! services/studio/src/adapters/raster.rs
//!
//! The capture adapter: rasterizes the capture-mode SVG of a card with resvg
//! and encodes it as PNG. It implements the `CaptureService` port.

use crate::adapters::fonts::FontLibrary;
use async_trait::async_trait;
use mihrab_core::{
    domain::CapturedImage,
    ports::{CaptureService, PortError, PortResult},
    render::{CardStage, RenderMode},
};
use resvg::{tiny_skia, usvg};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

pub struct ResvgCaptureAdapter {
    fonts: Arc<FontLibrary>,
    /// Pause after fonts are ready and before rasterizing.
    grace: Duration,
}

impl ResvgCaptureAdapter {
    pub fn new(fonts: Arc<FontLibrary>, grace: Duration) -> Self {
        Self { fonts, grace }
    }
}

#[async_trait]
impl CaptureService for ResvgCaptureAdapter {
    async fn capture(&self, stage: &CardStage, card_index: usize) -> PortResult<CapturedImage> {
        let element_id = RenderMode::Capture.element_id(card_index);
        let card = stage
            .find(&element_id)
            .ok_or_else(|| PortError::ElementNotFound(element_id.clone()))?;
        let (width, height) = card.pixel_size().ok_or_else(|| {
            PortError::CaptureFailed(format!("{element_id} has no fixed pixel size"))
        })?;

        let fontdb = self.fonts.ready().await?;
        tokio::time::sleep(self.grace).await;

        let svg = card.svg.clone();
        let background = stage.theme().background_color;
        let family = self.fonts.family().to_string();
        debug!(%element_id, width, height, "Rasterizing card.");

        let png = tokio::task::spawn_blocking(move || {
            rasterize(&svg, width, height, background, fontdb, family)
        })
        .await
        .map_err(|e| PortError::CaptureFailed(format!("rasterizer task failed: {e}")))??;

        Ok(CapturedImage { width, height, png })
    }
}

//=========================================================================================
// Rasterization
//=========================================================================================

fn rasterize(
    svg: &str,
    width: u32,
    height: u32,
    background: &str,
    fontdb: Arc<usvg::fontdb::Database>,
    family: String,
) -> PortResult<Vec<u8>> {
    let options = usvg::Options {
        font_family: family,
        fontdb,
        resources_dir: None,
        ..usvg::Options::default()
    };
    let tree = usvg::Tree::from_str(svg, &options)
        .map_err(|e| PortError::CaptureFailed(format!("invalid card SVG: {e}")))?;

    let mut pixmap = tiny_skia::Pixmap::new(width, height).ok_or_else(|| {
        PortError::CaptureFailed(format!("cannot allocate a {width}x{height} canvas"))
    })?;
    pixmap.fill(parse_hex_color(background).unwrap_or(tiny_skia::Color::BLACK));

    let size = tree.size();
    let transform = tiny_skia::Transform::from_scale(
        width as f32 / size.width(),
        height as f32 / size.height(),
    );
    resvg::render(&tree, transform, &mut pixmap.as_mut());

    pixmap
        .encode_png()
        .map_err(|e| PortError::CaptureFailed(format!("PNG encoding failed: {e}")))
}

/// Parses `#rrggbb` into an opaque color.
fn parse_hex_color(hex: &str) -> Option<tiny_skia::Color> {
    let digits = hex.strip_prefix('#')?;
    if digits.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok();
    Some(tiny_skia::Color::from_rgba8(
        channel(0)?,
        channel(2)?,
        channel(4)?,
        255,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mihrab_core::domain::{CardContent, GenerationResult};
    use mihrab_core::render::DEFAULT_FONT_FAMILY;
    use mihrab_core::themes;
    use resvg::usvg::fontdb;

    fn stage() -> CardStage {
        let parts = (0..6)
            .map(|i| CardContent {
                title: format!("الجزء {i}"),
                hook: "ما الذي يجعل هذه السورة مميزة؟".to_string(),
                bullet_points: vec!["أولاً".into(), "ثانياً".into(), "ثالثاً".into()],
                closing_line: "والحمد لله".to_string(),
            })
            .collect();
        let result = GenerationResult::new("الكهف", parts).unwrap();
        CardStage::build(&result, themes::default_theme(), DEFAULT_FONT_FAMILY)
    }

    fn adapter() -> ResvgCaptureAdapter {
        let fonts = FontLibrary::from_database(fontdb::Database::new(), "Tajawal".to_string());
        ResvgCaptureAdapter::new(Arc::new(fonts), Duration::ZERO)
    }

    fn png_dimensions(png: &[u8]) -> (u32, u32) {
        let read = |at: usize| u32::from_be_bytes([png[at], png[at + 1], png[at + 2], png[at + 3]]);
        (read(16), read(20))
    }

    #[tokio::test]
    async fn captures_a_full_resolution_png() {
        let image = adapter().capture(&stage(), 2).await.unwrap();
        assert_eq!((image.width, image.height), (1080, 1920));
        assert_eq!(&image.png[..8], b"\x89PNG\r\n\x1a\n");
        assert_eq!(png_dimensions(&image.png), (1080, 1920));
        assert!(image.to_data_uri().starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn missing_card_is_element_not_found() {
        let err = adapter().capture(&stage(), 6).await.unwrap_err();
        assert_eq!(err, PortError::ElementNotFound("capture-card-6".to_string()));
    }

    #[test]
    fn hex_colors_parse() {
        assert_eq!(
            parse_hex_color("#4a0e0e"),
            Some(tiny_skia::Color::from_rgba8(0x4a, 0x0e, 0x0e, 255))
        );
        assert_eq!(parse_hex_color("red"), None);
    }
}
