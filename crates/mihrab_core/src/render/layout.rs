//! crates/mihrab_core/src/render/layout.rs
//!
//! Mode-dependent layout constants for the card renderer.
//!
//! Only numbers live here; the structure of a card is the same in every mode.

use super::RenderMode;

/// Capture resolution is the screen layout scaled by this factor.
pub const CAPTURE_SCALE: f32 = 3.0;

/// Average glyph advance as a fraction of the font size, used for wrapping.
const GLYPH_ADVANCE: f32 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct CardLayout {
    pub width: f32,
    pub height: f32,
    /// Fixed pixel size; `None` means the card stretches to its container.
    pub pixel_size: Option<(u32, u32)>,
    pub padding: f32,
    pub badge_font: f32,
    pub badge_padding_x: f32,
    pub ornament_blur: f32,
    pub ornament_opacity: f32,
    pub arch_top: f32,
    pub arch_radius: f32,
    pub arch_bottom_radius: f32,
    pub arch_border: f32,
    pub arch_padding_top: f32,
    pub arch_padding_bottom: f32,
    pub arch_padding_x: f32,
    pub crown_radius: f32,
    pub crown_dot_radius: f32,
    pub crown_offset: f32,
    pub overlay_opacity: f32,
    pub hook_font: f32,
    pub hook_line_height: f32,
    pub middle_padding_y: f32,
    pub bullet_gap: f32,
    pub bullet_font: f32,
    pub bullet_line_height: f32,
    pub bullet_padding: f32,
    pub bullet_radius: f32,
    pub bullet_border: f32,
    pub bullet_min_height: f32,
    pub divider_width: f32,
    pub divider_height: f32,
    pub footer_gap: f32,
    pub footer_font: f32,
    pub footer_line_height: f32,
    pub footer_opacity: f32,
    pub footer_bottom: f32,
    /// Wrap widths in characters. They are derived from the screen layout
    /// and never scaled, so both modes break lines at the same places.
    pub hook_columns: usize,
    pub bullet_columns: usize,
    pub footer_columns: usize,
}

impl CardLayout {
    pub fn for_mode(mode: RenderMode) -> Self {
        match mode {
            RenderMode::Screen => Self::screen(),
            RenderMode::Capture => Self::capture(),
        }
    }

    /// The flexible on-screen card, laid out on a 9:16 canvas.
    pub fn screen() -> Self {
        let width = 360.0;
        let padding = 24.0;
        let arch_padding_x = 20.0;
        let bullet_padding = 14.0;
        let hook_font = 22.0;
        let bullet_font = 17.0;
        let footer_font = 13.0;
        let inner = width - 2.0 * padding;
        Self {
            width,
            height: 640.0,
            pixel_size: None,
            padding,
            badge_font: 10.0,
            badge_padding_x: 9.0,
            ornament_blur: 35.0,
            ornament_opacity: 0.2,
            arch_top: 48.0,
            arch_radius: 90.0,
            arch_bottom_radius: 16.0,
            arch_border: 3.0,
            arch_padding_top: 36.0,
            arch_padding_bottom: 28.0,
            arch_padding_x,
            crown_radius: 15.0,
            crown_dot_radius: 4.0,
            crown_offset: 10.0,
            overlay_opacity: 0.2,
            hook_font,
            hook_line_height: 1.6,
            middle_padding_y: 24.0,
            bullet_gap: 20.0,
            bullet_font,
            bullet_line_height: 1.35,
            bullet_padding,
            bullet_radius: 40.0,
            bullet_border: 2.5,
            bullet_min_height: 40.0,
            divider_width: 64.0,
            divider_height: 4.0,
            footer_gap: 20.0,
            footer_font,
            footer_line_height: 1.6,
            footer_opacity: 0.8,
            footer_bottom: 24.0,
            hook_columns: columns(inner - 2.0 * arch_padding_x, hook_font),
            bullet_columns: columns(inner - 2.0 * bullet_padding, bullet_font),
            footer_columns: columns(inner - 48.0, footer_font),
        }
    }

    /// The export layout: fixed 1080×1920 pixels, typography scaled up and a
    /// solid-leaning overlay instead of a translucent one.
    pub fn capture() -> Self {
        let mut layout = Self::screen().scaled(CAPTURE_SCALE);
        layout.overlay_opacity = 0.5;
        layout.pixel_size = Some((layout.width.round() as u32, layout.height.round() as u32));
        layout
    }

    /// Scales every length by `factor`. Opacities and wrap widths are kept.
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            width: self.width * factor,
            height: self.height * factor,
            pixel_size: self.pixel_size,
            padding: self.padding * factor,
            badge_font: self.badge_font * factor,
            badge_padding_x: self.badge_padding_x * factor,
            ornament_blur: self.ornament_blur * factor,
            ornament_opacity: self.ornament_opacity,
            arch_top: self.arch_top * factor,
            arch_radius: self.arch_radius * factor,
            arch_bottom_radius: self.arch_bottom_radius * factor,
            arch_border: self.arch_border * factor,
            arch_padding_top: self.arch_padding_top * factor,
            arch_padding_bottom: self.arch_padding_bottom * factor,
            arch_padding_x: self.arch_padding_x * factor,
            crown_radius: self.crown_radius * factor,
            crown_dot_radius: self.crown_dot_radius * factor,
            crown_offset: self.crown_offset * factor,
            overlay_opacity: self.overlay_opacity,
            hook_font: self.hook_font * factor,
            hook_line_height: self.hook_line_height,
            middle_padding_y: self.middle_padding_y * factor,
            bullet_gap: self.bullet_gap * factor,
            bullet_font: self.bullet_font * factor,
            bullet_line_height: self.bullet_line_height,
            bullet_padding: self.bullet_padding * factor,
            bullet_radius: self.bullet_radius * factor,
            bullet_border: self.bullet_border * factor,
            bullet_min_height: self.bullet_min_height * factor,
            divider_width: self.divider_width * factor,
            divider_height: self.divider_height * factor,
            footer_gap: self.footer_gap * factor,
            footer_font: self.footer_font * factor,
            footer_line_height: self.footer_line_height,
            footer_opacity: self.footer_opacity,
            footer_bottom: self.footer_bottom * factor,
            hook_columns: self.hook_columns,
            bullet_columns: self.bullet_columns,
            footer_columns: self.footer_columns,
        }
    }

    pub fn inner_width(&self) -> f32 {
        self.width - 2.0 * self.padding
    }
}

fn columns(available: f32, font_size: f32) -> usize {
    ((available / (font_size * GLYPH_ADVANCE)).floor() as usize).max(1)
}
