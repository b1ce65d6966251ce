//! crates/mihrab_core/src/render/mod.rs
//!
//! The card renderer. A card is rendered to SVG in one of two modes that share
//! the exact same structure and differ only in the constants of [`CardLayout`]:
//! a flexible screen preview and a fixed-resolution capture target.

pub mod layout;
pub mod svg;

use crate::domain::{CardContent, GenerationResult, Theme};
use layout::CardLayout;
use serde::Serialize;
use svg::{arch_path, escape, num, text_lines};

/// Primary font family when none is configured.
pub const DEFAULT_FONT_FAMILY: &str = "Tajawal";

/// The `font-family` value of a card: the given family first, then fallbacks.
pub fn font_stack(family: &str) -> String {
    format!("'{}', 'Noto Kufi Arabic', sans-serif", escape(family.trim()))
}

/// Label shown in the index badge, followed by the 1-based position.
pub const BADGE_LABEL: &str = "البطاقة";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    Screen,
    Capture,
}

impl RenderMode {
    /// The stable element id a card of this mode is rendered under.
    pub fn element_id(self, index: usize) -> String {
        match self {
            RenderMode::Screen => format!("infographic-card-{index}"),
            RenderMode::Capture => format!("capture-card-{index}"),
        }
    }
}

/// The structural regions of a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Badge,
    Hook,
    Bullet(usize),
    Closing,
}

/// One text block of a rendered card, after wrapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    pub region: Region,
    pub lines: Vec<String>,
}

/// A rendered card (one render target).
#[derive(Debug, Clone)]
pub struct RenderedCard {
    pub element_id: String,
    pub mode: RenderMode,
    pub index: usize,
    pub layout: CardLayout,
    pub svg: String,
    outline: Vec<OutlineEntry>,
}

impl RenderedCard {
    /// The text structure of the card in paint order.
    pub fn outline(&self) -> &[OutlineEntry] {
        &self.outline
    }

    /// Fixed pixel dimensions, present only for capture renders.
    pub fn pixel_size(&self) -> Option<(u32, u32)> {
        self.layout.pixel_size
    }
}

/// Renders one card. Pure: identical inputs give identical output.
pub fn render_card(
    content: &CardContent,
    theme: &Theme,
    font_family: &str,
    index: usize,
    mode: RenderMode,
) -> RenderedCard {
    let layout = CardLayout::for_mode(mode);
    let element_id = mode.element_id(index);
    let mut outline = Vec::new();
    let mut body = String::new();

    let w = layout.width;
    let h = layout.height;
    let cx = w / 2.0;
    let text_fill = theme.text_color;

    // Background and accent glows.
    body.push_str(&format!(
        "<rect width=\"{}\" height=\"{}\" fill=\"{}\"/>",
        num(w),
        num(h),
        theme.background_color
    ));
    body.push_str(&format!(
        "<defs><filter id=\"{id}-glow\" x=\"-50%\" y=\"-50%\" width=\"200%\" height=\"200%\"><feGaussianBlur stdDeviation=\"{}\"/></filter></defs>",
        num(layout.ornament_blur),
        id = element_id
    ));
    for (gx, gy) in [(0.25, 0.1), (0.75, 0.9)] {
        body.push_str(&format!(
            "<ellipse cx=\"{}\" cy=\"{}\" rx=\"{}\" ry=\"{}\" fill=\"{}\" opacity=\"{}\" filter=\"url(#{}-glow)\"/>",
            num(w * gx),
            num(h * gy),
            num(w * 0.35),
            num(h * 0.15),
            theme.accent_color,
            layout.ornament_opacity,
            element_id
        ));
    }

    // Index badge, top right.
    let badge_text = format!("{BADGE_LABEL} {}", index + 1);
    let badge_h = layout.badge_font * 2.0;
    let badge_w = badge_text.chars().count() as f32 * layout.badge_font * 0.55
        + 2.0 * layout.badge_padding_x;
    let badge_x = w - layout.padding - badge_w;
    body.push_str(&format!(
        "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" rx=\"{}\" fill=\"#000000\" fill-opacity=\"0.4\" stroke=\"#ffffff\" stroke-opacity=\"0.2\"/>",
        num(badge_x),
        num(layout.padding),
        num(badge_w),
        num(badge_h),
        num(badge_h / 2.0)
    ));
    let badge_lines = vec![badge_text];
    text_lines(
        &mut body,
        &badge_lines,
        badge_x + badge_w / 2.0,
        layout.padding + (badge_h - layout.badge_font * 1.2) / 2.0,
        layout.badge_font,
        1.2,
        700,
        text_fill,
        1.0,
    );
    outline.push(OutlineEntry {
        region: Region::Badge,
        lines: badge_lines,
    });

    // Header arch with the hook.
    let hook_lines = wrap(&content.hook, layout.hook_columns);
    let arch_x = layout.padding;
    let arch_w = layout.inner_width();
    let arch_h = layout.arch_padding_top
        + hook_lines.len() as f32 * layout.hook_font * layout.hook_line_height
        + layout.arch_padding_bottom;
    body.push_str(&format!(
        "<path d=\"{}\" fill=\"#000000\" fill-opacity=\"{}\" stroke=\"{}\" stroke-width=\"{}\"/>",
        arch_path(
            arch_x,
            layout.arch_top,
            arch_w,
            arch_h,
            layout.arch_radius,
            layout.arch_bottom_radius
        ),
        layout.overlay_opacity,
        theme.accent_color,
        num(layout.arch_border)
    ));
    let crown_cy = layout.arch_top - layout.crown_offset + layout.crown_radius;
    body.push_str(&format!(
        "<circle cx=\"{}\" cy=\"{}\" r=\"{}\" fill=\"#ffffff\"/><circle cx=\"{}\" cy=\"{}\" r=\"{}\" fill=\"{}\"/>",
        num(cx),
        num(crown_cy),
        num(layout.crown_radius),
        num(cx),
        num(crown_cy),
        num(layout.crown_dot_radius),
        theme.background_color
    ));
    text_lines(
        &mut body,
        &hook_lines,
        cx,
        layout.arch_top + layout.arch_padding_top,
        layout.hook_font,
        layout.hook_line_height,
        900,
        text_fill,
        1.0,
    );
    outline.push(OutlineEntry {
        region: Region::Hook,
        lines: hook_lines,
    });

    // Footer, anchored to the bottom edge.
    let closing_lines = wrap(&content.closing_line, layout.footer_columns);
    let footer_text_h =
        closing_lines.len() as f32 * layout.footer_font * layout.footer_line_height;
    let footer_top = h
        - layout.padding
        - layout.footer_bottom
        - footer_text_h
        - layout.footer_gap
        - layout.divider_height;

    // Bullet blocks, centred in the space between the arch and the footer.
    let middle_top = layout.arch_top + arch_h + layout.middle_padding_y;
    let middle_bottom = footer_top - layout.middle_padding_y;
    let blocks: Vec<(Vec<String>, f32)> = content
        .bullet_points
        .iter()
        .map(|point| {
            let lines = wrap(point, layout.bullet_columns);
            let text_h = lines.len() as f32 * layout.bullet_font * layout.bullet_line_height;
            let block_h = (text_h + 2.0 * layout.bullet_padding).max(layout.bullet_min_height);
            (lines, block_h)
        })
        .collect();
    let stacked: f32 = blocks.iter().map(|(_, bh)| *bh).sum::<f32>()
        + layout.bullet_gap * blocks.len().saturating_sub(1) as f32;
    let mut y = middle_top + ((middle_bottom - middle_top - stacked) / 2.0).max(0.0);
    for (idx, (lines, block_h)) in blocks.into_iter().enumerate() {
        body.push_str(&format!(
            "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" rx=\"{}\" fill=\"{}\" stroke=\"#ffffff\" stroke-width=\"{}\"/>",
            num(layout.padding),
            num(y),
            num(arch_w),
            num(block_h),
            num(layout.bullet_radius.min(block_h / 2.0)),
            theme.background_color,
            num(layout.bullet_border)
        ));
        let text_h = lines.len() as f32 * layout.bullet_font * layout.bullet_line_height;
        text_lines(
            &mut body,
            &lines,
            cx,
            y + (block_h - text_h) / 2.0,
            layout.bullet_font,
            layout.bullet_line_height,
            700,
            text_fill,
            1.0,
        );
        outline.push(OutlineEntry {
            region: Region::Bullet(idx),
            lines,
        });
        y += block_h + layout.bullet_gap;
    }

    body.push_str(&format!(
        "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" rx=\"{}\" fill=\"#ffffff\" fill-opacity=\"0.2\"/>",
        num(cx - layout.divider_width / 2.0),
        num(footer_top),
        num(layout.divider_width),
        num(layout.divider_height),
        num(layout.divider_height / 2.0)
    ));
    text_lines(
        &mut body,
        &closing_lines,
        cx,
        footer_top + layout.divider_height + layout.footer_gap,
        layout.footer_font,
        layout.footer_line_height,
        700,
        text_fill,
        layout.footer_opacity,
    );
    outline.push(OutlineEntry {
        region: Region::Closing,
        lines: closing_lines,
    });

    let size_attrs = match layout.pixel_size {
        Some((pw, ph)) => format!("width=\"{pw}\" height=\"{ph}\""),
        None => "width=\"100%\" preserveAspectRatio=\"xMidYMid meet\"".to_string(),
    };
    let svg = format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" id=\"{}\" {} viewBox=\"0 0 {} {}\" direction=\"rtl\" font-family=\"{}\" data-title=\"{}\">{}</svg>",
        element_id,
        size_attrs,
        num(w),
        num(h),
        font_stack(font_family),
        escape(&content.title),
        body
    );

    RenderedCard {
        element_id,
        mode,
        index,
        layout,
        svg,
        outline,
    }
}

fn wrap(text: &str, columns: usize) -> Vec<String> {
    textwrap::wrap(text.trim(), columns)
        .into_iter()
        .map(|line| line.into_owned())
        .collect()
}

//=========================================================================================
// CardStage (the render targets of one generation result)
//=========================================================================================

/// Every render target of one result under one theme: a screen card and a
/// capture card per index.
#[derive(Debug, Clone)]
pub struct CardStage {
    theme: Theme,
    cards: Vec<RenderedCard>,
}

impl CardStage {
    pub fn build(result: &GenerationResult, theme: &Theme, font_family: &str) -> Self {
        let cards = result
            .parts()
            .iter()
            .enumerate()
            .flat_map(move |(idx, part)| {
                [RenderMode::Screen, RenderMode::Capture]
                    .into_iter()
                    .map(move |mode| render_card(part, theme, font_family, idx, mode))
            })
            .collect();
        Self {
            theme: theme.clone(),
            cards,
        }
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    /// Looks a render target up by its element id.
    pub fn find(&self, element_id: &str) -> Option<&RenderedCard> {
        self.cards.iter().find(|card| card.element_id == element_id)
    }

    pub fn card(&self, index: usize, mode: RenderMode) -> Option<&RenderedCard> {
        self.find(&mode.element_id(index))
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::themes;

    fn content(bullets: &[&str]) -> CardContent {
        CardContent {
            title: "قصة أصحاب الكهف".to_string(),
            hook: "هل تعلم لماذا نقرأ سورة الكهف يوم الجمعة؟".to_string(),
            bullet_points: bullets.iter().map(|b| b.to_string()).collect(),
            closing_line: "اللهم اجعلنا من أهل القرآن".to_string(),
        }
    }

    #[test]
    fn rendering_is_idempotent() {
        let c = content(&["نور ما بين الجمعتين", "عصمة من الدجال", "قصص أربع"]);
        let theme = themes::default_theme();
        for mode in [RenderMode::Screen, RenderMode::Capture] {
            let a = render_card(&c, theme, DEFAULT_FONT_FAMILY, 2, mode);
            let b = render_card(&c, theme, DEFAULT_FONT_FAMILY, 2, mode);
            assert_eq!(a.svg, b.svg);
            assert_eq!(a.outline(), b.outline());
        }
    }

    #[test]
    fn modes_share_structure_and_text() {
        let c = content(&["نور ما بين الجمعتين", "عصمة من الدجال", "قصص أربع", "خامسة"]);
        let theme = themes::default_theme();
        let screen = render_card(&c, theme, DEFAULT_FONT_FAMILY, 0, RenderMode::Screen);
        let capture = render_card(&c, theme, DEFAULT_FONT_FAMILY, 0, RenderMode::Capture);
        assert_eq!(screen.outline(), capture.outline());
        assert_eq!(screen.svg.matches("<text").count(), capture.svg.matches("<text").count());
        assert_eq!(screen.svg.matches("<rect").count(), capture.svg.matches("<rect").count());
        assert_ne!(screen.svg, capture.svg);
    }

    #[test]
    fn capture_mode_is_fixed_size_with_stable_id() {
        let c = content(&["a", "b", "c"]);
        let card = render_card(&c, themes::default_theme(), DEFAULT_FONT_FAMILY, 4, RenderMode::Capture);
        assert_eq!(card.element_id, "capture-card-4");
        assert_eq!(card.pixel_size(), Some((1080, 1920)));
        assert!(card.svg.contains("width=\"1080\" height=\"1920\""));
        assert!(card.svg.contains("direction=\"rtl\""));

        let screen = render_card(&c, themes::default_theme(), DEFAULT_FONT_FAMILY, 4, RenderMode::Screen);
        assert_eq!(screen.element_id, "infographic-card-4");
        assert!(screen.svg.contains("width=\"100%\""));
    }

    #[test]
    fn badge_shows_one_based_position() {
        let card = render_card(&content(&["a"]), themes::default_theme(), DEFAULT_FONT_FAMILY, 1, RenderMode::Screen);
        assert_eq!(card.outline()[0].region, Region::Badge);
        assert_eq!(card.outline()[0].lines, vec!["البطاقة 2".to_string()]);
    }

    #[test]
    fn zero_bullets_render_an_empty_middle() {
        let card = render_card(&content(&[]), themes::default_theme(), DEFAULT_FONT_FAMILY, 0, RenderMode::Capture);
        let regions: Vec<_> = card.outline().iter().map(|e| e.region).collect();
        assert_eq!(regions, vec![Region::Badge, Region::Hook, Region::Closing]);
    }

    #[test]
    fn content_text_is_escaped() {
        let mut c = content(&["1 < 2 & 3"]);
        c.title = "<script>".to_string();
        let card = render_card(&c, themes::default_theme(), DEFAULT_FONT_FAMILY, 0, RenderMode::Screen);
        assert!(card.svg.contains("1 &lt; 2 &amp; 3"));
        assert!(!card.svg.contains("<script>"));
    }

    #[test]
    fn configured_font_family_leads_the_stack() {
        let c = content(&["a"]);
        let card = render_card(&c, themes::default_theme(), "Amiri", 0, RenderMode::Capture);
        assert!(card
            .svg
            .contains("font-family=\"'Amiri', 'Noto Kufi Arabic', sans-serif\""));
        assert!(!card.svg.contains("Tajawal"));
    }

    #[test]
    fn stage_holds_two_targets_per_card() {
        let parts = (0..6).map(|_| content(&["a", "b", "c"])).collect();
        let result = GenerationResult::new("الكهف", parts).unwrap();
        let stage = CardStage::build(&result, themes::default_theme(), DEFAULT_FONT_FAMILY);
        assert_eq!(stage.len(), 12);
        assert!(stage.find("capture-card-5").is_some());
        assert!(stage.find("capture-card-6").is_none());
        assert_eq!(stage.card(3, RenderMode::Screen).unwrap().index, 3);
    }
}
