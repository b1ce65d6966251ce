//! crates/mihrab_core/src/render/svg.rs
//!
//! Small SVG building helpers: escaping, number formatting and shape snippets.

/// Escapes special XML characters for use in SVG text content and attributes.
pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Formats a length with one decimal, trimming a trailing `.0`.
pub fn num(value: f32) -> String {
    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        format!("{:.1}", rounded)
    }
}

/// A rectangle whose top corners use `top` and bottom corners use `bottom` radius.
pub fn arch_path(x: f32, y: f32, w: f32, h: f32, top: f32, bottom: f32) -> String {
    let bottom = bottom.min(w / 2.0).min(h / 2.0);
    let top = top.min(w / 2.0).min((h - bottom).max(0.0));
    format!(
        "M{x0},{y1} A{t},{t} 0 0 1 {x1},{y0} H{x2} A{t},{t} 0 0 1 {x3},{y1} V{y2} \
         A{b},{b} 0 0 1 {x4},{y3} H{x5} A{b},{b} 0 0 1 {x0},{y2} Z",
        x0 = num(x),
        y0 = num(y),
        y1 = num(y + top),
        x1 = num(x + top),
        x2 = num(x + w - top),
        x3 = num(x + w),
        y2 = num(y + h - bottom),
        x4 = num(x + w - bottom),
        y3 = num(y + h),
        x5 = num(x + bottom),
        t = num(top),
        b = num(bottom),
    )
}

/// One `<text>` element per line, centred on `cx`, starting at `top`.
#[allow(clippy::too_many_arguments)]
pub fn text_lines(
    out: &mut String,
    lines: &[String],
    cx: f32,
    top: f32,
    font_size: f32,
    line_height: f32,
    weight: u16,
    fill: &str,
    opacity: f32,
) {
    let step = font_size * line_height;
    for (i, line) in lines.iter().enumerate() {
        let baseline = top + step * (i as f32 + 0.5) + font_size * 0.35;
        out.push_str(&format!(
            "<text x=\"{}\" y=\"{}\" text-anchor=\"middle\" font-size=\"{}\" font-weight=\"{}\" fill=\"{}\" fill-opacity=\"{}\">{}</text>",
            num(cx),
            num(baseline),
            num(font_size),
            weight,
            fill,
            opacity,
            escape(line)
        ));
    }
}
