//! crates/mihrab_core/src/themes.rs
//!
//! The static palette catalog. The first entry is the default theme.

use crate::domain::Theme;

static THEMES: [Theme; 6] = [
    Theme {
        name: "العنابي الملكي",
        background_color: "#3d0808",
        accent_color: "#e2e8f0",
        text_color: "#ffffff",
        swatch: &["#3d0808", "#e2e8f0"],
    },
    Theme {
        name: "الكحلي والذهبي",
        background_color: "#0f172a",
        accent_color: "#fbbf24",
        text_color: "#ffffff",
        swatch: &["#0f172a", "#fbbf24"],
    },
    Theme {
        name: "الأخضر الزمردي",
        background_color: "#064e3b",
        accent_color: "#10b981",
        text_color: "#ffffff",
        swatch: &["#064e3b", "#10b981"],
    },
    Theme {
        name: "الرملي الأندلسي",
        background_color: "#451a03",
        accent_color: "#f59e0b",
        text_color: "#ffffff",
        swatch: &["#451a03", "#f59e0b"],
    },
    Theme {
        name: "الأسود الفيروزي",
        background_color: "#111827",
        accent_color: "#2dd4bf",
        text_color: "#ffffff",
        swatch: &["#111827", "#2dd4bf"],
    },
    Theme {
        name: "الأموي البنفسجي",
        background_color: "#2e1065",
        accent_color: "#d8b4fe",
        text_color: "#ffffff",
        swatch: &["#2e1065", "#d8b4fe"],
    },
];

/// All themes, in display order.
pub fn catalog() -> &'static [Theme] {
    &THEMES
}

pub fn default_theme() -> &'static Theme {
    &THEMES[0]
}

/// Looks a theme up by its unique name.
pub fn find(name: &str) -> Option<&'static Theme> {
    THEMES.iter().find(|theme| theme.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_are_unique() {
        let names: HashSet<_> = catalog().iter().map(|t| t.name).collect();
        assert_eq!(names.len(), catalog().len());
    }

    #[test]
    fn swatch_starts_with_background() {
        for theme in catalog() {
            assert_eq!(theme.swatch.first(), Some(&theme.background_color));
        }
    }

    #[test]
    fn find_returns_catalog_entry() {
        let theme = find("الكحلي والذهبي").unwrap();
        assert_eq!(theme.accent_color, "#fbbf24");
        assert!(find("missing").is_none());
        assert_eq!(default_theme().name, "العنابي الملكي");
    }
}
