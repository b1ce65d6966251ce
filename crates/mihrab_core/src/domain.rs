//! crates/mihrab_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any transport or rendering backend.

use crate::ports::{PortError, PortResult};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Bullet points per card the provider is asked for.
pub const BULLET_RANGE: std::ops::RangeInclusive<usize> = 3..=5;

/// Number of cards the UI is designed around.
pub const CARDS_PER_COLLECTION: usize = 6;

/// A named, fixed palette applied uniformly to every card of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    pub name: &'static str,
    pub background_color: &'static str,
    pub accent_color: &'static str,
    pub text_color: &'static str,
    pub swatch: &'static [&'static str],
}

/// The generated content of a single card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardContent {
    pub title: String,
    pub hook: String,
    #[serde(alias = "mindMap")]
    pub bullet_points: Vec<String>,
    #[serde(alias = "spiritualTouch")]
    pub closing_line: String,
}

/// A validated set of cards produced by one successful provider call.
///
/// The fields are private so a result can only exist fully populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    collection_name: String,
    parts: Vec<CardContent>,
}

impl GenerationResult {
    /// Builds a result, rejecting payloads without any parts.
    pub fn new(collection_name: impl Into<String>, parts: Vec<CardContent>) -> PortResult<Self> {
        if parts.is_empty() {
            return Err(PortError::MalformedResponse(
                "response contained no parts".to_string(),
            ));
        }
        if parts.len() != CARDS_PER_COLLECTION {
            warn!(
                parts = parts.len(),
                "Provider returned an unexpected number of cards."
            );
        }
        for (idx, part) in parts.iter().enumerate() {
            if !BULLET_RANGE.contains(&part.bullet_points.len()) {
                warn!(
                    card = idx,
                    bullets = part.bullet_points.len(),
                    "Card bullet count outside the requested range."
                );
            }
        }
        Ok(Self {
            collection_name: collection_name.into(),
            parts,
        })
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    pub fn parts(&self) -> &[CardContent] {
        &self.parts
    }

    pub fn part(&self, index: usize) -> Option<&CardContent> {
        self.parts.get(index)
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// A rasterized card ready to be delivered to the user.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

impl CapturedImage {
    /// Encodes the PNG bytes as a `data:` URI.
    pub fn to_data_uri(&self) -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(&self.png))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(bullets: usize) -> CardContent {
        CardContent {
            title: "t".to_string(),
            hook: "h".to_string(),
            bullet_points: (0..bullets).map(|i| format!("p{i}")).collect(),
            closing_line: "c".to_string(),
        }
    }

    #[test]
    fn empty_parts_are_malformed() {
        let err = GenerationResult::new("x", vec![]).unwrap_err();
        assert!(matches!(err, PortError::MalformedResponse(_)));
    }

    #[test]
    fn out_of_range_bullets_are_accepted() {
        let result = GenerationResult::new("x", vec![part(0), part(7)]).unwrap();
        assert_eq!(result.len(), 2);
        assert!(result.part(0).unwrap().bullet_points.is_empty());
    }

    #[test]
    fn content_accepts_upstream_field_names() {
        let json = r#"{"title":"a","hook":"b","mindMap":["1","2","3"],"spiritualTouch":"c"}"#;
        let content: CardContent = serde_json::from_str(json).unwrap();
        assert_eq!(content.bullet_points.len(), 3);
        assert_eq!(content.closing_line, "c");
    }

    #[test]
    fn data_uri_has_png_prefix() {
        let image = CapturedImage {
            width: 1,
            height: 1,
            png: vec![0x89, b'P', b'N', b'G'],
        };
        assert_eq!(image.to_data_uri(), "data:image/png;base64,iVBORw==");
    }
}
