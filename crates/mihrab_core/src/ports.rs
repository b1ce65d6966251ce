//! crates/mihrab_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the text-generation backend, the rasterizer and the
//! place exported files end up.

use crate::domain::{CapturedImage, GenerationResult};
use crate::render::CardStage;
use async_trait::async_trait;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// The error taxonomy shared by all ports.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("No provider credential is configured")]
    MissingCredential,
    #[error("The provider rejected the credential: {0}")]
    InvalidCredential(String),
    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("Capture element not found: {0}")]
    ElementNotFound(String),
    #[error("Capture failed: {0}")]
    CaptureFailed(String),
    #[error("No generation result is available")]
    NoResult,
    #[error("Card index {index} is out of range for {len} cards")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

impl PortError {
    /// Short machine-readable name of the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            PortError::MissingCredential => "missing_credential",
            PortError::InvalidCredential(_) => "invalid_credential",
            PortError::MalformedResponse(_) => "malformed_response",
            PortError::ProviderUnavailable(_) => "provider_unavailable",
            PortError::ElementNotFound(_) => "element_not_found",
            PortError::CaptureFailed(_) => "capture_failed",
            PortError::NoResult => "no_result",
            PortError::IndexOutOfRange { .. } => "index_out_of_range",
            PortError::Unexpected(_) => "unexpected",
        }
    }

    /// The localized, non-technical message shown to the end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            PortError::MissingCredential => {
                "لم يتم إعداد المفتاح البرمجي. يرجى إضافة مفتاح Gemini للمتابعة."
            }
            PortError::InvalidCredential(_) => {
                "خطأ في إعدادات المفتاح البرمجي. يرجى التأكد من صحة المفتاح."
            }
            PortError::MalformedResponse(_) => "بيانات غير مكتملة. يرجى المحاولة مجدداً.",
            PortError::ProviderUnavailable(_) | PortError::Unexpected(_) => {
                "عذراً، المحرك مشغول أو لم يستطع معالجة الطلب. حاول مجدداً."
            }
            PortError::ElementNotFound(_) | PortError::CaptureFailed(_) => {
                "حدث خطأ أثناء الحفظ. يرجى المحاولة مرة أخرى."
            }
            PortError::NoResult | PortError::IndexOutOfRange { .. } => {
                "لا توجد بطاقة جاهزة للتحميل."
            }
        }
    }
}

/// Substrings that mark a provider failure as an authorization problem.
const AUTH_INDICATORS: &[&str] = &[
    "api key",
    "api_key",
    "apikey",
    "unauthenticated",
    "permission_denied",
    "invalid key",
    "unauthorized",
];

/// Classifies a failed provider call into the error taxonomy.
///
/// `status` is the HTTP status when the failure came from a response.
pub fn classify_provider_failure(status: Option<u16>, message: &str) -> PortError {
    let lowered = message.to_lowercase();
    let auth_status = matches!(status, Some(401) | Some(403));
    if auth_status || AUTH_INDICATORS.iter().any(|needle| lowered.contains(needle)) {
        PortError::InvalidCredential(message.to_string())
    } else {
        PortError::ProviderUnavailable(message.to_string())
    }
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Turns a topic into a validated collection of card contents.
    async fn generate(&self, topic: &str) -> PortResult<GenerationResult>;
}

#[async_trait]
pub trait CaptureService: Send + Sync {
    /// Rasterizes the capture-mode render of `card_index` found in `stage`.
    async fn capture(&self, stage: &CardStage, card_index: usize) -> PortResult<CapturedImage>;
}

#[async_trait]
pub trait ImageSink: Send + Sync {
    /// Delivers an exported image under the given file name.
    async fn save(&self, file_name: &str, image: &CapturedImage) -> PortResult<()>;
}
