//! Copy candidates: styled ad-copy variants proposed for a product.

use serde::{Deserialize, Serialize};

use crate::types::CopyId;

// ---------------------------------------------------------------------------
// Styles
// ---------------------------------------------------------------------------

pub const STYLE_TRENDY: &str = "trendy";
pub const STYLE_LITERARY: &str = "literary";
pub const STYLE_HUMOR: &str = "humor";

/// Styles produced by the template copywriter, in display order.
pub const DEFAULT_STYLES: &[&str] = &[STYLE_TRENDY, STYLE_LITERARY, STYLE_HUMOR];

/// Number of candidates produced per batch.
pub const CANDIDATES_PER_BATCH: usize = 3;

// ---------------------------------------------------------------------------
// CopyCandidate
// ---------------------------------------------------------------------------

/// One proposed piece of copy.
///
/// `edited_text`, when present, replaces `generated_text` everywhere
/// downstream (selection, generation request, preview).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyCandidate {
    pub id: CopyId,
    pub name: String,
    pub icon: String,
    pub generated_text: String,
    pub edited_text: Option<String>,
}

impl CopyCandidate {
    pub fn new(
        id: impl Into<CopyId>,
        name: impl Into<String>,
        icon: impl Into<String>,
        generated_text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            icon: icon.into(),
            generated_text: generated_text.into(),
            edited_text: None,
        }
    }

    /// The edited override if present, else the generated text.
    pub fn effective_text(&self) -> &str {
        self.edited_text.as_deref().unwrap_or(&self.generated_text)
    }

    pub fn is_edited(&self) -> bool {
        self.edited_text.is_some()
    }
}

/// Built-in template copy for `style`, or `None` for an unknown style.
pub fn template_candidate(style: &str, product: &str) -> Option<CopyCandidate> {
    let candidate = match style {
        STYLE_TRENDY => CopyCandidate::new(
            STYLE_TRENDY,
            "Trendy",
            "🔥",
            format!(
                "{product} is hands down the chillest pick this winter~ Rich roasted sugar \
                 meets sweet-tart strawberry, every sip a surprise 💕 On sale for a limited \
                 time, tag your bestie and come check in!"
            ),
        ),
        STYLE_LITERARY => CopyCandidate::new(
            STYLE_LITERARY,
            "Literary",
            "📖",
            format!(
                "A winter afternoon, a cup of {product}.\n\nWarm roasted sugar wraps the \
                 brightness of berries, like the good moments of days gone by.\n\nSeasonal \
                 only, sharing this small winter happiness with you."
            ),
        ),
        STYLE_HUMOR => CopyCandidate::new(
            STYLE_HUMOR,
            "Humor",
            "😄",
            format!(
                "Boss: \"If this {product} doesn't sell, it comes out of your paycheck!\"\n\
                 Me: \"Then I'll drink three to calm my nerves.\"\n\nAnd... I really did \
                 drink three 🤣\n#TooGood #DietStartsTomorrow"
            ),
        ),
        _ => return None,
    };
    Some(candidate)
}

/// The standard three-style batch for `product`.
pub fn template_batch(product: &str) -> Vec<CopyCandidate> {
    DEFAULT_STYLES
        .iter()
        .filter_map(|style| template_candidate(style, product))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
