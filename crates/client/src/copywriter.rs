//! Template copywriter: the built-in [`CopyGenerator`].
//!
//! There is no copy model behind the studio yet, so candidates come from
//! fixed templates after a simulated latency.

use std::time::Duration;

use async_trait::async_trait;

use brewpost_core::copy::{template_batch, CopyCandidate};
use brewpost_core::error::CoreError;
use brewpost_core::generator::CopyGenerator;
use brewpost_core::workflow::MSG_PRODUCT_REQUIRED;

/// Default simulated latency.
pub const DEFAULT_LATENCY: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy)]
pub struct TemplateCopywriter {
    latency: Duration,
}

impl Default for TemplateCopywriter {
    fn default() -> Self {
        Self::new(DEFAULT_LATENCY)
    }
}

impl TemplateCopywriter {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }
}

#[async_trait]
impl CopyGenerator for TemplateCopywriter {
    async fn generate_copies(&self, product: &str) -> Result<Vec<CopyCandidate>, CoreError> {
        let product = product.trim();
        if product.is_empty() {
            return Err(CoreError::Validation(MSG_PRODUCT_REQUIRED.to_string()));
        }

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let batch = template_batch(product);
        tracing::debug!(product, count = batch.len(), "Template copy generated");
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use brewpost_core::copy::CANDIDATES_PER_BATCH;

    #[tokio::test(start_paused = true)]
    async fn returns_three_styles_after_latency() {
        let writer = TemplateCopywriter::new(Duration::from_millis(1500));
        let started = tokio::time::Instant::now();

        let batch = writer.generate_copies("Brown Sugar Strawberry Latte").await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(1500));
        assert_eq!(batch.len(), CANDIDATES_PER_BATCH);
        let ids: Vec<&str> = batch.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["trendy", "literary", "humor"]);
        assert!(batch
            .iter()
            .all(|c| c.generated_text.contains("Brown Sugar Strawberry Latte")));
    }

    #[tokio::test]
    async fn blank_product_is_rejected() {
        let writer = TemplateCopywriter::new(Duration::ZERO);
        assert_matches!(
            writer.generate_copies("   ").await,
            Err(CoreError::Validation(_))
        );
    }
}
