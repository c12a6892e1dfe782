use serde::{Deserialize, Serialize};

/// Copy candidates are keyed by their style id (`trendy`, `literary`, ...).
pub type CopyId = String;

/// Generated image ids are opaque strings assigned by the producer.
pub type ImageId = String;

/// Monotonic counter identifying one generation attempt.
///
/// Every reset and every new request bumps the counter, so a completion
/// carrying an older value is known to be stale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AttemptId(pub u64);

impl AttemptId {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for AttemptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a user-visible notice, used to dismiss exactly that notice.
pub type NoticeId = u64;
