//! Content generation workflow: a single reducer over [`WorkflowState`].
//!
//! Stages run `WaitingInput -> CopyGenerating -> CopyReady ->
//! ImageGenerating -> Done`.  Every change goes through
//! [`WorkflowState::apply`], which validates the event against the
//! current stage, mutates the state, and returns the [`Effect`]s the
//! runtime must perform (start, finish or reset a progress timer; call a
//! generator).
//!
//! Stale completions are recognised by their [`AttemptId`]: every reset
//! and every new request bumps the attempt, so a response for an older
//! attempt is dropped without touching state.

use serde::Serialize;

use crate::copy::CopyCandidate;
use crate::error::CoreError;
use crate::generator::{GeneratedImage, ImageRequest};
use crate::progress::ProgressSkin;
use crate::types::{AttemptId, CopyId, ImageId, NoticeId};
use crate::upload::UploadedImage;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

pub const MSG_IMAGE_REQUIRED: &str = "Please upload a product image first";
pub const MSG_PRODUCT_REQUIRED: &str = "Please select a product first";
pub const MSG_EMPTY_BATCH: &str = "Copy generation returned no candidates";
pub const MSG_EMPTY_EDIT: &str = "Copy text cannot be empty";

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    #[default]
    WaitingInput,
    CopyGenerating,
    CopyReady,
    ImageGenerating,
    Done,
}

impl WorkflowStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WaitingInput => "waiting_input",
            Self::CopyGenerating => "copy_generating",
            Self::CopyReady => "copy_ready",
            Self::ImageGenerating => "image_generating",
            Self::Done => "done",
        }
    }

    /// A generation request is in flight.
    pub fn is_generating(self) -> bool {
        matches!(self, Self::CopyGenerating | Self::ImageGenerating)
    }

    /// Candidates exist and are shown.
    pub fn has_candidates(self) -> bool {
        matches!(self, Self::CopyReady | Self::ImageGenerating | Self::Done)
    }
}

impl std::fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Progress slots
// ---------------------------------------------------------------------------

/// The two independent progress timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressSlot {
    Copy,
    Image,
}

impl ProgressSlot {
    pub fn skin(self) -> ProgressSkin {
        match self {
            Self::Copy => ProgressSkin::Boba,
            Self::Image => ProgressSkin::TeaFlow,
        }
    }
}

// ---------------------------------------------------------------------------
// Notices and editing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// Missing input; dismissed automatically after a short interval.
    Validation,
    /// A generation call failed; stays until dismissed or replaced.
    Generation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub id: NoticeId,
    pub kind: NoticeKind,
    pub message: String,
}

/// Scratch buffer of the copy edit dialog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditSession {
    pub copy_id: CopyId,
    pub draft: String,
}

// ---------------------------------------------------------------------------
// Events and effects
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    SelectProduct(String),
    StageImage(UploadedImage),
    ClearImage,
    RequestCopies,
    CopiesGenerated {
        attempt: AttemptId,
        candidates: Vec<CopyCandidate>,
    },
    CopiesFailed {
        attempt: AttemptId,
        message: String,
    },
    SelectCopy(CopyId),
    Regenerate,
    ImageGenerated {
        attempt: AttemptId,
        image: GeneratedImage,
    },
    ImageFailed {
        attempt: AttemptId,
        message: String,
    },
    SelectImage(ImageId),
    OpenEditor(CopyId),
    UpdateDraft(String),
    SaveEdit,
    CancelEdit,
    DismissNotice(NoticeId),
}

/// Work the runtime must perform after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    StartProgress(ProgressSlot),
    FinishProgress(ProgressSlot),
    ResetProgress(ProgressSlot),
    GenerateCopies {
        attempt: AttemptId,
        product: String,
    },
    GenerateImage {
        attempt: AttemptId,
        request: ImageRequest,
    },
}

// ---------------------------------------------------------------------------
// Derived views
// ---------------------------------------------------------------------------

/// Enabled/disabled state of every workflow control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Controls {
    pub generate_copy: bool,
    pub select_copy: bool,
    pub edit_copy: bool,
    pub save_edit: bool,
    pub regenerate: bool,
    pub select_image: bool,
    pub publish: bool,
}

/// What a social-media post preview renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SocialPreview {
    pub product: Option<String>,
    pub copy_text: String,
    pub image_url: Option<String>,
}

// ---------------------------------------------------------------------------
// WorkflowState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkflowState {
    stage: WorkflowStage,
    product: Option<String>,
    image: Option<UploadedImage>,
    candidates: Vec<CopyCandidate>,
    selected_copy_id: Option<CopyId>,
    results: Vec<GeneratedImage>,
    selected_image_id: Option<ImageId>,
    notice: Option<Notice>,
    editor: Option<EditSession>,
    copy_progress_visible: bool,
    image_progress_visible: bool,
    attempt: AttemptId,
    #[serde(skip)]
    last_notice_id: NoticeId,
}

impl WorkflowState {
    pub fn new() -> Self {
        Self::default()
    }

    // -- accessors --

    pub fn stage(&self) -> WorkflowStage {
        self.stage
    }

    pub fn product(&self) -> Option<&str> {
        self.product.as_deref()
    }

    pub fn image(&self) -> Option<&UploadedImage> {
        self.image.as_ref()
    }

    pub fn candidates(&self) -> &[CopyCandidate] {
        &self.candidates
    }

    pub fn candidate(&self, id: &str) -> Option<&CopyCandidate> {
        self.candidates.iter().find(|c| c.id == id)
    }

    pub fn selected_copy_id(&self) -> Option<&str> {
        self.selected_copy_id.as_deref()
    }

    pub fn selected_copy(&self) -> Option<&CopyCandidate> {
        self.selected_copy_id.as_deref().and_then(|id| self.candidate(id))
    }

    pub fn results(&self) -> &[GeneratedImage] {
        &self.results
    }

    pub fn selected_image_id(&self) -> Option<&str> {
        self.selected_image_id.as_deref()
    }

    /// URL of the selected image, falling back to the first result.
    pub fn selected_image_url(&self) -> Option<&str> {
        self.selected_image_id
            .as_deref()
            .and_then(|id| self.results.iter().find(|r| r.id == id))
            .or_else(|| self.results.first())
            .map(|r| r.url.as_str())
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn editor(&self) -> Option<&EditSession> {
        self.editor.as_ref()
    }

    pub fn is_progress_visible(&self, slot: ProgressSlot) -> bool {
        match slot {
            ProgressSlot::Copy => self.copy_progress_visible,
            ProgressSlot::Image => self.image_progress_visible,
        }
    }

    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    /// Whether a completion for `attempt` would still be applied.
    pub fn is_current(&self, attempt: AttemptId) -> bool {
        attempt == self.attempt && self.stage.is_generating()
    }

    pub fn controls(&self) -> Controls {
        let idle_with_candidates = matches!(self.stage, WorkflowStage::CopyReady | WorkflowStage::Done);
        Controls {
            generate_copy: self.image.is_some()
                && self.product.is_some()
                && !self.stage.is_generating(),
            select_copy: idle_with_candidates,
            edit_copy: idle_with_candidates,
            save_edit: idle_with_candidates
                && self
                    .editor
                    .as_ref()
                    .is_some_and(|e| !e.draft.trim().is_empty()),
            regenerate: self.stage == WorkflowStage::Done && self.selected_copy_id.is_some(),
            select_image: !self.results.is_empty(),
            publish: self.selected_image_id.is_some()
                && self.stage != WorkflowStage::ImageGenerating,
        }
    }

    pub fn preview(&self) -> SocialPreview {
        SocialPreview {
            product: self.product.clone(),
            copy_text: self
                .selected_copy()
                .map(|c| c.effective_text().to_string())
                .unwrap_or_default(),
            image_url: self.selected_image_url().map(str::to_string),
        }
    }

    // -- reducer --

    /// Apply one event.
    ///
    /// User actions that are not available in the current stage return
    /// [`CoreError::Conflict`] and leave the state untouched.  Missing
    /// inputs for copy generation return [`CoreError::Validation`] after
    /// recording a transient notice.  Stale completions return no effects.
    pub fn apply(&mut self, event: WorkflowEvent) -> Result<Vec<Effect>, CoreError> {
        match event {
            WorkflowEvent::SelectProduct(product) => {
                let product = product.trim();
                self.product = (!product.is_empty()).then(|| product.to_string());
                Ok(self.reset_derived("product changed"))
            }
            WorkflowEvent::StageImage(image) => {
                self.image = Some(image);
                Ok(self.reset_derived("image staged"))
            }
            WorkflowEvent::ClearImage => {
                self.image = None;
                Ok(self.reset_derived("image cleared"))
            }
            WorkflowEvent::RequestCopies => self.request_copies(),
            WorkflowEvent::CopiesGenerated { attempt, candidates } => {
                Ok(self.copies_generated(attempt, candidates))
            }
            WorkflowEvent::CopiesFailed { attempt, message } => {
                Ok(self.copies_failed(attempt, message))
            }
            WorkflowEvent::SelectCopy(copy_id) => self.select_copy(copy_id),
            WorkflowEvent::Regenerate => {
                if self.stage != WorkflowStage::Done {
                    return Err(self.unavailable("regenerate"));
                }
                let copy_id = self
                    .selected_copy_id
                    .clone()
                    .ok_or_else(|| CoreError::Conflict("No copy style selected".to_string()))?;
                self.select_copy(copy_id)
            }
            WorkflowEvent::ImageGenerated { attempt, image } => {
                Ok(self.image_generated(attempt, image))
            }
            WorkflowEvent::ImageFailed { attempt, message } => {
                Ok(self.image_failed(attempt, message))
            }
            WorkflowEvent::SelectImage(image_id) => {
                if !self.results.iter().any(|r| r.id == image_id) {
                    return Err(CoreError::Conflict(format!(
                        "Unknown generated image '{image_id}'"
                    )));
                }
                self.selected_image_id = Some(image_id);
                Ok(Vec::new())
            }
            WorkflowEvent::OpenEditor(copy_id) => self.open_editor(copy_id),
            WorkflowEvent::UpdateDraft(text) => {
                let editor = self
                    .editor
                    .as_mut()
                    .ok_or_else(|| CoreError::Conflict("No copy is being edited".to_string()))?;
                editor.draft = text;
                Ok(Vec::new())
            }
            WorkflowEvent::SaveEdit => self.save_edit(),
            WorkflowEvent::CancelEdit => {
                self.editor = None;
                Ok(Vec::new())
            }
            WorkflowEvent::DismissNotice(id) => {
                if self.notice.as_ref().is_some_and(|n| n.id == id) {
                    self.notice = None;
                }
                Ok(Vec::new())
            }
        }
    }

    // -- transitions --

    fn reset_derived(&mut self, reason: &'static str) -> Vec<Effect> {
        self.stage = WorkflowStage::WaitingInput;
        self.candidates.clear();
        self.selected_copy_id = None;
        self.results.clear();
        self.selected_image_id = None;
        self.notice = None;
        self.editor = None;
        self.copy_progress_visible = false;
        self.image_progress_visible = false;
        self.attempt = self.attempt.next();

        tracing::debug!(attempt = %self.attempt, reason, "Workflow reset");

        vec![
            Effect::ResetProgress(ProgressSlot::Copy),
            Effect::ResetProgress(ProgressSlot::Image),
        ]
    }

    fn request_copies(&mut self) -> Result<Vec<Effect>, CoreError> {
        if self.stage.is_generating() {
            return Err(self.unavailable("generate copy"));
        }
        if self.image.is_none() {
            return Err(self.reject(MSG_IMAGE_REQUIRED));
        }
        let Some(product) = self.product.clone() else {
            return Err(self.reject(MSG_PRODUCT_REQUIRED));
        };

        self.stage = WorkflowStage::CopyGenerating;
        self.candidates.clear();
        self.selected_copy_id = None;
        self.results.clear();
        self.selected_image_id = None;
        self.notice = None;
        self.editor = None;
        self.copy_progress_visible = true;
        self.image_progress_visible = false;
        self.attempt = self.attempt.next();

        tracing::info!(attempt = %self.attempt, product = %product, "Copy generation started");

        Ok(vec![
            Effect::ResetProgress(ProgressSlot::Image),
            Effect::StartProgress(ProgressSlot::Copy),
            Effect::GenerateCopies {
                attempt: self.attempt,
                product,
            },
        ])
    }

    fn copies_generated(&mut self, attempt: AttemptId, candidates: Vec<CopyCandidate>) -> Vec<Effect> {
        if !self.expects(attempt, WorkflowStage::CopyGenerating) {
            return Vec::new();
        }
        if candidates.is_empty() {
            return self.copies_failed(attempt, MSG_EMPTY_BATCH.to_string());
        }

        tracing::info!(attempt = %attempt, count = candidates.len(), "Copy candidates ready");

        self.stage = WorkflowStage::CopyReady;
        self.candidates = candidates;
        self.copy_progress_visible = false;
        vec![Effect::FinishProgress(ProgressSlot::Copy)]
    }

    fn copies_failed(&mut self, attempt: AttemptId, message: String) -> Vec<Effect> {
        if !self.expects(attempt, WorkflowStage::CopyGenerating) {
            return Vec::new();
        }

        tracing::warn!(attempt = %attempt, error = %message, "Copy generation failed");

        self.stage = WorkflowStage::WaitingInput;
        self.copy_progress_visible = false;
        self.post_notice(NoticeKind::Generation, message);
        vec![Effect::ResetProgress(ProgressSlot::Copy)]
    }

    fn select_copy(&mut self, copy_id: CopyId) -> Result<Vec<Effect>, CoreError> {
        if !matches!(self.stage, WorkflowStage::CopyReady | WorkflowStage::Done) {
            return Err(self.unavailable("select a copy style"));
        }
        let candidate = self
            .candidate(&copy_id)
            .ok_or_else(|| CoreError::Conflict(format!("Unknown copy style '{copy_id}'")))?;
        let image = self
            .image
            .clone()
            .ok_or_else(|| CoreError::Internal("Candidates exist without an image".to_string()))?;

        let request = ImageRequest {
            image,
            copy_id: candidate.id.clone(),
            style_name: candidate.name.clone(),
            prompt: candidate.effective_text().to_string(),
        };

        self.stage = WorkflowStage::ImageGenerating;
        self.selected_copy_id = Some(copy_id);
        self.results.clear();
        self.selected_image_id = None;
        self.notice = None;
        self.editor = None;
        self.image_progress_visible = true;
        self.attempt = self.attempt.next();

        tracing::info!(
            attempt = %self.attempt,
            copy_id = %request.copy_id,
            "Image generation started",
        );

        Ok(vec![
            Effect::StartProgress(ProgressSlot::Image),
            Effect::GenerateImage {
                attempt: self.attempt,
                request,
            },
        ])
    }

    fn image_generated(&mut self, attempt: AttemptId, image: GeneratedImage) -> Vec<Effect> {
        if !self.expects(attempt, WorkflowStage::ImageGenerating) {
            return Vec::new();
        }

        tracing::info!(attempt = %attempt, image_id = %image.id, "Generated image ready");

        self.stage = WorkflowStage::Done;
        self.selected_image_id = Some(image.id.clone());
        self.results = vec![image];
        self.image_progress_visible = false;
        vec![Effect::FinishProgress(ProgressSlot::Image)]
    }

    fn image_failed(&mut self, attempt: AttemptId, message: String) -> Vec<Effect> {
        if !self.expects(attempt, WorkflowStage::ImageGenerating) {
            return Vec::new();
        }

        tracing::warn!(attempt = %attempt, error = %message, "Image generation failed");

        // Selection is kept so the same style can be retried.
        self.stage = WorkflowStage::CopyReady;
        self.image_progress_visible = false;
        self.post_notice(NoticeKind::Generation, message);
        vec![Effect::ResetProgress(ProgressSlot::Image)]
    }

    fn open_editor(&mut self, copy_id: CopyId) -> Result<Vec<Effect>, CoreError> {
        if !self.controls().edit_copy {
            return Err(self.unavailable("edit copy"));
        }
        let draft = self
            .candidate(&copy_id)
            .map(|c| c.effective_text().to_string())
            .ok_or_else(|| CoreError::Conflict(format!("Unknown copy style '{copy_id}'")))?;
        self.editor = Some(EditSession { copy_id, draft });
        Ok(Vec::new())
    }

    fn save_edit(&mut self) -> Result<Vec<Effect>, CoreError> {
        if !self.controls().edit_copy {
            return Err(self.unavailable("save copy"));
        }
        let Some(editor) = self.editor.as_ref() else {
            return Err(CoreError::Conflict("No copy is being edited".to_string()));
        };
        let text = editor.draft.trim();
        if text.is_empty() {
            return Err(CoreError::Validation(MSG_EMPTY_EDIT.to_string()));
        }
        let text = text.to_string();
        let copy_id = editor.copy_id.clone();

        let candidate = self
            .candidates
            .iter_mut()
            .find(|c| c.id == copy_id)
            .ok_or_else(|| CoreError::Conflict(format!("Unknown copy style '{copy_id}'")))?;
        candidate.edited_text = Some(text);
        self.editor = None;

        tracing::debug!(copy_id = %copy_id, "Copy edit saved");
        Ok(Vec::new())
    }

    // -- helpers --

    fn expects(&self, attempt: AttemptId, stage: WorkflowStage) -> bool {
        let current = attempt == self.attempt && self.stage == stage;
        if !current {
            tracing::debug!(
                attempt = %attempt,
                current_attempt = %self.attempt,
                stage = %self.stage,
                "Ignoring stale generation response",
            );
        }
        current
    }

    fn post_notice(&mut self, kind: NoticeKind, message: String) -> NoticeId {
        self.last_notice_id += 1;
        self.notice = Some(Notice {
            id: self.last_notice_id,
            kind,
            message,
        });
        self.last_notice_id
    }

    /// Record a transient validation notice and build the matching error.
    fn reject(&mut self, message: &str) -> CoreError {
        self.post_notice(NoticeKind::Validation, message.to_string());
        CoreError::Validation(message.to_string())
    }

    fn unavailable(&self, action: &str) -> CoreError {
        CoreError::Conflict(format!("Cannot {action} while {}", self.stage))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
