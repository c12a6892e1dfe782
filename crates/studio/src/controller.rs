//! Async runtime for the content workflow.
//!
//! [`ContentController`] owns the [`WorkflowState`], the two progress
//! timers and the generator capabilities.  User actions are applied to
//! the reducer under a single lock; the returned effects are executed
//! in order (timer changes inline, generation calls as spawned tasks).
//! Generation tasks feed their outcome back as completion events tagged
//! with the attempt they belong to.
//!
//! Successful completions are staged: the timer jumps to 100 first and
//! the result is applied after a short reveal delay, so the bar visibly
//! completes before content appears.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;

use brewpost_core::error::CoreError;
use brewpost_core::generator::{CopyGenerator, ImageGenerator, ImageRequest};
use brewpost_core::progress::{ProgressState, ProgressView};
use brewpost_core::types::{AttemptId, NoticeId};
use brewpost_core::upload::{inspect_upload, UploadedImage};
use brewpost_core::workflow::{
    Controls, Effect, NoticeKind, ProgressSlot, SocialPreview, WorkflowEvent, WorkflowStage,
    WorkflowState,
};

use crate::config::StudioConfig;
use crate::timer::ProgressTimer;

/// Spawned generation tasks feed back into [`Inner::dispatch`]; boxing
/// them keeps the future types non-recursive.
type TaskFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Delays applied by the controller around completions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerTiming {
    /// Between the copy timer reaching 100 and the candidates appearing.
    pub copy_reveal_delay: Duration,
    /// Between the image timer reaching 100 and the result appearing.
    pub image_settle_delay: Duration,
    /// Lifetime of a validation notice.
    pub notice_dismiss: Duration,
}

impl From<&StudioConfig> for ControllerTiming {
    fn from(config: &StudioConfig) -> Self {
        Self {
            copy_reveal_delay: config.copy_reveal_delay,
            image_settle_delay: config.image_settle_delay,
            notice_dismiss: config.notice_dismiss,
        }
    }
}

/// Everything a presentation layer needs to draw the studio.
#[derive(Debug, Clone, Serialize)]
pub struct StudioSnapshot {
    pub stage: WorkflowStage,
    pub workflow: WorkflowState,
    pub controls: Controls,
    pub preview: SocialPreview,
    /// Present while the copy-stage indicator is shown.
    pub copy_progress: Option<ProgressView>,
    /// Present while the image-stage indicator is shown.
    pub image_progress: Option<ProgressView>,
}

/// Handle to the workflow runtime.  Cheap to clone.
#[derive(Clone)]
pub struct ContentController {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<WorkflowState>,
    state_tx: watch::Sender<WorkflowState>,
    copy_timer: ProgressTimer,
    image_timer: ProgressTimer,
    copy_generator: Arc<dyn CopyGenerator>,
    image_generator: Arc<dyn ImageGenerator>,
    timing: ControllerTiming,
    /// Master token, cancelled on shutdown.
    cancel: CancellationToken,
}

impl ContentController {
    pub fn new(
        copy_generator: Arc<dyn CopyGenerator>,
        image_generator: Arc<dyn ImageGenerator>,
        config: &StudioConfig,
    ) -> Self {
        let cancel = CancellationToken::new();
        let (state_tx, _) = watch::channel(WorkflowState::new());

        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(WorkflowState::new()),
                state_tx,
                copy_timer: ProgressTimer::new(ProgressSlot::Copy, config.copy_progress(), &cancel),
                image_timer: ProgressTimer::new(
                    ProgressSlot::Image,
                    config.image_progress(),
                    &cancel,
                ),
                copy_generator,
                image_generator,
                timing: ControllerTiming::from(config),
                cancel,
            }),
        }
    }

    // -- observation --

    /// Receive every committed workflow state.
    pub fn subscribe(&self) -> watch::Receiver<WorkflowState> {
        self.inner.state_tx.subscribe()
    }

    /// Receive every published value of one progress timer.
    pub fn progress(&self, slot: ProgressSlot) -> watch::Receiver<ProgressState> {
        self.inner.timer(slot).subscribe()
    }

    pub async fn state(&self) -> WorkflowState {
        self.inner.state.lock().await.clone()
    }

    pub async fn snapshot(&self) -> StudioSnapshot {
        let state = self.state().await;
        self.inner.snapshot_of(state)
    }

    // -- inputs --

    pub async fn select_product(&self, product: impl Into<String>) -> Result<(), CoreError> {
        self.inner
            .dispatch(WorkflowEvent::SelectProduct(product.into()))
            .await
    }

    /// Validate and stage a product photo.
    ///
    /// Undecodable or non-image input is refused without touching the
    /// workflow.
    pub async fn upload_image(
        &self,
        file_name: &str,
        mime: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadedImage, CoreError> {
        let image = inspect_upload(file_name, mime, bytes).map_err(|e| {
            tracing::warn!(file_name, error = %e, "Upload refused");
            e
        })?;
        self.inner
            .dispatch(WorkflowEvent::StageImage(image.clone()))
            .await?;
        Ok(image)
    }

    pub async fn clear_image(&self) -> Result<(), CoreError> {
        self.inner.dispatch(WorkflowEvent::ClearImage).await
    }

    // -- generation --

    pub async fn generate_copies(&self) -> Result<(), CoreError> {
        self.inner.dispatch(WorkflowEvent::RequestCopies).await
    }

    pub async fn select_copy(&self, copy_id: impl Into<String>) -> Result<(), CoreError> {
        self.inner
            .dispatch(WorkflowEvent::SelectCopy(copy_id.into()))
            .await
    }

    /// Generate a fresh image for the already selected copy style.
    pub async fn regenerate(&self) -> Result<(), CoreError> {
        self.inner.dispatch(WorkflowEvent::Regenerate).await
    }

    pub async fn select_image(&self, image_id: impl Into<String>) -> Result<(), CoreError> {
        self.inner
            .dispatch(WorkflowEvent::SelectImage(image_id.into()))
            .await
    }

    // -- editing --

    pub async fn open_editor(&self, copy_id: impl Into<String>) -> Result<(), CoreError> {
        self.inner
            .dispatch(WorkflowEvent::OpenEditor(copy_id.into()))
            .await
    }

    pub async fn update_draft(&self, text: impl Into<String>) -> Result<(), CoreError> {
        self.inner
            .dispatch(WorkflowEvent::UpdateDraft(text.into()))
            .await
    }

    pub async fn save_edit(&self) -> Result<(), CoreError> {
        self.inner.dispatch(WorkflowEvent::SaveEdit).await
    }

    pub async fn cancel_edit(&self) -> Result<(), CoreError> {
        self.inner.dispatch(WorkflowEvent::CancelEdit).await
    }

    pub async fn dismiss_notice(&self, id: NoticeId) -> Result<(), CoreError> {
        self.inner.dispatch(WorkflowEvent::DismissNotice(id)).await
    }

    /// Cancel in-flight work and stop both timers.
    ///
    /// Pending completions are dropped; the state is left as it was.
    pub async fn shutdown(&self) {
        tracing::info!("Content controller shutting down");
        self.inner.cancel.cancel();
        self.inner.copy_timer.shutdown().await;
        self.inner.image_timer.shutdown().await;
    }
}

impl Inner {
    fn timer(&self, slot: ProgressSlot) -> &ProgressTimer {
        match slot {
            ProgressSlot::Copy => &self.copy_timer,
            ProgressSlot::Image => &self.image_timer,
        }
    }

    fn snapshot_of(&self, workflow: WorkflowState) -> StudioSnapshot {
        let copy_progress = workflow
            .is_progress_visible(ProgressSlot::Copy)
            .then(|| self.copy_timer.view(None));
        let image_label = workflow
            .selected_copy()
            .map(|c| format!("Applying \"{}\"…", c.name));
        let image_progress = workflow
            .is_progress_visible(ProgressSlot::Image)
            .then(|| self.image_timer.view(image_label.as_deref()));

        StudioSnapshot {
            stage: workflow.stage(),
            controls: workflow.controls(),
            preview: workflow.preview(),
            copy_progress,
            image_progress,
            workflow,
        }
    }

    /// Apply one event and run its effects while holding the state lock.
    async fn dispatch(self: &Arc<Self>, event: WorkflowEvent) -> Result<(), CoreError> {
        let mut state = self.state.lock().await;
        let outcome = state.apply(event);
        self.state_tx.send_replace(state.clone());

        match outcome {
            Ok(effects) => {
                self.execute(effects).await;
                Ok(())
            }
            Err(e) => {
                if let (CoreError::Validation(_), Some(notice)) = (&e, state.notice()) {
                    if notice.kind == NoticeKind::Validation {
                        self.schedule_dismiss(notice.id);
                    }
                }
                tracing::debug!(stage = %state.stage(), error = %e, "Workflow event rejected");
                Err(e)
            }
        }
    }

    async fn execute(self: &Arc<Self>, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::StartProgress(slot) => self.timer(slot).start().await,
                Effect::FinishProgress(slot) => self.timer(slot).finish().await,
                Effect::ResetProgress(slot) => self.timer(slot).reset().await,
                Effect::GenerateCopies { attempt, product } => {
                    tokio::spawn(Arc::clone(self).run_copy_generation(attempt, product));
                }
                Effect::GenerateImage { attempt, request } => {
                    tokio::spawn(Arc::clone(self).run_image_generation(attempt, request));
                }
            }
        }
    }

    fn run_copy_generation(self: Arc<Self>, attempt: AttemptId, product: String) -> TaskFuture {
        Box::pin(async move { self.copy_generation(attempt, product).await })
    }

    fn run_image_generation(self: Arc<Self>, attempt: AttemptId, request: ImageRequest) -> TaskFuture {
        Box::pin(async move { self.image_generation(attempt, request).await })
    }

    async fn copy_generation(self: &Arc<Self>, attempt: AttemptId, product: String) {
        tracing::info!(attempt = %attempt, product = %product, "Requesting copy candidates");

        let result = tokio::select! {
            _ = self.cancel.cancelled() => return,
            r = self.copy_generator.generate_copies(&product) => r,
        };

        let event = match result {
            Ok(candidates) => {
                if !self.finish_if_current(attempt, ProgressSlot::Copy).await {
                    return;
                }
                if !self.pause(self.timing.copy_reveal_delay).await {
                    return;
                }
                WorkflowEvent::CopiesGenerated { attempt, candidates }
            }
            Err(e) => WorkflowEvent::CopiesFailed {
                attempt,
                message: e.user_message().to_string(),
            },
        };
        self.complete(event).await;
    }

    async fn image_generation(self: &Arc<Self>, attempt: AttemptId, request: ImageRequest) {
        tracing::info!(
            attempt = %attempt,
            copy_id = %request.copy_id,
            "Requesting generated image",
        );

        let result = tokio::select! {
            _ = self.cancel.cancelled() => return,
            r = self.image_generator.generate_image(&request) => r,
        };

        let event = match result {
            Ok(image) => {
                if !self.finish_if_current(attempt, ProgressSlot::Image).await {
                    return;
                }
                if !self.pause(self.timing.image_settle_delay).await {
                    return;
                }
                WorkflowEvent::ImageGenerated { attempt, image }
            }
            Err(e) => WorkflowEvent::ImageFailed {
                attempt,
                message: e.user_message().to_string(),
            },
        };
        self.complete(event).await;
    }

    /// Force the slot's timer to 100 unless `attempt` has been superseded.
    async fn finish_if_current(&self, attempt: AttemptId, slot: ProgressSlot) -> bool {
        let state = self.state.lock().await;
        if !state.is_current(attempt) {
            tracing::debug!(attempt = %attempt, current = %state.attempt(), "Dropping stale result");
            return false;
        }
        self.timer(slot).finish().await;
        true
    }

    /// Sleep for `delay`; `false` if cancelled first.
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    async fn complete(self: &Arc<Self>, event: WorkflowEvent) {
        if let Err(e) = self.dispatch(event).await {
            tracing::warn!(error = %e, "Completion event rejected");
        }
    }

    fn schedule_dismiss(self: &Arc<Self>, id: NoticeId) {
        let inner = Arc::clone(self);
        let task: TaskFuture = Box::pin(async move {
            if inner.pause(inner.timing.notice_dismiss).await {
                inner.complete(WorkflowEvent::DismissNotice(id)).await;
            }
        });
        tokio::spawn(task);
    }
}
