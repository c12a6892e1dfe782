//! `brewpost-studio` -- runs the content workflow end to end.
//!
//! ```text
//! brewpost-studio <image-path> <product> [style-id]
//! ```
//!
//! Stages the photo, generates copy for the product, picks the style
//! (default `literary`), waits for the generated image and logs its URL.
//! Configuration comes from the environment (see
//! [`StudioConfig::from_env`]); a `.env` file is honoured.
//!
//! | Variable     | Default | Description                          |
//! |--------------|---------|--------------------------------------|
//! | `RUST_LOG`   | `brewpost_studio=info,brewpost_client=info` | Log filter |
//! | `LOG_FORMAT` | `text`  | `json` for one JSON object per line  |

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use brewpost_client::copywriter::TemplateCopywriter;
use brewpost_client::generation::GenerationApi;
use brewpost_client::renderer::LocalRenderer;
use brewpost_client::weather::WeatherApi;
use brewpost_core::copy::STYLE_LITERARY;
use brewpost_core::generator::ImageGenerator;
use brewpost_core::progress::ProgressPhase;
use brewpost_core::upload::mime_from_file_name;
use brewpost_core::workflow::{ProgressSlot, WorkflowStage, WorkflowState};
use brewpost_studio::config::StudioConfig;
use brewpost_studio::controller::ContentController;

const USAGE: &str = "usage: brewpost-studio <image-path> <product> [style-id]";

/// Characters of a `data:` URI kept in log output.
const DATA_URI_PREVIEW_CHARS: usize = 48;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (image_path, product, style) = match args.as_slice() {
        [path, product] => (path.as_str(), product.as_str(), STYLE_LITERARY),
        [path, product, style] => (path.as_str(), product.as_str(), style.as_str()),
        _ => bail!(USAGE),
    };

    let config = StudioConfig::from_env().context("Invalid configuration")?;
    tracing::info!(
        api_url = %config.generation_api_url,
        local_renderer = config.use_local_renderer,
        send_prompt = config.send_prompt,
        "Starting brewpost-studio",
    );

    if let Some(weather) = config.weather_api() {
        if config.weather_access_token.is_none() {
            tracing::warn!("WEATHER_ACCESS_TOKEN unset, weather lookup is unauthenticated");
        }
        log_weather(weather).await;
    }

    let image_generator: Arc<dyn ImageGenerator> = if config.use_local_renderer {
        Arc::new(LocalRenderer::new())
    } else {
        let http = reqwest::Client::builder()
            .timeout(config.generation_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Arc::new(
            GenerationApi::with_client(http, config.generation_api_url.clone())
                .with_prompt(config.send_prompt),
        )
    };
    let copy_generator = Arc::new(TemplateCopywriter::new(config.copy_latency));
    let controller = ContentController::new(copy_generator, image_generator, &config);

    let result = run(&controller, image_path, product, style).await;
    controller.shutdown().await;
    result
}

async fn run(
    controller: &ContentController,
    image_path: &str,
    product: &str,
    style: &str,
) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(image_path)
        .await
        .with_context(|| format!("Failed to read {image_path}"))?;
    let file_name = Path::new(image_path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| image_path.to_string());

    let image = controller
        .upload_image(&file_name, mime_from_file_name(&file_name), bytes)
        .await
        .context("Photo rejected")?;
    tracing::info!(
        width = image.width,
        height = image.height,
        byte_size = image.byte_size,
        low_resolution = image.quality.low_resolution,
        oversized = image.quality.oversized,
        "Photo staged",
    );

    controller.select_product(product).await?;
    let mut states = controller.subscribe();

    tokio::spawn(log_progress(controller.clone(), ProgressSlot::Copy));
    controller.generate_copies().await?;
    let state = wait_while(&mut states, WorkflowStage::CopyGenerating).await?;
    if state.stage() != WorkflowStage::CopyReady {
        bail!("Copy generation failed: {}", notice_text(&state));
    }
    for candidate in state.candidates() {
        tracing::info!(
            copy_id = %candidate.id,
            name = %candidate.name,
            icon = %candidate.icon,
            "Copy candidate",
        );
    }

    tokio::spawn(log_progress(controller.clone(), ProgressSlot::Image));
    controller
        .select_copy(style)
        .await
        .with_context(|| format!("Cannot select copy style '{style}'"))?;
    let state = wait_while(&mut states, WorkflowStage::ImageGenerating).await?;
    if state.stage() != WorkflowStage::Done {
        bail!("Image generation failed: {}", notice_text(&state));
    }

    let preview = controller.snapshot().await.preview;
    tracing::info!(
        product = preview.product.as_deref().unwrap_or_default(),
        image = %preview.image_url.as_deref().map(shorten_url).unwrap_or_default(),
        copy = %preview.copy_text,
        "Post ready",
    );
    Ok(())
}

/// Wait until the workflow leaves `stage` and return the new state.
async fn wait_while(
    states: &mut tokio::sync::watch::Receiver<WorkflowState>,
    stage: WorkflowStage,
) -> anyhow::Result<WorkflowState> {
    let state = states
        .wait_for(|s| s.stage() != stage)
        .await
        .context("Controller stopped")?;
    Ok(state.clone())
}

fn notice_text(state: &WorkflowState) -> &str {
    state
        .notice()
        .map(|n| n.message.as_str())
        .unwrap_or("unknown error")
}

/// Log each tenth of progress until the timer stops running.
async fn log_progress(controller: ContentController, slot: ProgressSlot) {
    let mut rx = controller.progress(slot);
    let mut last_decile = None;

    while rx.changed().await.is_ok() {
        let state = *rx.borrow_and_update();
        if state.phase != ProgressPhase::Running {
            if state.phase == ProgressPhase::Done {
                tracing::info!(slot = ?slot, percent = 100, "Progress complete");
            }
            if last_decile.is_some() {
                break;
            }
            continue;
        }
        let decile = (state.percent / 10.0).floor() as u8;
        if last_decile != Some(decile) {
            last_decile = Some(decile);
            tracing::info!(slot = ?slot, percent = decile * 10, "Progress");
        }
    }
}

async fn log_weather(api: WeatherApi) {
    match api.forecast().await {
        Ok(report) => {
            for day in &report.data {
                tracing::info!(
                    city = %report.city,
                    date = %day.date,
                    max_temp = day.max_temp,
                    condition = %day.condition,
                    rain_prob = day.rain_prob,
                    "Forecast",
                );
            }
        }
        Err(e) => tracing::warn!(error = %e, "Weather lookup failed"),
    }
}

/// `data:` URIs are cut down to a short prefix plus their length.
fn shorten_url(url: &str) -> String {
    if url.starts_with("data:") && url.len() > DATA_URI_PREVIEW_CHARS {
        let head: String = url.chars().take(DATA_URI_PREVIEW_CHARS).collect();
        format!("{head}… ({} bytes)", url.len())
    } else {
        url.to_string()
    }
}

fn init_tracing() {
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "brewpost_studio=info,brewpost_client=info".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}
