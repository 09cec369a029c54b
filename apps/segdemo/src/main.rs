use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    load_settings, DemoState, DemoStore, HttpTransport, SegmentationApi, Settings,
    UploadedFile,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Terminal client for the Mask2Former segmentation demo backend")]
struct Cli {
    /// Backend base URL; overrides API_BASE and segdemo.toml.
    #[arg(long)]
    api_base: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the backend is alive.
    Health,
    /// List the available models and test images.
    Catalog,
    /// Run inference and print the result.
    Predict {
        /// Catalog image to segment. Defaults to the first catalog entry.
        #[arg(long, conflicts_with = "file")]
        image_id: Option<String>,
        /// Local image to upload instead of a catalog image.
        #[arg(long)]
        file: Option<PathBuf>,
        /// Also request a natural-language description of the result.
        #[arg(long)]
        describe: bool,
        /// Highlight the mask of this class label.
        #[arg(long)]
        mask: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings();
    if let Some(api_base) = cli.api_base {
        settings = Settings {
            api_base: Settings::with_api_base(api_base).api_base,
            ..settings
        };
    }
    let transport = Arc::new(HttpTransport::new(&settings)?);

    match cli.command {
        Command::Health => {
            let health = transport.health().await?;
            println!("{} is {}", transport.api_base(), health.status);
        }
        Command::Catalog => {
            let store = DemoStore::bootstrap(transport.clone(), settings.overlap_policy)
                .await
                .context("bootstrap failed")?;
            print_catalog(&store.snapshot(), &transport);
        }
        Command::Predict {
            image_id,
            file,
            describe,
            mask,
        } => {
            let store = DemoStore::bootstrap(transport.clone(), settings.overlap_policy)
                .await
                .context("bootstrap failed")?;

            if let Some(path) = file {
                let upload = UploadedFile::from_path(&path)
                    .await
                    .with_context(|| format!("failed to read {}", path.display()))?;
                store.choose_uploaded_file(Some(upload));
            } else if let Some(image_id) = image_id {
                store.choose_catalog_image(image_id);
            }

            if let Some(name) = store.snapshot().input_display_name() {
                println!("Input: {name}");
            }
            store.predict_selected().await?;

            if let Some(label) = mask {
                let state = store.snapshot();
                let mask_url = state
                    .result
                    .as_ref()
                    .and_then(|result| result.mask_by_label(&label))
                    .map(|mask| mask.mask_url.clone())
                    .ok_or_else(|| anyhow!("no mask for class '{label}' in this result"))?;
                store.select_mask(&mask_url)?;
            }

            if describe {
                store.generate_description().await?;
            }

            print_report(&store.snapshot(), &transport);
        }
    }

    Ok(())
}

fn print_catalog(state: &DemoState, transport: &HttpTransport) {
    println!("Models:");
    for model in state.models() {
        println!(
            "  {} ({}, {}) {}",
            model.model_key, model.hf_id, model.label_space, model.note
        );
    }

    println!("Test images:");
    if state.test_images().is_empty() {
        println!("  (none; place images in the backend's static/test_images directory)");
    }
    for image in state.test_images() {
        let marker = if state.selected_image().map(|selected| &selected.id) == Some(&image.id) {
            "*"
        } else {
            " "
        };
        println!(
            " {marker} {:<20} {:<24} [{}] {}",
            image.id,
            image.name,
            image.tags.join(", "),
            transport.resolve_asset_url(&image.thumbnail_url)
        );
    }
}

fn print_report(state: &DemoState, transport: &HttpTransport) {
    let Some(result) = state.result.as_ref() else {
        println!("No result.");
        return;
    };

    println!(
        "Model: {} ({})",
        result.model_hf_id,
        state
            .selected_model()
            .map(|model| model.label_space.as_str())
            .unwrap_or("-")
    );
    println!("Inference time: {} ms", result.inference_ms);
    println!("Image size: {}x{}", result.width, result.height);
    println!("Original: {}", transport.resolve_asset_url(&result.original_url));
    println!("Overlay:  {}", transport.resolve_asset_url(&result.overlay_url));

    println!("Top classes:");
    for row in &result.top_classes {
        println!("  {:<24} {:>5.1}%", row.label, row.confidence_percent());
    }

    println!("Area ratio:");
    for row in &result.area_stats {
        println!("  {:<24} {:>5.1}%", row.label, row.area_ratio);
    }

    println!("Class masks:");
    for mask in &result.class_masks {
        let marker = if state.selected_mask_url.as_deref() == Some(mask.mask_url.as_str()) {
            "*"
        } else {
            " "
        };
        println!(
            " {marker} {:<24} {}",
            mask.label,
            transport.resolve_asset_url(&mask.mask_url)
        );
    }

    if let Some(description) = state.description.as_ref() {
        println!("Description:");
        println!("  {}", description.summary_ja);
        for line in &description.highlights {
            println!("  + {line}");
        }
        for line in &description.cautions {
            println!("  ! {line}");
        }
    }
}
