//! Probe command - check the image proxy endpoint

use crate::cli::args::{OutputFormat, ProbeArgs};
use crate::config::Config;
use crate::error::ImgCacheResult;
use crate::fetch::proxy;
use crate::fetch::UreqTransport;
use crate::source::SourceResolver;
use crate::ui::{self, TaskSpinner, UiContext};

/// Execute the probe command
pub async fn execute(args: ProbeArgs, config: &Config) -> ImgCacheResult<()> {
    let ctx = UiContext::detect();
    let resolver = SourceResolver::new(config.sources.clone());
    let endpoint = resolver.proxy_url(args.query.as_deref());
    let transport = UreqTransport::new(&config.fetch);

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Probing {}", endpoint));

    let report = match proxy::probe(&transport, &endpoint).await {
        Ok(report) => report,
        Err(e) => {
            spinner.stop_error("Image proxy did not answer with an image URL");
            return Err(e);
        }
    };
    spinner.stop("Image proxy is answering");

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Plain => println!("{}", report.image_url),
        OutputFormat::Table => {
            ui::key_value(&ctx, "Endpoint", &report.endpoint);
            ui::key_value(&ctx, "Image", &report.image_url);
            if let Some(attribution) = &report.attribution {
                ui::key_value(
                    &ctx,
                    "Source",
                    attribution.source.as_deref().unwrap_or("unknown"),
                );
            }
            ui::key_value(
                &ctx,
                "Elapsed",
                &format!("{} ms", report.elapsed.as_millis()),
            );
        }
    }

    Ok(())
}
