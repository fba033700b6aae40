use std::path::Path;

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use carnage_lib::Overrides;
use carnage_render::{ChromiumRenderer, RenderConfig, Renderer};
use carnage_report::parse_report_file;

use crate::CliError;
use crate::spinner::spinner;

use super::{load_settings, runtime};

pub(crate) fn run_render(config: Option<&Path>, file: &Path, out: &Path, verbose: bool) -> Result<(), CliError> {
    let settings = load_settings(config, &Overrides::default())?;
    let record = parse_report_file(file)?;
    let renderer = ChromiumRenderer::new(RenderConfig {
        browser: settings.render.browser.clone(),
        sandbox_root: settings.render.sandbox_root.clone(),
        timeout: settings.render.timeout,
        width: settings.render.width,
        height: settings.render.height,
    })?;

    let rt = runtime()?;
    let pb = spinner(format!("Rendering match {} on {}", record.match_id, record.map_name), verbose);
    let result = rt.block_on(renderer.render(&record));
    pb.finish_and_clear();
    let image = result?;

    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(out, &image.png)?;
    log::info!(
        "Wrote {} ({}x{}, {} bytes)",
        out.display().if_supports_color(Stdout, |t| t.cyan()),
        image.width,
        image.height,
        image.png.len()
    );
    Ok(())
}
