use std::io::Write;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use serde_json::json;

use vcs_history_tooltip::config::{load_config, ConfigOverrides, TooltipConfig};
use vcs_history_tooltip::diag::{dump_object_tree, JsonGraph};
use vcs_history_tooltip::loader::{HistorySource, HttpHistorySource, WindowKey};
use vcs_history_tooltip::logging;
use vcs_history_tooltip::manager::{Overlay, OverlayManager, Surface, Trigger};
use vcs_history_tooltip::placement::{place, Rect, Size, Viewport};
use vcs_history_tooltip::timestamp::{format_iso_timestamp, parse_iso_timestamp};

#[derive(Parser)]
#[command(version, about = "Revision history tooltips for test manager pages")]
struct Opts {
    /// TOML config file; missing files fall back to defaults.
    #[arg(long, env = "VCS_TOOLTIP_CONFIG")]
    config: Option<PathBuf>,
    /// Test manager root, e.g. https://tm.example.org/testmanager/
    #[arg(long)]
    base_url: Option<String>,
    #[arg(long)]
    window_size: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse ISO 8601 timestamps and print them in canonical UTC form.
    ParseTimestamp {
        #[arg(required = true)]
        timestamps: Vec<String>,
    },
    /// Fetch the window around a revision and print the overlay HTML.
    History { repository: String, revision: u64 },
    /// Compute where an overlay goes.
    Place {
        /// left,top,right,bottom of the trigger, viewport relative
        #[arg(long, value_parser = parse_rect)]
        anchor: Rect,
        /// width,height the overlay would like
        #[arg(long, value_parser = parse_size)]
        size: Size,
        /// scroll_left,scroll_top,width,height
        #[arg(long, value_parser = parse_viewport)]
        viewport: Viewport,
        /// Measured content size, to also print the fitted placement.
        #[arg(long, value_parser = parse_size)]
        content: Option<Size>,
    },
    /// Fetch the window around a revision and dump the response tree.
    Dump {
        repository: String,
        revision: u64,
        #[arg(long, default_value_t = 8)]
        max_depth: usize,
    },
}

fn parse_ints<const N: usize>(s: &str) -> Result<[i32; N], String> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<i32>().map_err(|e| format!("{:?}: {}", p, e)))
        .collect::<Result<Vec<_>, _>>()?;
    if parts.len() != N {
        return Err(format!("expected {} comma separated integers, got {}", N, parts.len()));
    }
    let mut out = [0; N];
    out.copy_from_slice(&parts);
    Ok(out)
}

fn parse_rect(s: &str) -> Result<Rect, String> {
    let [l, t, r, b] = parse_ints::<4>(s)?;
    Ok(Rect::new(l, t, r, b))
}

fn parse_size(s: &str) -> Result<Size, String> {
    let [w, h] = parse_ints::<2>(s)?;
    Ok(Size::new(w, h))
}

fn parse_viewport(s: &str) -> Result<Viewport, String> {
    let [scroll_left, scroll_top, width, height] = parse_ints::<4>(s)?;
    Ok(Viewport {
        scroll_left,
        scroll_top,
        width,
        height,
    })
}

/// Prints overlays to `out` (stdout outside of tests).  Sizes are a rough
/// monospace estimate since there's no layout engine behind us.
struct PrintSurface<W> {
    out: W,
    write_errors: usize,
}

impl<W: Write> PrintSurface<W> {
    fn new(out: W) -> Self {
        PrintSurface {
            out,
            write_errors: 0,
        }
    }
}

impl<W: Write> Surface for PrintSurface<W> {
    fn measure(&mut self, _key: &WindowKey, html: &str) -> Size {
        let widest = html.lines().map(|l| l.chars().count()).max().unwrap_or(0);
        Size::new((widest as i32 * 7).min(800), html.lines().count() as i32 * 18)
    }

    fn show(&mut self, overlay: &Overlay) {
        tracing::debug!(
            "{} at {},{} {}x{}, scroll to #{}",
            overlay.key,
            overlay.placement.x,
            overlay.placement.y,
            overlay.placement.width,
            overlay.placement.height,
            overlay.scroll_target()
        );
        if let Err(e) = writeln!(self.out, "{}", overlay.html).and_then(|_| self.out.flush()) {
            tracing::warn!("{}: failed to write overlay: {}", overlay.key, e);
            self.write_errors += 1;
        }
    }

    fn hide(&mut self, _key: &WindowKey) {}
}

fn http_source(config: &TooltipConfig) -> Result<HttpHistorySource> {
    let base_url = config.base_url()?;
    Ok(HttpHistorySource::new(base_url, config.request_timeout())?)
}

async fn history(config: &TooltipConfig, repository: String, revision: u64) -> Result<()> {
    let source = http_source(config)?;
    let mut manager = OverlayManager::new(
        PrintSurface::new(std::io::stdout()),
        Local,
        config.window_size,
        config.initial_size(),
    );
    let trigger = Trigger {
        repository,
        revision,
        anchor: Rect::new(0, 0, 60, 16),
        viewport: Viewport {
            scroll_left: 0,
            scroll_top: 0,
            width: 1280,
            height: 800,
        },
    };
    if let Some(req) = manager.show(&trigger) {
        let result = source
            .fetch(&req.key.repository, req.key.first_revision, req.count)
            .await;
        manager.complete(&req.key, result);
    }
    if manager.surface().write_errors > 0 {
        return Err(anyhow!("could not write the overlay to stdout"));
    }
    Ok(())
}

async fn dump(config: &TooltipConfig, repository: &str, revision: u64, max_depth: usize) -> Result<()> {
    let source = http_source(config)?;
    let key = WindowKey::for_revision(repository, revision, config.window_size);
    let response = source
        .fetch(&key.repository, key.first_revision, config.window_size)
        .await
        .with_context(|| format!("fetching {}", key))?;
    let value = serde_json::to_value(&response)?;
    let graph = JsonGraph::new(&value);
    print!("{}", dump_object_tree(&graph, graph.root(), &key.to_string(), max_depth));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let opts = Opts::parse();

    let config = load_config(ConfigOverrides {
        config_path: opts.config,
        base_url: opts.base_url,
        window_size: opts.window_size,
        ..ConfigOverrides::default()
    })?;

    match opts.command {
        Command::ParseTimestamp { timestamps } => {
            let mut failed = 0;
            for ts in &timestamps {
                match parse_iso_timestamp(ts) {
                    Ok(parsed) => println!("{}", format_iso_timestamp(&parsed)),
                    Err(e) => {
                        eprintln!("{}", e);
                        failed += 1;
                    }
                }
            }
            if failed > 0 {
                return Err(anyhow!("{} of {} timestamps failed to parse", failed, timestamps.len()));
            }
        }
        Command::History {
            repository,
            revision,
        } => history(&config, repository, revision).await?,
        Command::Place {
            anchor,
            size,
            viewport,
            content,
        } => {
            let placement = place(anchor, size, viewport);
            let fitted = content.map(|c| placement.fit_content(c));
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "placement": placement,
                    "fitted": fitted,
                }))?
            );
        }
        Command::Dump {
            repository,
            revision,
            max_depth,
        } => dump(&config, &repository, revision, max_depth).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vcs_history_tooltip::file_format::vcs_history::HistoryResponse;

    /// A stdout whose reader went away.
    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn show_empty_window<W: Write>(surface: PrintSurface<W>) -> PrintSurface<W> {
        let mut manager = OverlayManager::new(surface, Utc, 16, Size::new(480, 320));
        let trigger = Trigger {
            repository: "vbox".to_string(),
            revision: 3,
            anchor: Rect::new(0, 0, 60, 16),
            viewport: Viewport {
                scroll_left: 0,
                scroll_top: 0,
                width: 1280,
                height: 800,
            },
        };
        let req = manager.show(&trigger).unwrap();
        manager.complete(
            &req.key,
            Ok(HistoryResponse {
                commits: Vec::new(),
                changeset_url_format: String::new(),
            }),
        );
        manager.into_surface()
    }

    #[test]
    fn prints_overlay_html() {
        let surface = show_empty_window(PrintSurface::new(Vec::new()));
        assert_eq!(surface.write_errors, 0);
        let printed = String::from_utf8(surface.out).unwrap();
        assert!(printed.contains("No commits in this range."));
    }

    #[test]
    fn write_failures_are_counted() {
        let surface = show_empty_window(PrintSurface::new(BrokenPipe));
        assert_eq!(surface.write_errors, 1);
    }

    #[test]
    fn parses_comma_separated_geometry() {
        assert_eq!(parse_rect("1, 2,3,4").unwrap(), Rect::new(1, 2, 3, 4));
        assert!(parse_size("10").is_err());
        assert!(parse_viewport("0,0,x,1").is_err());
    }
}
