//! Flowchartify - a terminal flowchart.js editor with live preview.
//!
//! # Usage
//!
//! ```bash
//! flowchartify
//! flowchartify chart.flow
//! flowchartify --watch --output-dir exports chart.flow
//! flowchartify --print-style --theme dark
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

use flowchartify::app::App;
use flowchartify::config::{
    ConfigFlags, ThemeMode, clear_config_flags, global_config_path, load_config_flags,
    local_override_path, parse_flag_tokens, save_config_flags,
};
use flowchartify::highlight::{HighlightBackground, background, set_background_mode};
use flowchartify::perf;
use flowchartify::theme::{Palette, load_palette_file, style_config};

/// A terminal flowchart.js editor with live diagram preview and PNG export
#[derive(Parser, Debug)]
#[command(name = "flowchartify", version, about, long_about = None)]
struct Cli {
    /// Flowchart source to edit (created on first save if missing)
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Reload the source when it changes on disk
    #[arg(short, long)]
    watch: bool,

    /// Only render on Render/Clear, not while typing
    #[arg(long)]
    no_live: bool,

    /// Disable syntax highlighting and completion
    #[arg(long)]
    plain: bool,

    /// Summarize the diagram as text instead of drawing it
    #[arg(long)]
    no_images: bool,

    /// Force image rendering to use half-cell fallback mode
    #[arg(long)]
    force_half_cell: bool,

    /// Terminal background used for colors (light or dark)
    #[arg(long, value_enum, default_value = "auto")]
    theme: ThemeMode,

    /// CSS file of custom properties overriding palette colors
    #[arg(long, value_name = "PATH")]
    palette: Option<PathBuf>,

    /// Directory that receives flowchart.png
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Pixel scale applied to exported PNGs
    #[arg(long, value_name = "F")]
    export_scale: Option<f32>,

    /// Print the resolved style configuration as JSON and exit
    #[arg(long)]
    print_style: bool,

    /// Enable startup performance logging
    #[arg(long)]
    perf: bool,

    /// Write detailed render/image debug events to a file
    #[arg(long, value_name = "PATH")]
    render_debug_log: Option<PathBuf>,

    /// Save current command-line flags as defaults
    #[arg(long)]
    save: bool,

    /// Clear saved defaults
    #[arg(long)]
    clear: bool,
}

// Query the terminal background using OSC 11.
// We talk to /dev/tty so the terminal responds even when stdout is piped.
// Non-Unix platforms skip the query; a stray reader thread there would
// swallow console input meant for crossterm.
#[cfg(not(unix))]
fn query_terminal_background() -> std::io::Result<Option<(u8, u8, u8)>> {
    Ok(None)
}

#[cfg(unix)]
fn query_terminal_background() -> std::io::Result<Option<(u8, u8, u8)>> {
    use std::io::{Read, Write};
    use std::sync::mpsc;

    let mut tty = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open("/dev/tty")?;
    let mut reader = tty.try_clone()?;

    // ESC ] 11 ; ? BEL
    tty.write_all(b"\x1b]11;?\x07")?;
    tty.flush()?;

    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let mut buf = [0u8; 256];
        let mut reply = Vec::new();
        while let Ok(n) = reader.read(&mut buf) {
            if n == 0 {
                continue;
            }
            reply.extend_from_slice(&buf[..n]);
            if reply.contains(&b'\x07') || reply.windows(2).any(|w| w == b"\x1b\\") {
                let _ = tx.send(reply);
                break;
            }
        }
    });

    Ok(rx
        .recv_timeout(Duration::from_millis(75))
        .ok()
        .and_then(|reply| parse_osc11_reply(&String::from_utf8_lossy(&reply))))
}

fn theme_from_rgb(r: u8, g: u8, b: u8) -> HighlightBackground {
    let luma = 0.0722f32.mul_add(
        f32::from(b),
        0.2126f32.mul_add(f32::from(r), 0.7152 * f32::from(g)),
    );
    if luma >= 140.0 {
        HighlightBackground::Light
    } else {
        HighlightBackground::Dark
    }
}

fn detect_theme() -> Option<HighlightBackground> {
    let _raw = enable_raw_mode();
    let result = query_terminal_background();
    let _ = disable_raw_mode();
    result.ok().flatten().map(|(r, g, b)| theme_from_rgb(r, g, b))
}

fn parse_osc11_reply(reply: &str) -> Option<(u8, u8, u8)> {
    // ESC ] 11 ; rgb:RRRR/GGGG/BBBB, then BEL or ST
    let start = reply.find("rgb:")?;
    let mut parts = reply[start + 4..].split(['/', '\x07', '\x1b']);
    let r = parse_osc_component(parts.next()?)?;
    let g = parse_osc_component(parts.next()?)?;
    let b = parse_osc_component(parts.next()?)?;
    Some((r, g, b))
}

fn parse_osc_component(s: &str) -> Option<u8> {
    let hex = s.trim();
    if hex.len() >= 4 {
        let [high, _] = u16::from_str_radix(hex.get(..4)?, 16).ok()?.to_be_bytes();
        Some(high)
    } else if hex.len() == 2 {
        u8::from_str_radix(hex, 16).ok()
    } else {
        None
    }
}

/// Pin the highlight background. Auto probes the terminal unless `quiet`,
/// then falls back to `COLORFGBG`.
fn apply_theme(mode: ThemeMode, quiet: bool) {
    let forced = match mode {
        ThemeMode::Auto if quiet => None,
        ThemeMode::Auto => detect_theme(),
        ThemeMode::Light => Some(HighlightBackground::Light),
        ThemeMode::Dark => Some(HighlightBackground::Dark),
    };
    tracing::debug!(?mode, ?forced, "theme resolved");
    set_background_mode(forced);
}

fn resolve_palette(flags: &ConfigFlags) -> Result<Palette> {
    let base = Palette::for_background(background());
    match &flags.palette {
        Some(path) => load_palette_file(path, base),
        None => Ok(base),
    }
}

fn main() -> Result<()> {
    // Logs go to stderr; anything above warn needs RUST_LOG.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let raw_args = std::env::args().collect::<Vec<_>>();
    let cli = Cli::parse();
    let global_path = global_config_path();
    let local_path = local_override_path();
    let cli_flags = parse_flag_tokens(&raw_args);

    if cli.clear {
        clear_config_flags(&global_path)?;
    }
    if cli.save {
        save_config_flags(&global_path, &cli_flags)?;
    }

    let file_flags = if cli.clear {
        ConfigFlags::default()
    } else {
        let global_flags = load_config_flags(&global_path)?;
        let local_flags = load_config_flags(&local_path)?;
        global_flags.union(&local_flags)
    };
    let effective = file_flags.union(&cli_flags);

    perf::set_enabled(effective.perf);
    let render_debug_log_path = effective
        .render_debug_log
        .clone()
        .or_else(|| std::env::var_os("FLOWCHARTIFY_RENDER_DEBUG_LOG").map(PathBuf::from));
    if let Err(err) = perf::set_debug_log_path(render_debug_log_path.as_deref()) {
        tracing::warn!(
            %err,
            path = ?render_debug_log_path,
            "failed to initialize render debug log"
        );
    }

    apply_theme(
        effective.theme.unwrap_or(ThemeMode::Auto),
        cli.print_style,
    );
    let palette = resolve_palette(&effective)?;

    if cli.print_style {
        let json = serde_json::to_string_pretty(&style_config(&palette))
            .context("Failed to serialize style config")?;
        println!("{json}");
        return Ok(());
    }

    let mut app = App::new(cli.file)
        .with_watch(effective.watch)
        .with_live_render(!effective.no_live)
        .with_plain(effective.plain)
        .with_images_enabled(!effective.no_images)
        .with_force_half_cell(effective.force_half_cell)
        .with_palette(palette)
        .with_export_scale(effective.export_scale.unwrap_or(1.0))
        .with_config_paths(
            Some(global_path),
            local_path.exists().then_some(local_path),
        );
    if let Some(dir) = effective.output_dir {
        app = app.with_output_dir(dir);
    }

    app.run().context("Application error")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_osc11_reply_reads_16_bit_channels() {
        let reply = "\x1b]11;rgb:ffff/8080/0000\x07";
        assert_eq!(parse_osc11_reply(reply), Some((0xff, 0x80, 0x00)));
    }

    #[test]
    fn test_parse_osc11_reply_accepts_st_terminator() {
        let reply = "\x1b]11;rgb:1e/1e/2e\x1b\\";
        assert_eq!(parse_osc11_reply(reply), Some((0x1e, 0x1e, 0x2e)));
    }

    #[test]
    fn test_parse_osc11_reply_rejects_garbage() {
        assert_eq!(parse_osc11_reply("no color here"), None);
        assert_eq!(parse_osc11_reply("rgb:zz/00/00"), None);
    }

    #[test]
    fn test_theme_from_rgb_splits_on_luma() {
        assert_eq!(theme_from_rgb(255, 255, 255), HighlightBackground::Light);
        assert_eq!(theme_from_rgb(24, 24, 27), HighlightBackground::Dark);
    }

    #[test]
    fn test_cli_parses_all_flags() {
        let cli = Cli::try_parse_from([
            "flowchartify",
            "--watch",
            "--no-live",
            "--plain",
            "--no-images",
            "--theme",
            "light",
            "--output-dir",
            "out",
            "--export-scale",
            "2",
            "chart.flow",
        ])
        .unwrap();
        assert_eq!(cli.file, Some(PathBuf::from("chart.flow")));
        assert!(cli.watch && cli.no_live && cli.plain && cli.no_images);
        assert_eq!(cli.theme, ThemeMode::Light);
        assert_eq!(cli.output_dir, Some(PathBuf::from("out")));
        assert_eq!(cli.export_scale, Some(2.0));
    }

    #[test]
    fn test_cli_file_is_optional() {
        let cli = Cli::try_parse_from(["flowchartify"]).unwrap();
        assert!(cli.file.is_none());
        assert!(!cli.print_style);
    }
}
