//! Persisted default flags.
//!
//! Config files hold plain CLI flag tokens, one or more per line, with `#`
//! comments. The global file is merged first, then the local
//! `.flowchartifyrc`, then the actual command line.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

const APP_DIR: &str = "flowchartify";
const LOCAL_FILE: &str = ".flowchartifyrc";

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeMode {
    Auto,
    Light,
    Dark,
}

impl ThemeMode {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "auto" => Some(Self::Auto),
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConfigFlags {
    pub watch: bool,
    pub no_live: bool,
    pub plain: bool,
    pub no_images: bool,
    pub force_half_cell: bool,
    pub perf: bool,
    pub theme: Option<ThemeMode>,
    pub palette: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub export_scale: Option<f32>,
    pub render_debug_log: Option<PathBuf>,
}

impl ConfigFlags {
    /// Switches accumulate; valued options from `other` win.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            watch: self.watch || other.watch,
            no_live: self.no_live || other.no_live,
            plain: self.plain || other.plain,
            no_images: self.no_images || other.no_images,
            force_half_cell: self.force_half_cell || other.force_half_cell,
            perf: self.perf || other.perf,
            theme: other.theme.or(self.theme),
            palette: other.palette.clone().or_else(|| self.palette.clone()),
            output_dir: other.output_dir.clone().or_else(|| self.output_dir.clone()),
            export_scale: other.export_scale.or(self.export_scale),
            render_debug_log: other
                .render_debug_log
                .clone()
                .or_else(|| self.render_debug_log.clone()),
        }
    }

    fn to_lines(&self) -> Vec<String> {
        let switches = [
            (self.watch, "--watch"),
            (self.no_live, "--no-live"),
            (self.plain, "--plain"),
            (self.no_images, "--no-images"),
            (self.force_half_cell, "--force-half-cell"),
            (self.perf, "--perf"),
        ];
        let mut lines: Vec<String> = switches
            .into_iter()
            .filter(|(on, _)| *on)
            .map(|(_, flag)| flag.to_string())
            .collect();
        if let Some(theme) = self.theme {
            lines.push(format!("--theme {}", theme.as_str()));
        }
        if let Some(path) = &self.palette {
            lines.push(format!("--palette {}", path.display()));
        }
        if let Some(dir) = &self.output_dir {
            lines.push(format!("--output-dir {}", dir.display()));
        }
        if let Some(scale) = self.export_scale {
            lines.push(format!("--export-scale {scale}"));
        }
        if let Some(path) = &self.render_debug_log {
            lines.push(format!("--render-debug-log {}", path.display()));
        }
        lines
    }
}

pub fn global_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join(APP_DIR).join("config");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join(APP_DIR)
                .join("config");
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join(APP_DIR).join("config");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".config").join(APP_DIR).join("config");
        }
    }

    local_override_path()
}

pub fn local_override_path() -> PathBuf {
    PathBuf::from(LOCAL_FILE)
}

/// Read flags from `path`. A missing file yields the defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub fn load_config_flags(path: &Path) -> Result<ConfigFlags> {
    if !path.exists() {
        return Ok(ConfigFlags::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let tokens: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(str::split_whitespace)
        .map(ToOwned::to_owned)
        .collect();
    let flags = parse_flag_tokens(&tokens);
    tracing::debug!(path = %path.display(), ?flags, "loaded config");
    Ok(flags)
}

/// Write `flags` to `path`, creating parent directories.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub fn save_config_flags(path: &Path, flags: &ConfigFlags) -> Result<()> {
    let mut lines = vec!["# flowchartify defaults (saved with --save)".to_string()];
    lines.extend(flags.to_lines());
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config dir {}", parent.display()))?;
    }
    fs::write(path, format!("{}\n", lines.join("\n")))
        .with_context(|| format!("Failed to write config {}", path.display()))
}

/// Remove the config file at `path` if there is one.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be removed.
pub fn clear_config_flags(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

/// Pick the flags we know out of a raw token list. Unknown tokens and
/// malformed values are skipped.
pub fn parse_flag_tokens(tokens: &[String]) -> ConfigFlags {
    let mut flags = ConfigFlags::default();
    let mut iter = tokens.iter();
    while let Some(token) = iter.next() {
        let (name, inline_value) = match token.split_once('=') {
            Some((name, value)) if name.starts_with("--") => (name, Some(value.to_string())),
            _ => (token.as_str(), None),
        };
        let mut value = || inline_value.clone().or_else(|| iter.next().cloned());
        match name {
            "--watch" => flags.watch = true,
            "--no-live" => flags.no_live = true,
            "--plain" => flags.plain = true,
            "--no-images" => flags.no_images = true,
            "--force-half-cell" => flags.force_half_cell = true,
            "--perf" => flags.perf = true,
            "--theme" => flags.theme = value().as_deref().and_then(ThemeMode::parse),
            "--palette" => flags.palette = value().map(PathBuf::from),
            "--output-dir" => flags.output_dir = value().map(PathBuf::from),
            "--export-scale" => {
                flags.export_scale = value()
                    .and_then(|v| v.parse::<f32>().ok())
                    .filter(|scale| scale.is_finite() && *scale > 0.0);
            }
            "--render-debug-log" => flags.render_debug_log = value().map(PathBuf::from),
            _ => {}
        }
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn tokens(args: &[&str]) -> Vec<String> {
        args.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_parse_flag_tokens_extracts_known_flags() {
        let flags = parse_flag_tokens(&tokens(&[
            "flowchartify",
            "--watch",
            "--plain",
            "--theme",
            "dark",
            "--export-scale=2.5",
            "--output-dir",
            "out",
            "chart.flow",
        ]));
        assert!(flags.watch);
        assert!(flags.plain);
        assert!(!flags.no_live);
        assert_eq!(flags.theme, Some(ThemeMode::Dark));
        assert_eq!(flags.export_scale, Some(2.5));
        assert_eq!(flags.output_dir, Some(PathBuf::from("out")));
    }

    #[test]
    fn test_invalid_values_are_dropped() {
        let flags = parse_flag_tokens(&tokens(&[
            "--theme=sepia",
            "--export-scale",
            "-1",
            "--export-scale=abc",
        ]));
        assert_eq!(flags.theme, None);
        assert_eq!(flags.export_scale, None);
    }

    #[test]
    fn test_union_prefers_cli_values() {
        let file = ConfigFlags {
            watch: true,
            theme: Some(ThemeMode::Light),
            export_scale: Some(2.0),
            ..ConfigFlags::default()
        };
        let cli = ConfigFlags {
            no_live: true,
            theme: Some(ThemeMode::Dark),
            ..ConfigFlags::default()
        };
        let merged = file.union(&cli);
        assert!(merged.watch && merged.no_live);
        assert_eq!(merged.theme, Some(ThemeMode::Dark));
        assert_eq!(merged.export_scale, Some(2.0));
    }

    #[test]
    fn test_save_load_and_clear_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(LOCAL_FILE);
        let flags = ConfigFlags {
            watch: true,
            no_live: true,
            plain: true,
            no_images: true,
            force_half_cell: true,
            perf: true,
            theme: Some(ThemeMode::Light),
            palette: Some(PathBuf::from("palette.css")),
            output_dir: Some(PathBuf::from("exports")),
            export_scale: Some(3.0),
            render_debug_log: Some(PathBuf::from("render.log")),
        };

        save_config_flags(&path, &flags).unwrap();
        assert_eq!(load_config_flags(&path).unwrap(), flags);

        clear_config_flags(&path).unwrap();
        assert!(!path.exists());
        assert_eq!(load_config_flags(&path).unwrap(), ConfigFlags::default());
    }
}
