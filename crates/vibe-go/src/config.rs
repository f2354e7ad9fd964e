use log::warn;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use vibe_go_core::dispatch::DispatchConfig;
use vibe_go_core::pacing::PacingConfig;
use vibe_go_core::scale::Screen;
use vibe_go_core::{AudioConfig, DiffOptions, PipelineConfig, Settings, VideoConfig};

use crate::demo::{INDEXED_HEIGHT, INDEXED_WIDTH};

/// Which synthetic video source the demo core renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum VideoSource {
    /// 160x144 direct RGB565.
    #[default]
    Rgb565,
    /// 256x224 palette-indexed.
    Indexed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DisplaySection {
    pub screen_width: u32,
    pub screen_height: u32,
    /// Panel rows per bus transfer.
    pub line_count: u32,
    pub aspect: f32,
    pub scaling: bool,
    pub source: VideoSource,
    pub pixel_mask: u16,
    pub palette_shift_mask: u16,
    pub interlaced: bool,
    /// Blend native frames up to 265x240 instead of the fitted resampler.
    pub expand_native: bool,
}

impl Default for DisplaySection {
    fn default() -> Self {
        Self {
            screen_width: Screen::ILI9341.width,
            screen_height: Screen::ILI9341.height,
            line_count: 5,
            aspect: 1.0,
            scaling: true,
            source: VideoSource::Rgb565,
            pixel_mask: 0x0F,
            palette_shift_mask: 0x40,
            interlaced: false,
            expand_native: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PacingSection {
    pub visible_cycles: u32,
    pub vblank_cycles: u32,
    pub visible_lines: u32,
    pub report_interval: u32,
    pub counter_hz: u64,
}

impl Default for PacingSection {
    fn default() -> Self {
        let pacing = PacingConfig::default();
        Self {
            visible_cycles: pacing.visible_cycles,
            vblank_cycles: pacing.vblank_cycles,
            visible_lines: pacing.visible_lines,
            report_interval: pacing.report_interval,
            counter_hz: pacing.counter_hz,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AudioSection {
    pub sample_rate: u32,
    /// Frames the output queue buffers ahead of the device.
    pub latency_frames: usize,
}

impl Default for AudioSection {
    fn default() -> Self {
        Self {
            sample_rate: 32000,
            latency_frames: 8192,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HostConfig {
    pub display: DisplaySection,
    pub pacing: PacingSection,
    pub audio: AudioSection,
}

impl HostConfig {
    pub fn screen(&self) -> Screen {
        Screen::new(
            self.display.screen_width.max(1),
            self.display.screen_height.max(1),
        )
    }

    pub fn pipeline(&self) -> PipelineConfig {
        let display = &self.display;
        let mut video = match display.source {
            VideoSource::Rgb565 => VideoConfig::gb(),
            VideoSource::Indexed => VideoConfig::indexed(
                INDEXED_WIDTH,
                INDEXED_HEIGHT,
                DiffOptions::new(display.pixel_mask, display.palette_shift_mask),
            ),
        };
        video.aspect = display.aspect;
        video.interlaced = display.interlaced;
        video.expand_native &= display.expand_native;

        PipelineConfig {
            video,
            audio: AudioConfig::with_rate(self.audio.sample_rate.max(1)),
            dispatch: DispatchConfig::new(self.screen(), display.line_count),
            pacing: PacingConfig {
                visible_cycles: self.pacing.visible_cycles,
                vblank_cycles: self.pacing.vblank_cycles,
                visible_lines: self.pacing.visible_lines,
                report_interval: self.pacing.report_interval,
                counter_hz: self.pacing.counter_hz,
            },
        }
    }

    pub fn settings(&self) -> Settings {
        Settings::new(self.display.scaling, false)
    }
}

pub fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("vibe-go").join("pipeline.toml");
        }
    }

    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("vibe-go").join("pipeline.toml");
    }

    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join("vibe-go")
            .join("pipeline.toml");
    }

    PathBuf::from("pipeline.toml")
}

pub fn load_from_file(path: &Path) -> HostConfig {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(_) => return HostConfig::default(),
    };

    match toml::from_str::<HostConfig>(&text) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(
                "Failed to parse pipeline config {}: {e}; using defaults",
                path.display()
            );
            HostConfig::default()
        }
    }
}

pub fn save_to_file(path: &Path, cfg: &HostConfig) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let text = toml::to_string_pretty(cfg).map_err(std::io::Error::other)?;
    std::fs::write(path, text)
}
