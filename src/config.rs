//! Profiler configuration: built-in defaults, overridable by the
//! `[Layer][Settings]` section of a text settings file whose path comes
//! from the `PROFILER_CONFIG_PATH` environment variable (spec.md §6).
//!
//! Unknown keys are ignored; a key absent from the file restores its
//! default. This mirrors how Vulkan layers conventionally read their
//! settings overlay — plain `key=value` lines, no schema, no nesting.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::time::Duration;

use crate::query::DEFAULT_POOL_SIZE;

pub const CONFIG_PATH_ENV_VAR: &str = "PROFILER_CONFIG_PATH";

/// One of the sampling granularities the extension surface can select
/// (spec.md §6 "set sampling mode").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingMode {
    DrawCall,
    Pipeline,
    RenderPass,
    CommandBuffer,
    Submit,
    Frame,
}

impl SamplingMode {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "drawcall" => Some(Self::DrawCall),
            "pipeline" => Some(Self::Pipeline),
            "renderpass" => Some(Self::RenderPass),
            "commandbuffer" => Some(Self::CommandBuffer),
            "submit" => Some(Self::Submit),
            "frame" => Some(Self::Frame),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// The resolver runs synchronously during frame finish.
    Synchronous,
    /// The resolver runs on a dedicated worker thread.
    Worker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDelimiterMode {
    Present,
    EveryNSubmits,
}

/// Fully resolved profiler configuration: built-in defaults overlaid with
/// whatever the settings file provided.
#[derive(Debug, Clone)]
pub struct ProfilerConfig {
    pub sampling_mode: SamplingMode,
    pub sync_mode: SyncMode,
    pub frame_delimiter_mode: FrameDelimiterMode,
    pub frame_delimiter_n: u32,
    pub timestamp_pool_size: u32,
    pub memory_sampler_interval: Duration,
    pub log_objects: bool,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            sampling_mode: SamplingMode::Frame,
            sync_mode: SyncMode::Worker,
            frame_delimiter_mode: FrameDelimiterMode::Present,
            frame_delimiter_n: 1,
            timestamp_pool_size: DEFAULT_POOL_SIZE,
            memory_sampler_interval: Duration::from_millis(100),
            log_objects: false,
        }
    }
}

/// Parses `[section][subsection]` key=value lines. Only the
/// `[Layer][Settings]` section is consulted; everything else is ignored,
/// as are malformed lines and unrecognized keys.
fn parse_settings_file(text: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();
    let mut in_target_section = false;

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') {
            in_target_section = line.eq_ignore_ascii_case("[Layer][Settings]") || line.eq_ignore_ascii_case("[layer.settings]");
            continue;
        }
        if !in_target_section {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            values.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    values
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "0" => Some(false),
        "1" => Some(true),
        _ => None,
    }
}

impl ProfilerConfig {
    /// Loads configuration from `PROFILER_CONFIG_PATH` if set and readable,
    /// overlaying built-in defaults. Any I/O or parse failure logs a
    /// warning and falls back to defaults — configuration problems must
    /// never prevent the layer from loading.
    pub fn load() -> Self {
        let mut config = Self::default();
        let Ok(path) = env::var(CONFIG_PATH_ENV_VAR) else {
            return config;
        };
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("failed to read {CONFIG_PATH_ENV_VAR}={path}: {e}, using defaults");
                return config;
            }
        };
        config.apply(&parse_settings_file(&text));
        config
    }

    fn apply(&mut self, values: &HashMap<String, String>) {
        if let Some(mode) = values.get("sampling_mode").and_then(|v| SamplingMode::parse(v)) {
            self.sampling_mode = mode;
        }
        if let Some(value) = values.get("sync_mode") {
            self.sync_mode = match value.as_str() {
                "synchronous" => SyncMode::Synchronous,
                "worker" => SyncMode::Worker,
                _ => self.sync_mode,
            };
        }
        if let Some(value) = values.get("frame_delimiter") {
            self.frame_delimiter_mode = match value.as_str() {
                "present" => FrameDelimiterMode::Present,
                "submit" => FrameDelimiterMode::EveryNSubmits,
                _ => self.frame_delimiter_mode,
            };
        }
        if let Some(n) = values.get("frame_delimiter_n").and_then(|v| v.parse().ok()) {
            self.frame_delimiter_n = n;
        }
        if let Some(size) = values.get("timestamp_pool_size").and_then(|v| v.parse().ok()) {
            self.timestamp_pool_size = size;
        }
        if let Some(ms) = values.get("memory_sampler_interval_ms").and_then(|v| v.parse().ok()) {
            self.memory_sampler_interval = Duration::from_millis(ms);
        }
        if let Some(log_objects) = values.get("log_objects").and_then(|v| parse_bool(v)) {
            self.log_objects = log_objects;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_defaults() {
        let config = ProfilerConfig::default();
        assert_eq!(config.sampling_mode, SamplingMode::Frame);
        assert_eq!(config.frame_delimiter_mode, FrameDelimiterMode::Present);
        assert_eq!(config.timestamp_pool_size, DEFAULT_POOL_SIZE);
    }

    #[test]
    fn parse_settings_file_ignores_sections_other_than_layer_settings() {
        let text = "[Other]\nsampling_mode=drawcall\n[Layer][Settings]\nsampling_mode=submit\n";
        let values = parse_settings_file(text);
        assert_eq!(values.get("sampling_mode").unwrap(), "submit");
    }

    #[test]
    fn apply_overlays_only_recognized_keys() {
        let mut config = ProfilerConfig::default();
        let mut values = HashMap::new();
        values.insert("sampling_mode".to_string(), "drawcall".to_string());
        values.insert("unknown_key".to_string(), "whatever".to_string());
        config.apply(&values);
        assert_eq!(config.sampling_mode, SamplingMode::DrawCall);
    }

    #[test]
    fn absent_key_keeps_default_value() {
        let mut config = ProfilerConfig::default();
        config.apply(&HashMap::new());
        assert_eq!(config.frame_delimiter_n, 1);
    }

    #[test]
    fn malformed_lines_are_skipped_without_panicking() {
        let text = "[Layer][Settings]\nnot_a_key_value_line\nsampling_mode=frame\n";
        let values = parse_settings_file(text);
        assert_eq!(values.len(), 1);
    }
}
