use std::path::Path;

use anyhow::Context;

use crate::assets::ProxyConfig;
use crate::export::{ExportOpts, MIN_PIXEL_RATIO};
use crate::foundation::core::Canvas;
use crate::foundation::error::{MoodboardError, MoodboardResult};

/// Editing-surface settings. Every field has a default, so partial JSON files are accepted.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub canvas: Canvas,
    /// Extra surface on every side of the canvas, for dragging layers partly out of view.
    pub headroom_px: u32,
    pub proxy: ProxyConfig,
    pub export: ExportOpts,
    /// Seed for the random placement of newly added layers.
    pub placement_seed: u64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            canvas: Canvas::default(),
            headroom_px: 0,
            proxy: ProxyConfig::default(),
            export: ExportOpts::default(),
            placement_seed: 0x6d6f_6f64,
        }
    }
}

impl EditorConfig {
    pub fn from_json_file(path: &Path) -> MoodboardResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_str(&text)
            .map_err(|e| MoodboardError::serde(format!("config '{}': {e}", path.display())))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> MoodboardResult<()> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(MoodboardError::validation("canvas width/height must be > 0"));
        }
        self.export.validate()?;
        if self.proxy.endpoint.trim().is_empty() {
            return Err(MoodboardError::validation("proxy endpoint must be non-empty"));
        }
        let limit = u64::from(u16::MAX);
        let side = |v: u32| {
            (u64::from(v) + 2 * u64::from(self.headroom_px)) * u64::from(self.export.pixel_ratio)
        };
        if side(self.canvas.width) > limit || side(self.canvas.height) > limit {
            return Err(MoodboardError::validation(format!(
                "canvas {}x{} with headroom {} at pixel ratio {} exceeds {limit}px",
                self.canvas.width, self.canvas.height, self.headroom_px, self.export.pixel_ratio
            )));
        }
        Ok(())
    }

    /// Apply `MOODBOARD_*` environment overrides. Unparsable values are ignored.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    #[must_use]
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(endpoint) = lookup("MOODBOARD_PROXY_ENDPOINT").filter(|v| !v.trim().is_empty())
        {
            self.proxy.endpoint = endpoint;
        }
        if let Some(ratio) = lookup("MOODBOARD_EXPORT_PIXEL_RATIO")
            .and_then(|v| v.trim().parse::<u32>().ok())
            .filter(|&n| n >= MIN_PIXEL_RATIO)
        {
            self.export.pixel_ratio = ratio;
        }
        if let Some(q) = lookup("MOODBOARD_JPEG_QUALITY")
            .and_then(|v| v.trim().parse::<u8>().ok())
            .filter(|q| (1..=100).contains(q))
        {
            self.export.jpeg_quality = q;
        }
        if let Some(h) = lookup("MOODBOARD_HEADROOM_PX").and_then(|v| v.trim().parse::<u32>().ok())
        {
            self.headroom_px = h;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = EditorConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.canvas, Canvas::default());
        assert_eq!(cfg.proxy.endpoint, "/proxy");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: EditorConfig =
            serde_json::from_str(r#"{"headroom_px": 40, "export": {"jpeg_quality": 80}}"#).unwrap();
        assert_eq!(cfg.headroom_px, 40);
        assert_eq!(cfg.export.jpeg_quality, 80);
        assert_eq!(cfg.export.pixel_ratio, 2);
        assert_eq!(cfg.canvas.width, 960);
    }

    #[test]
    fn oversized_surfaces_are_rejected() {
        let cfg = EditorConfig {
            canvas: Canvas::new(40_000, 100).unwrap(),
            ..EditorConfig::default()
        };
        assert!(cfg.validate().is_err());
        let cfg = EditorConfig {
            export: ExportOpts {
                pixel_ratio: 1,
                ..ExportOpts::default()
            },
            ..EditorConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn overrides_apply_and_ignore_garbage() {
        let env: HashMap<&str, &str> = [
            ("MOODBOARD_PROXY_ENDPOINT", "https://img.example.com/p"),
            ("MOODBOARD_EXPORT_PIXEL_RATIO", "3"),
            ("MOODBOARD_JPEG_QUALITY", "250"),
            ("MOODBOARD_HEADROOM_PX", "nope"),
        ]
        .into_iter()
        .collect();
        let cfg = EditorConfig::default()
            .with_overrides_from(|k| env.get(k).map(|v| (*v).to_owned()));
        assert_eq!(cfg.proxy.endpoint, "https://img.example.com/p");
        assert_eq!(cfg.export.pixel_ratio, 3);
        assert_eq!(cfg.export.jpeg_quality, 95);
        assert_eq!(cfg.headroom_px, 0);
    }

    #[test]
    fn config_file_round_trip() {
        let path = std::env::temp_dir().join(format!("moodboard-cfg-{}.json", std::process::id()));
        let cfg = EditorConfig {
            headroom_px: 12,
            ..EditorConfig::default()
        };
        std::fs::write(&path, serde_json::to_string(&cfg).unwrap()).unwrap();
        assert_eq!(EditorConfig::from_json_file(&path).unwrap(), cfg);
        std::fs::remove_file(&path).unwrap();
    }
}
