//! Persisted JSON shape of a scene.
//!
//! Field names are camelCase and must stay stable; hosts store these documents verbatim.

use serde::{Deserialize, Serialize};

use crate::foundation::core::{Point, Size};
use crate::foundation::error::{MoodboardError, MoodboardResult};
use crate::scene::model::{Background, BlendMode, Layer, LayerId, LayerRank, Scene};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDoc {
    #[serde(default)]
    pub draggable_images: Vec<LayerDoc>,
    #[serde(default)]
    pub background_image: Option<BackgroundDoc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerDoc {
    pub id: String,
    pub url: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub rotation: Option<f64>,
    #[serde(default)]
    pub flip_horizontal: Option<bool>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub shadow: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blend_mode: Option<BlendMode>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundDoc {
    pub url: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default = "default_z_index", deserialize_with = "de_z_index")]
    pub z_index: i32,
}

fn is_false(v: &bool) -> bool {
    !*v
}

fn default_z_index() -> i32 {
    -1
}

fn de_z_index<'de, D: serde::Deserializer<'de>>(d: D) -> Result<i32, D::Error> {
    let v = f64::deserialize(d)?;
    if !v.is_finite() {
        return Err(serde::de::Error::custom("zIndex must be finite"));
    }
    Ok(if v < 0.0 {
        -1
    } else if v > 0.0 {
        1
    } else {
        0
    })
}

fn check_rect(what: &str, x: f64, y: f64, width: f64, height: f64) -> MoodboardResult<()> {
    if !(x.is_finite() && y.is_finite()) {
        return Err(MoodboardError::validation(format!(
            "{what} position must be finite"
        )));
    }
    if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
        return Err(MoodboardError::validation(format!(
            "{what} size must be finite and > 0"
        )));
    }
    Ok(())
}

impl LayerDoc {
    pub fn validate(&self) -> MoodboardResult<()> {
        if self.id.trim().is_empty() {
            return Err(MoodboardError::validation("layer id must be non-empty"));
        }
        if self.url.trim().is_empty() {
            return Err(MoodboardError::validation(format!(
                "layer '{}' url must be non-empty",
                self.id
            )));
        }
        check_rect(
            &format!("layer '{}'", self.id),
            self.x,
            self.y,
            self.width,
            self.height,
        )?;
        if let Some(r) = self.rotation
            && !r.is_finite()
        {
            return Err(MoodboardError::validation(format!(
                "layer '{}' rotation must be finite",
                self.id
            )));
        }
        Ok(())
    }
}

impl BackgroundDoc {
    pub fn validate(&self) -> MoodboardResult<()> {
        if self.url.trim().is_empty() {
            return Err(MoodboardError::validation("background url must be non-empty"));
        }
        check_rect("background", self.x, self.y, self.width, self.height)
    }
}

impl From<&Layer> for LayerDoc {
    fn from(l: &Layer) -> Self {
        Self {
            id: l.id.as_str().to_owned(),
            url: l.source_url.clone(),
            x: l.position.x,
            y: l.position.y,
            width: l.size.width,
            height: l.size.height,
            rotation: Some(l.rotation),
            flip_horizontal: Some(l.flip_horizontal),
            shadow: l.shadow,
            blend_mode: l.blend_mode,
        }
    }
}

impl From<LayerDoc> for Layer {
    fn from(d: LayerDoc) -> Self {
        Self {
            id: LayerId::new(d.id),
            source_url: d.url,
            position: Point::new(d.x, d.y),
            size: Size::new(d.width, d.height),
            rotation: d.rotation.unwrap_or(0.0),
            flip_horizontal: d.flip_horizontal.unwrap_or(false),
            shadow: d.shadow,
            blend_mode: d.blend_mode,
        }
    }
}

impl From<&Background> for BackgroundDoc {
    fn from(b: &Background) -> Self {
        Self {
            url: b.source_url.clone(),
            x: b.position.x,
            y: b.position.y,
            width: b.size.width,
            height: b.size.height,
            z_index: b.rank.z_index(),
        }
    }
}

impl From<BackgroundDoc> for Background {
    fn from(d: BackgroundDoc) -> Self {
        Self {
            source_url: d.url,
            position: Point::new(d.x, d.y),
            size: Size::new(d.width, d.height),
            rank: LayerRank::from_z_index(d.z_index),
        }
    }
}

impl From<&Scene> for SceneDoc {
    fn from(s: &Scene) -> Self {
        Self {
            draggable_images: s.layers.iter().map(LayerDoc::from).collect(),
            background_image: s.background.as_ref().map(BackgroundDoc::from),
        }
    }
}

impl TryFrom<SceneDoc> for Scene {
    type Error = MoodboardError;

    fn try_from(doc: SceneDoc) -> MoodboardResult<Self> {
        let mut seen = std::collections::HashSet::new();
        let mut layers = Vec::with_capacity(doc.draggable_images.len());
        for d in doc.draggable_images {
            d.validate()?;
            if !seen.insert(d.id.clone()) {
                return Err(MoodboardError::validation(format!(
                    "duplicate layer id '{}'",
                    d.id
                )));
            }
            layers.push(Layer::from(d));
        }
        let background = match doc.background_image {
            Some(b) => {
                b.validate()?;
                Some(Background::from(b))
            }
            None => None,
        };
        Ok(Scene { background, layers })
    }
}

impl Scene {
    pub fn to_doc(&self) -> SceneDoc {
        SceneDoc::from(self)
    }

    pub fn to_json(&self) -> MoodboardResult<String> {
        serde_json::to_string(&self.to_doc()).map_err(|e| MoodboardError::serde(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> MoodboardResult<String> {
        serde_json::to_string_pretty(&self.to_doc())
            .map_err(|e| MoodboardError::serde(e.to_string()))
    }

    /// Strict parse: any malformed field or invalid geometry is an error.
    pub fn try_from_json(s: &str) -> MoodboardResult<Self> {
        let doc: SceneDoc =
            serde_json::from_str(s).map_err(|e| MoodboardError::serde(e.to_string()))?;
        Scene::try_from(doc)
    }

    /// Lenient parse for host-stored documents.
    ///
    /// Malformed top-level input yields an empty scene. Each layer and the background are read
    /// independently; entries that fail to parse or validate are dropped with a warning, as are
    /// repeated layer ids after their first occurrence.
    #[tracing::instrument(level = "debug", skip(s), fields(len = s.len()))]
    pub fn from_json(s: &str) -> Scene {
        let value: serde_json::Value = match serde_json::from_str(s) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "scene document is not valid json, using empty scene");
                return Scene::default();
            }
        };
        let Some(obj) = value.as_object() else {
            tracing::warn!("scene document is not an object, using empty scene");
            return Scene::default();
        };

        let mut layers = Vec::new();
        let mut seen = std::collections::HashSet::new();
        if let Some(items) = obj.get("draggableImages") {
            match items.as_array() {
                Some(items) => {
                    for (idx, item) in items.iter().enumerate() {
                        let doc = match LayerDoc::deserialize(item) {
                            Ok(d) => d,
                            Err(e) => {
                                tracing::warn!(idx, error = %e, "dropping malformed layer");
                                continue;
                            }
                        };
                        if let Err(e) = doc.validate() {
                            tracing::warn!(idx, error = %e, "dropping invalid layer");
                            continue;
                        }
                        if !seen.insert(doc.id.clone()) {
                            tracing::warn!(idx, id = %doc.id, "dropping duplicate layer id");
                            continue;
                        }
                        layers.push(Layer::from(doc));
                    }
                }
                None if items.is_null() => {}
                None => tracing::warn!("draggableImages is not an array, ignoring"),
            }
        }

        let background = match obj.get("backgroundImage") {
            None | Some(serde_json::Value::Null) => None,
            Some(v) => match BackgroundDoc::deserialize(v) {
                Ok(doc) => match doc.validate() {
                    Ok(()) => Some(Background::from(doc)),
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping invalid background");
                        None
                    }
                },
                Err(e) => {
                    tracing::warn!(error = %e, "dropping malformed background");
                    None
                }
            },
        };

        Scene { background, layers }
    }
}
