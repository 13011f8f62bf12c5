/// Convenience result type used across the moodboard engine.
pub type MoodboardResult<T> = Result<T, MoodboardError>;

/// Top-level error taxonomy used by engine APIs.
///
/// Most failure modes inside the editing surface degrade to "nothing drawn" and never reach the
/// caller; [`MoodboardError::Export`] is the one the host is expected to show to the user.
#[derive(thiserror::Error, Debug)]
pub enum MoodboardError {
    /// Invalid caller-provided input or configuration.
    #[error("validation error: {0}")]
    Validation(String),

    /// Image fetch or decode failure.
    #[error("load error: {0}")]
    Load(String),

    /// Drawing surface problems (size limits, buffer mismatches).
    #[error("render error: {0}")]
    Render(String),

    /// Rasterize or encode failure during export.
    #[error("export error: {0}")]
    Export(String),

    /// Errors when serializing or deserializing scenes.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MoodboardError {
    /// Build a [`MoodboardError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`MoodboardError::Load`] value.
    pub fn load(msg: impl Into<String>) -> Self {
        Self::Load(msg.into())
    }

    /// Build a [`MoodboardError::Render`] value.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Build a [`MoodboardError::Export`] value.
    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export(msg.into())
    }

    /// Build a [`MoodboardError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            MoodboardError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(MoodboardError::load("x").to_string().contains("load error:"));
        assert!(
            MoodboardError::render("x")
                .to_string()
                .contains("render error:")
        );
        assert!(
            MoodboardError::export("x")
                .to_string()
                .contains("export error:")
        );
        assert!(
            MoodboardError::serde("x")
                .to_string()
                .contains("serialization error:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = MoodboardError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
