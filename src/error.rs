use std::path::PathBuf;

/// Error type shared by the loaders, the world operations and the host command surface.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// Wrong arity, wrong value type, id out of range, unknown mode or flag
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A named or numbered thing the caller referenced does not exist
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// File I/O error
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// XML parse error in a TMX or TSX document
    #[error("XML parse error in {path}: {source}")]
    Xml {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },

    /// JSON parse error in an Aseprite sidecar or a sprite sheet mapping
    #[error("JSON parse error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Image could not be opened or decoded
    #[error("failed to load image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Structurally invalid map (missing `<map>`, bad attributes, bad layer size)
    #[error("invalid map: {0}")]
    InvalidMap(String),

    /// A custom property uses a type the loader does not know
    #[error("unsupported property type `{kind}` for property `{name}`")]
    UnsupportedPropertyType { name: String, kind: String },

    /// A fixed-size table is full
    #[error("capacity reached: at most {max} {what}")]
    Capacity { what: &'static str, max: usize },

    /// Shader compilation or other GPU setup failure
    #[error("GPU error: {0}")]
    Gpu(String),
}

impl WorldError {
    pub(crate) fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        WorldError::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        WorldError::InvalidArgument(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, WorldError>;
