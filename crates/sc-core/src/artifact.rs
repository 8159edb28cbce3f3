//! Artifact identity: typed IDs, artifact kinds and the naming scheme.
//!
//! Every file stillcast writes is named `<uuid>.<ext>`, where the UUID is a
//! fresh random v4 value. Client-supplied filenames never reach the
//! filesystem; the original audio name survives only as a percent-encoded
//! [`DisplayName`] carried in the download link.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

use crate::{Error, Result};

/// Generate a newtype ID wrapper over `Uuid`.
///
/// The macro produces a struct with:
/// - `new()` to create a random v4 UUID
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`, `Serialize`, `Deserialize`
/// - `Display` and `FromStr` delegating to the inner UUID
/// - `Default` that generates a new random ID
macro_rules! typed_id {
    ($($(#[doc = $doc:expr])* $name:ident),+ $(,)?) => {
        $(
            $(#[doc = $doc])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name(Uuid);

            impl $name {
                /// Create a new random ID.
                #[must_use]
                pub fn new() -> Self {
                    Self(Uuid::new_v4())
                }

                /// Return the inner UUID value.
                #[must_use]
                pub fn as_uuid(&self) -> &Uuid {
                    &self.0
                }
            }

            impl Default for $name {
                fn default() -> Self {
                    Self::new()
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl FromStr for $name {
                type Err = uuid::Error;

                fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                    Uuid::parse_str(s).map(Self)
                }
            }
        )+
    };
}

typed_id! {
    /// Unique identifier for a stored artifact.
    ArtifactId,
    /// Unique identifier for one upload-to-video processing job.
    JobId,
}

// ---------------------------------------------------------------------------
// Kinds and namespaces
// ---------------------------------------------------------------------------

/// The two storage namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    /// Raw client uploads.
    Uploads,
    /// Derived and published artifacts.
    Outputs,
}

/// What an artifact contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    RawImage,
    RawAudio,
    CompositeImage,
    Video,
}

impl ArtifactKind {
    /// Fixed extension for kinds whose format stillcast decides.
    ///
    /// Raw images keep the (validated) extension they were uploaded with.
    pub fn canonical_extension(self) -> Option<&'static str> {
        match self {
            ArtifactKind::RawImage => None,
            ArtifactKind::RawAudio => Some("mp3"),
            ArtifactKind::CompositeImage => Some("png"),
            ArtifactKind::Video => Some("mp4"),
        }
    }

    pub fn namespace(self) -> Namespace {
        match self {
            ArtifactKind::RawImage | ArtifactKind::RawAudio => Namespace::Uploads,
            ArtifactKind::CompositeImage | ArtifactKind::Video => Namespace::Outputs,
        }
    }

    pub fn mime_type(self, extension: &str) -> &'static str {
        match (self, extension) {
            (ArtifactKind::Video, _) => "video/mp4",
            (ArtifactKind::RawAudio, _) => "audio/mpeg",
            (_, "png") => "image/png",
            (_, "webp") => "image/webp",
            (_, "jpg" | "jpeg") => "image/jpeg",
            _ => "application/octet-stream",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArtifactKind::RawImage => "raw_image",
            ArtifactKind::RawAudio => "raw_audio",
            ArtifactKind::CompositeImage => "composite_image",
            ArtifactKind::Video => "video",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// StoredArtifact
// ---------------------------------------------------------------------------

/// A file owned by stillcast, addressed only by its generated id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredArtifact {
    pub id: ArtifactId,
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub extension: String,
}

impl StoredArtifact {
    /// `<id>.<extension>`, the only name this artifact ever has on disk.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.id, self.extension)
    }

    pub fn mime_type(&self) -> &'static str {
        self.kind.mime_type(&self.extension)
    }
}

// ---------------------------------------------------------------------------
// ArtifactNamer
// ---------------------------------------------------------------------------

/// Fallback download name when no usable display name was supplied.
pub const DEFAULT_DISPLAY_NAME: &str = "video";

/// Everything except RFC 3986 unreserved characters is escaped, so the
/// result survives both path and query transport, including `+` and `%`.
const DISPLAY_NAME_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Allocates artifact identities and derives display names.
pub struct ArtifactNamer;

impl ArtifactNamer {
    /// Allocate a new artifact of a kind with a canonical extension inside
    /// `namespace_root`. Raw images belong in [`ArtifactNamer::new_upload`].
    pub fn new_artifact(namespace_root: &Path, kind: ArtifactKind) -> StoredArtifact {
        let extension = kind.canonical_extension().unwrap_or("bin");
        Self::build(namespace_root, kind, ArtifactId::new(), extension)
    }

    /// Allocate a new artifact whose extension comes from a validated upload.
    ///
    /// The extension is lower-cased and must be ASCII alphanumeric so it can
    /// never introduce a path separator.
    pub fn new_upload(
        namespace_root: &Path,
        kind: ArtifactKind,
        extension: &str,
    ) -> Result<StoredArtifact> {
        let ext = extension.to_ascii_lowercase();
        if ext.is_empty() || !ext.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(Error::invalid_format(
                kind.to_string(),
                format!("unsupported extension '{extension}'"),
            ));
        }
        Ok(Self::build(namespace_root, kind, ArtifactId::new(), &ext))
    }

    /// Rebuild the artifact handle for an existing id, e.g. when resolving a
    /// download request.
    pub fn existing(namespace_root: &Path, kind: ArtifactKind, id: ArtifactId) -> StoredArtifact {
        let extension = kind.canonical_extension().unwrap_or("bin");
        Self::build(namespace_root, kind, id, extension)
    }

    fn build(root: &Path, kind: ArtifactKind, id: ArtifactId, extension: &str) -> StoredArtifact {
        StoredArtifact {
            id,
            kind,
            path: root.join(format!("{id}.{extension}")),
            extension: extension.to_string(),
        }
    }

    /// Derive the display name for the final video from the original audio
    /// filename: directory prefixes and the extension are stripped.
    pub fn display_name_for(original_filename: &str) -> DisplayName {
        // Some browsers send a full client path ("C:\fakepath\song.mp3").
        let base = original_filename
            .rsplit(|c| c == '/' || c == '\\')
            .next()
            .unwrap_or(original_filename);
        let stem = match base.rsplit_once('.') {
            Some((stem, _ext)) if !stem.is_empty() => stem,
            _ => base,
        };
        let stem = stem.trim();
        if stem.is_empty() {
            DisplayName(DEFAULT_DISPLAY_NAME.to_string())
        } else {
            DisplayName(stem.to_string())
        }
    }

    /// Decode a transported display name, defaulting to
    /// [`DEFAULT_DISPLAY_NAME`] when it is absent or empty.
    pub fn decode_display_name(encoded: Option<&str>) -> String {
        let decoded = encoded
            .map(|raw| percent_decode_str(raw).decode_utf8_lossy().into_owned())
            .unwrap_or_default();
        if decoded.trim().is_empty() {
            DEFAULT_DISPLAY_NAME.to_string()
        } else {
            decoded
        }
    }
}

/// Percent-encode `name` so that only RFC 3986 unreserved characters remain.
///
/// The output is also a valid RFC 5987 `value-chars` sequence, so it can be
/// used in a `filename*=UTF-8''...` header parameter.
pub fn encode_display_name(name: &str) -> String {
    utf8_percent_encode(name, DISPLAY_NAME_SET).to_string()
}

/// Human-readable name for a published video, never used as a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisplayName(String);

impl DisplayName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Percent-encoded form safe to append as a query parameter value.
    pub fn encoded(&self) -> String {
        encode_display_name(&self.0)
    }
}

impl Default for DisplayName {
    fn default() -> Self {
        DisplayName(DEFAULT_DISPLAY_NAME.to_string())
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
