//! Upload validation.
//!
//! Runs before any byte reaches storage and has no side effects. Presence of
//! every required field is checked before any extension, so a request that
//! lacks the audio part reports [`Error::MissingField`] even when its image
//! extension is also wrong.

use bytes::Bytes;
use sc_core::config::UploadConfig;
use sc_core::{Error, Result};

/// Multipart field carrying the still image.
pub const IMAGE_FIELD: &str = "image";
/// Multipart field carrying the audio track.
pub const AUDIO_FIELD: &str = "audio";

/// One file part of an upload request, as received.
#[derive(Debug, Clone)]
pub struct UploadPart {
    pub field: String,
    /// Client-supplied filename; only ever used for its extension and the
    /// display name.
    pub file_name: Option<String>,
    pub data: Bytes,
}

impl UploadPart {
    pub fn new(field: impl Into<String>, file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            field: field.into(),
            file_name: Some(file_name.into()),
            data: data.into(),
        }
    }
}

/// A part that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedFile {
    pub file_name: String,
    /// Lower-cased extension, guaranteed to be in the field's allow-list.
    pub extension: String,
    pub data: Bytes,
}

/// The image and audio parts of a valid upload.
#[derive(Debug, Clone)]
pub struct ValidatedUpload {
    pub image: ValidatedFile,
    pub audio: ValidatedFile,
}

/// A required field and the extensions it accepts.
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub field: String,
    pub extensions: Vec<String>,
}

impl FieldRule {
    pub fn new(field: impl Into<String>, extensions: &[String]) -> Self {
        Self {
            field: field.into(),
            extensions: extensions.iter().map(|e| e.to_ascii_lowercase()).collect(),
        }
    }

    fn allows(&self, extension: &str) -> bool {
        self.extensions.iter().any(|e| e == extension)
    }
}

/// Checks uploads against the configured allow-lists.
#[derive(Debug, Clone)]
pub struct InputValidator {
    image: FieldRule,
    audio: FieldRule,
}

impl InputValidator {
    pub fn new(upload: &UploadConfig) -> Self {
        Self {
            image: FieldRule::new(IMAGE_FIELD, &upload.image_extensions),
            audio: FieldRule::new(AUDIO_FIELD, &upload.audio_extensions),
        }
    }

    /// Validate `parts`, returning the image and audio in a typed pair.
    ///
    /// When a field appears more than once the first occurrence wins.
    pub fn validate(&self, parts: &[UploadPart]) -> Result<ValidatedUpload> {
        let (image_part, image_name) = find_named_part(parts, &self.image.field)?;
        let (audio_part, audio_name) = find_named_part(parts, &self.audio.field)?;

        Ok(ValidatedUpload {
            image: check_extension(&self.image, image_part, image_name)?,
            audio: check_extension(&self.audio, audio_part, audio_name)?,
        })
    }
}

fn find_named_part<'a>(parts: &'a [UploadPart], field: &str) -> Result<(&'a UploadPart, &'a str)> {
    parts
        .iter()
        .find(|p| p.field == field)
        .and_then(|p| match p.file_name.as_deref() {
            Some(name) if !name.trim().is_empty() => Some((p, name)),
            _ => None,
        })
        .ok_or_else(|| Error::MissingField(field.to_string()))
}

fn check_extension(rule: &FieldRule, part: &UploadPart, file_name: &str) -> Result<ValidatedFile> {
    let Some(extension) = extension_of(file_name) else {
        return Err(Error::invalid_format(
            &rule.field,
            format!("'{file_name}' has no file extension"),
        ));
    };

    if !rule.allows(&extension) {
        return Err(Error::invalid_format(
            &rule.field,
            format!(
                "extension '{extension}' is not allowed (expected one of: {})",
                rule.extensions.join(", ")
            ),
        ));
    }

    Ok(ValidatedFile {
        file_name: file_name.to_string(),
        extension,
        data: part.data.clone(),
    })
}

/// Lower-cased last dot-separated segment of `file_name`, if it has one.
pub fn extension_of(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> InputValidator {
        InputValidator::new(&UploadConfig::default())
    }

    fn part(field: &str, name: &str) -> UploadPart {
        UploadPart::new(field, name, Bytes::from_static(b"data"))
    }

    #[test]
    fn accepts_allowed_extensions_case_insensitively() {
        for image in ["a.png", "b.jpg", "c.jpeg", "d.webp", "E.PNG", "f.JpEg"] {
            let upload = validator()
                .validate(&[part("image", image), part("audio", "song.MP3")])
                .unwrap_or_else(|e| panic!("{image} rejected: {e}"));
            assert_eq!(upload.audio.extension, "mp3");
            assert_eq!(upload.image.extension, image.rsplit('.').next().unwrap().to_lowercase());
        }
    }

    #[test]
    fn rejects_gif() {
        let err = validator()
            .validate(&[part("image", "anim.gif"), part("audio", "song.mp3")])
            .unwrap_err();
        match err {
            Error::InvalidFormat { field, message } => {
                assert_eq!(field, "image");
                assert!(message.contains("gif"));
            }
            other => panic!("expected InvalidFormat, got {other:?}"),
        }
    }

    #[test]
    fn rejects_non_mp3_audio() {
        let err = validator()
            .validate(&[part("image", "a.png"), part("audio", "song.wav")])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidFormat { ref field, .. } if field == "audio"));
    }

    #[test]
    fn missing_audio_wins_over_bad_image_extension() {
        let err = validator().validate(&[part("image", "anim.gif")]).unwrap_err();
        assert!(matches!(err, Error::MissingField(ref f) if f == "audio"));
    }

    #[test]
    fn empty_filename_counts_as_missing() {
        let err = validator()
            .validate(&[part("image", ""), part("audio", "song.mp3")])
            .unwrap_err();
        assert!(matches!(err, Error::MissingField(ref f) if f == "image"));

        let nameless = UploadPart {
            field: "audio".into(),
            file_name: None,
            data: Bytes::new(),
        };
        let err = validator()
            .validate(&[part("image", "a.png"), nameless])
            .unwrap_err();
        assert!(matches!(err, Error::MissingField(ref f) if f == "audio"));
    }

    #[test]
    fn filename_without_dot_has_no_extension() {
        let err = validator()
            .validate(&[part("image", "png"), part("audio", "song.mp3")])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidFormat { .. }));
    }

    #[test]
    fn unrelated_fields_are_ignored() {
        let upload = validator()
            .validate(&[
                part("notes", "readme.txt"),
                part("audio", "track.mp3"),
                part("image", "cover.jpg"),
            ])
            .unwrap();
        assert_eq!(upload.image.file_name, "cover.jpg");
        assert_eq!(upload.audio.file_name, "track.mp3");
    }

    #[test]
    fn extension_of_takes_last_segment() {
        assert_eq!(extension_of("archive.tar.PNG").as_deref(), Some("png"));
        assert_eq!(extension_of("noext"), None);
        assert_eq!(extension_of("trailing."), None);
    }

    #[test]
    fn allow_list_comes_from_config() {
        let cfg = UploadConfig {
            image_extensions: vec!["GIF".into()],
            audio_extensions: vec!["mp3".into()],
        };
        let v = InputValidator::new(&cfg);
        assert!(v
            .validate(&[part("image", "a.gif"), part("audio", "b.mp3")])
            .is_ok());
        assert!(v
            .validate(&[part("image", "a.png"), part("audio", "b.mp3")])
            .is_err());
    }
}
