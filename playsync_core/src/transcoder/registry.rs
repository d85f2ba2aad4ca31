//! The transcoder registry (C2): built from configured settings, always
//! carrying the built-in copy transcoder regardless of configuration.

use std::collections::HashMap;
use std::sync::Arc;

use crate::types::FileType;

use super::copy::{CopyTranscoder, COPY_TRANSCODER_NAME};
use super::external::{default_ffmpeg_args, default_ffmpeg_command, ExternalCommandTranscoder};
use super::{TranscoderOptions, TranscoderSettings, Transcoder};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("settings reference unknown transcoder {0:?}")]
    UnknownTranscoder(String),

    #[error("transcoder {name:?} is missing required setting {field:?}")]
    MissingSetting { name: String, field: &'static str },
}

/// Builds a [`Transcoder`] from its name and options. Registered factories are
/// consulted for every configured settings key; a key with no matching
/// factory is a [`RegistryError::UnknownTranscoder`].
pub trait TranscoderFactory: Send + Sync {
    fn name(&self) -> &str;
    fn build(&self, options: &TranscoderOptions) -> Result<Arc<dyn Transcoder>, RegistryError>;
}

/// A factory for [`ExternalCommandTranscoder`]s, parameterized by the fixed
/// `(srctype, dsttype)` pair it's registered for; `options` may still
/// override `command`, `args`, and `cost`.
pub struct ExternalTranscoderFactory {
    pub name: String,
    pub srctype: FileType,
    pub dsttype: FileType,
    pub default_cost: u32,
}

impl TranscoderFactory for ExternalTranscoderFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn build(&self, options: &TranscoderOptions) -> Result<Arc<dyn Transcoder>, RegistryError> {
        let command = options
            .get_str("command")
            .map(str::to_string)
            .unwrap_or_else(|| default_ffmpeg_command().to_string_lossy().into_owned());
        let args = options
            .get_sequence_of_strings("args")
            .unwrap_or_else(default_ffmpeg_args);
        let cost = options.get_u32("cost").unwrap_or(self.default_cost);

        Ok(Arc::new(ExternalCommandTranscoder::new(
            self.name.clone(),
            self.srctype.clone(),
            self.dsttype.clone(),
            cost,
            command,
            args,
        )))
    }
}

/// The static table of compiled-in transcoder factories, consulted at startup
/// when building a [`TranscoderRegistry`] from configuration.
///
/// Codec implementations themselves are out of scope: each entry here is a
/// [`ExternalTranscoderFactory`], a generic external-command transcoder that
/// shells out to `ffmpeg` (or whatever `command` a settings entry overrides
/// it with) for a fixed `(srctype, dsttype)` pair. This is the re-architected
/// form of the source's entry-point plugin discovery: the planner never sees
/// anything beyond the `Transcoder` capability set, and new pairs are added
/// here rather than discovered at runtime.
pub fn builtin_factories() -> Vec<Box<dyn TranscoderFactory>> {
    let pairs: &[(&str, &str, &str, u32)] = &[
        ("flac_to_mp3", "flac", "mp3", 5),
        ("flac_to_ogg", "flac", "ogg", 5),
        ("flac_to_wav", "flac", "wav", 3),
        ("wav_to_mp3", "wav", "mp3", 4),
        ("wav_to_ogg", "wav", "ogg", 4),
        ("mp3_to_ogg", "mp3", "ogg", 4),
    ];

    pairs
        .iter()
        .map(|&(name, src, dst, cost)| {
            Box::new(ExternalTranscoderFactory {
                name: name.to_string(),
                srctype: FileType::by_name(src),
                dsttype: FileType::by_name(dst),
                default_cost: cost,
            }) as Box<dyn TranscoderFactory>
        })
        .collect()
}

/// The set of transcoders available for planning, keyed by lowercase name.
pub struct TranscoderRegistry {
    transcoders: HashMap<String, Arc<dyn Transcoder>>,
}

impl std::fmt::Debug for TranscoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscoderRegistry")
            .field("transcoders", &self.transcoders.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TranscoderRegistry {
    /// Builds a registry from `factories`, consulting `settings` for each
    /// factory's options and always including the copy transcoder. Returns an
    /// error if `settings` names a transcoder with no matching factory.
    pub fn build(
        factories: &[Box<dyn TranscoderFactory>],
        settings: &TranscoderSettings,
    ) -> Result<Self, RegistryError> {
        let known: std::collections::HashSet<&str> =
            factories.iter().map(|f| f.name()).collect();
        for configured in settings.all_names() {
            if configured != COPY_TRANSCODER_NAME && !known.contains(configured) {
                return Err(RegistryError::UnknownTranscoder(configured.to_string()));
            }
        }

        let mut transcoders: HashMap<String, Arc<dyn Transcoder>> = HashMap::new();
        transcoders.insert(
            COPY_TRANSCODER_NAME.to_string(),
            Arc::new(CopyTranscoder) as Arc<dyn Transcoder>,
        );

        for factory in factories {
            let options = settings.for_name(factory.name());
            let transcoder = factory.build(&options)?;
            transcoders.insert(factory.name().to_string(), transcoder);
        }

        Ok(TranscoderRegistry { transcoders })
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Transcoder>> {
        self.transcoders.get(name).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Transcoder>)> {
        self.transcoders.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn registry_always_has_copy() {
        let settings = TranscoderSettings::default();
        let registry = TranscoderRegistry::build(&[], &settings).unwrap();
        assert!(registry.get(COPY_TRANSCODER_NAME).is_some());
    }

    #[test]
    fn registry_rejects_settings_for_unknown_transcoder() {
        let mut map = HashMap::new();
        map.insert("nonexistent".to_string(), TranscoderOptions::default());
        let settings = TranscoderSettings::new(map);
        let err = TranscoderRegistry::build(&[], &settings).unwrap_err();
        assert!(matches!(err, RegistryError::UnknownTranscoder(name) if name == "nonexistent"));
    }

    #[test]
    fn registry_builds_configured_external_transcoder() {
        let factories: Vec<Box<dyn TranscoderFactory>> = vec![Box::new(ExternalTranscoderFactory {
            name: "flac_to_wav".to_string(),
            srctype: FileType::by_name("flac"),
            dsttype: FileType::by_name("wav"),
            default_cost: 5,
        })];
        let settings = TranscoderSettings::default();
        let registry = TranscoderRegistry::build(&factories, &settings).unwrap();
        assert!(registry.get("flac_to_wav").is_some());
    }
}
