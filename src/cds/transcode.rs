//! The Transcode Dispatcher (component H): picks a transcoding profile
//! for a (client, item) pair and hands back whichever `IoHandler` should
//! serve the bytes — either a spawned transcoder's output or a direct
//! file handler when conversion doesn't apply.

use std::sync::Arc;
use std::time::Duration;

use crate::cds::clients::{ClientProfile, Quirks};
use crate::cds::io::buffer::BufferHelperConfig;
use crate::cds::io::file::FileIoHandler;
use crate::cds::io::process;
use crate::cds::io::IoHandler;
use crate::config::{TranscodeProfileConfig, TranscodingConfig};

/// Length is unknown for a transcoded stream; `GetFileInfo`-style callers
/// report this literal instead of a byte count.
pub const LENGTH_UNKNOWN: i64 = -1;

#[derive(Debug, Clone)]
pub struct DispatchResult {
    pub mime_type: String,
    pub length: i64,
    pub profile_name: Option<String>,
}

pub struct TranscodeDispatcher {
    config: TranscodingConfig,
}

impl TranscodeDispatcher {
    pub fn new(config: TranscodingConfig) -> Self {
        Self { config }
    }

    fn select_profile(&self, source_mime: &str) -> Option<&TranscodeProfileConfig> {
        self.config.profiles.iter().find(|p| source_mime.starts_with(p.source_mime_prefix.as_str()))
    }

    /// Whether this (config, client) pair should transcode at all — the
    /// config-disabled and per-client `ForceNoConversion` escapes both
    /// fall through to a direct handler.
    pub fn should_transcode(&self, client: &ClientProfile, source_mime: &str) -> bool {
        self.config.enabled
            && !client.quirks.contains(Quirks::FORCE_NO_CONVERSION)
            && self.select_profile(source_mime).is_some()
    }

    /// Builds the serving handler and the metadata overlay (mime/length)
    /// for one item fetch. Falls back to a direct `FileIoHandler` on the
    /// source path whenever transcoding is disabled, forbidden, or no
    /// profile matches.
    pub fn dispatch(
        &self,
        client: &ClientProfile,
        source_path: &str,
        source_mime: &str,
    ) -> (Box<dyn IoHandler>, DispatchResult, Option<u64>) {
        if self.should_transcode(client, source_mime) {
            if let Some(profile) = self.select_profile(source_mime) {
                let handler = self.spawn_handler(profile, source_path);
                return (
                    Box::new(handler),
                    DispatchResult {
                        mime_type: profile.target_mime.clone(),
                        length: LENGTH_UNKNOWN,
                        profile_name: Some(profile.name.clone()),
                    },
                    None,
                );
            }
        }

        (
            Box::new(FileIoHandler::new(source_path)),
            DispatchResult { mime_type: source_mime.to_string(), length: LENGTH_UNKNOWN, profile_name: None },
            None,
        )
    }

    fn spawn_handler(&self, profile: &TranscodeProfileConfig, source_path: &str) -> impl IoHandler {
        let mut args = profile.agent_args.clone();
        if profile.accepts_url_on_stdin {
            // source is fed on stdin by the agent's own stdin-reading loop;
            // nothing to append to argv.
        } else {
            args.push(source_path.to_string());
        }
        let config = BufferHelperConfig {
            capacity: profile.buffer_bytes,
            initial_fill: profile.initial_fill_bytes,
            read_timeout: Duration::from_secs(10),
        };
        process::new_handler(&profile.agent, &args, config)
    }
}

pub fn shared(config: TranscodingConfig) -> Arc<TranscodeDispatcher> {
    Arc::new(TranscodeDispatcher::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str, source_prefix: &str, target: &str) -> TranscodeProfileConfig {
        TranscodeProfileConfig {
            name: name.to_string(),
            source_mime_prefix: source_prefix.to_string(),
            target_mime: target.to_string(),
            agent: "true".to_string(),
            agent_args: Vec::new(),
            buffer_bytes: 4096,
            initial_fill_bytes: 1,
            accepts_url_on_stdin: false,
        }
    }

    #[test]
    fn selects_profile_by_mime_prefix() {
        let dispatcher = TranscodeDispatcher::new(TranscodingConfig {
            enabled: true,
            profiles: vec![profile("flac-to-mp3", "audio/flac", "audio/mpeg")],
        });
        let client = ClientProfile::unknown();
        assert!(dispatcher.should_transcode(&client, "audio/flac"));
        assert!(!dispatcher.should_transcode(&client, "video/mp4"));
    }

    #[test]
    fn disabled_config_never_transcodes() {
        let dispatcher = TranscodeDispatcher::new(TranscodingConfig {
            enabled: false,
            profiles: vec![profile("flac-to-mp3", "audio/flac", "audio/mpeg")],
        });
        let client = ClientProfile::unknown();
        assert!(!dispatcher.should_transcode(&client, "audio/flac"));
    }

    #[test]
    fn force_no_conversion_quirk_overrides_a_matching_profile() {
        let dispatcher = TranscodeDispatcher::new(TranscodingConfig {
            enabled: true,
            profiles: vec![profile("flac-to-mp3", "audio/flac", "audio/mpeg")],
        });
        let mut client = ClientProfile::unknown();
        client.quirks.set(Quirks::FORCE_NO_CONVERSION);
        assert!(!dispatcher.should_transcode(&client, "audio/flac"));
    }

    #[test]
    fn dispatch_reports_unknown_length_and_target_mime_for_a_transcode() {
        let dispatcher = TranscodeDispatcher::new(TranscodingConfig {
            enabled: true,
            profiles: vec![profile("flac-to-mp3", "audio/flac", "audio/mpeg")],
        });
        let client = ClientProfile::unknown();
        let (_, result, _) = dispatcher.dispatch(&client, "/music/song.flac", "audio/flac");
        assert_eq!(result.mime_type, "audio/mpeg");
        assert_eq!(result.length, LENGTH_UNKNOWN);
        assert_eq!(result.profile_name.as_deref(), Some("flac-to-mp3"));
    }

    #[test]
    fn dispatch_falls_back_to_direct_handler_without_a_match() {
        let dispatcher = TranscodeDispatcher::new(TranscodingConfig { enabled: true, profiles: Vec::new() });
        let client = ClientProfile::unknown();
        let (_, result, _) = dispatcher.dispatch(&client, "/music/song.mp3", "audio/mpeg");
        assert_eq!(result.mime_type, "audio/mpeg");
        assert!(result.profile_name.is_none());
    }
}
