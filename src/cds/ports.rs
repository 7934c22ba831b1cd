//! External service ports (component I): the three seams the core
//! exposes to collaborators it otherwise stays blind to — metadata
//! extraction, scripted virtual-object layout, and the host UPnP/HTTP
//! library. Concrete tag/ffmpeg probing is out of scope; this crate
//! ships one minimal extractor (extension/MIME sniffing) to exercise
//! the port end to end.

use std::path::Path;

use async_trait::async_trait;

use crate::cds::error::CdsResult;
use crate::cds::io::IoHandler;
use crate::cds::object::{CdsObject, Resource};

/// `bool fillMetadata(obj)` plus an optional virtual-resource server for
/// extractors that synthesize content (e.g. a thumbnail) rather than
/// pointing at an on-disk resource.
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    fn name(&self) -> &str;
    fn enabled(&self) -> bool;
    /// Declares which `(media type prefix, content type)` pairs this
    /// extractor handles, used to decide whether it's worth invoking.
    fn handles(&self) -> &[(&'static str, &'static str)];
    async fn fill_metadata(&self, obj: &mut CdsObject) -> CdsResult<bool>;
    async fn serve_content(&self, _obj: &CdsObject, _resource: &Resource) -> CdsResult<Option<Box<dyn IoHandler>>> {
        Ok(None)
    }
}

/// An embedded script's view of the tree: `addObject`/`updateObject`
/// primitives it may call while laying out virtual objects for a
/// scanned physical item. The core never parses or runs the scripting
/// language itself.
#[async_trait]
pub trait ScriptingLayout: Send + Sync {
    async fn layout(&self, source: &CdsObject) -> CdsResult<Vec<CdsObject>>;
}

/// Synchronous callbacks the host UPnP/HTTP library drives (SOAP
/// action, subscription accept, file serve) plus the one asynchronous
/// outbound call (notify). The core does not parse HTTP or SOAP framing.
#[async_trait]
pub trait UpnpHost: Send + Sync {
    async fn notify(&self, sid: &str, body: &str) -> CdsResult<()>;
}

/// Extension/MIME-sniffing only, matching `platform::filesystem`'s
/// lookup table — no tag or container probing.
pub struct BasicMimeExtractor {
    handled: Vec<(&'static str, &'static str)>,
}

impl Default for BasicMimeExtractor {
    fn default() -> Self {
        Self { handled: vec![("audio/", "audio"), ("video/", "video"), ("image/", "image")] }
    }
}

#[async_trait]
impl MetadataExtractor for BasicMimeExtractor {
    fn name(&self) -> &str {
        "basic-mime"
    }

    fn enabled(&self) -> bool {
        true
    }

    fn handles(&self) -> &[(&'static str, &'static str)] {
        &self.handled
    }

    async fn fill_metadata(&self, obj: &mut CdsObject) -> CdsResult<bool> {
        let Some(location) = obj.location.clone() else {
            return Ok(false);
        };
        let extension = Path::new(&location).extension().and_then(|e| e.to_str()).unwrap_or_default();
        let mime = crate::platform::filesystem::get_mime_type_for_extension(extension);
        let changed = obj.mime_type.as_deref() != Some(mime.as_str());
        obj.mime_type = Some(mime);
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cds::object::CdsObject;

    #[tokio::test]
    async fn fills_mime_type_from_extension() {
        let extractor = BasicMimeExtractor::default();
        let mut obj = CdsObject::new_pure_item(10, 0, "Song", "/music/song.mp3");
        assert!(extractor.fill_metadata(&mut obj).await.unwrap());
        assert_eq!(obj.mime_type.as_deref(), Some("audio/mpeg"));
    }

    #[tokio::test]
    async fn leaves_containers_without_a_location_untouched() {
        let extractor = BasicMimeExtractor::default();
        let mut obj = CdsObject::new_container(5, 0, "Music");
        assert!(!extractor.fill_metadata(&mut obj).await.unwrap());
        assert!(obj.mime_type.is_none());
    }
}
