//! The Content Directory object model.
//!
//! A `CdsObject` is a tagged variant rather than a class hierarchy:
//! Container/Item share one struct header, and the per-variant payload
//! lives in `CdsObjectKind`.

use std::collections::BTreeMap;

use crate::cds::storage::RES_ID_DENSE_FROM;

pub const ROOT_ID: i64 = 0;
pub const FS_ROOT_ID: i64 = 1;

/// Returns true when `id` is a fixed identity that mutations may never target.
pub fn is_forbidden_mutation_target(id: i64) -> bool {
    id <= FS_ROOT_ID
}

/// A minimal, locally-scoped bitflags implementation — the crate avoids
/// pulling in the `bitflags` dependency for a single seven-bit set.
macro_rules! bitflags_like_flags {
    (
        $(#[$meta:meta])*
        pub struct $name:ident: $repr:ty {
            $(const $variant:ident = $value:expr;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name(pub $repr);

        impl $name {
            $(pub const $variant: $name = $name($value);)*

            pub const fn empty() -> Self {
                $name(0)
            }

            pub fn contains(self, other: $name) -> bool {
                self.0 & other.0 == other.0
            }

            pub fn set(&mut self, other: $name) {
                self.0 |= other.0;
            }

            pub fn clear(&mut self, other: $name) {
                self.0 &= !other.0;
            }

            pub fn bits(self) -> $repr {
                self.0
            }

            pub fn from_bits_truncate(bits: $repr) -> Self {
                $name(bits)
            }
        }

        impl std::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                $name(self.0 | rhs.0)
            }
        }
    };
}

bitflags_like_flags! {
    /// Persisted object flags bitset — values must stay stable across releases.
    pub struct ObjectFlags: u32 {
        const PERSISTENT_CONTAINER = 1 << 0;
        const PLAYLIST_REF         = 1 << 1;
        const ONLINE_SERVICE       = 1 << 2;
        const USE_RESOURCE_REF     = 1 << 3;
        const PROXY_URL            = 1 << 4;
        const CLIENT_ALLOWED       = 1 << 5;
        const CLIENT_DENIED        = 1 << 6;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerType {
    Id3,
    Mp4,
    Ffmpeg,
    Fanart,
    ExternalUrl,
    Thumbnail,
    Subtitle,
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourcePurpose {
    Primary,
    Thumbnail,
    Subtitle,
    Transcode,
}

/// Known resource attribute keys: a fixed enum rather than an open
/// string map, so the storage migration can reconcile one typed column
/// per attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResAttr {
    ProtocolInfo,
    Resolution,
    Bitrate,
    Duration,
    Size,
    ColorDepth,
    BitsPerSample,
    SampleFrequency,
    NrAudioChannels,
    Fanart,
}

impl ResAttr {
    pub fn column_name(self) -> &'static str {
        match self {
            ResAttr::ProtocolInfo => "protocol_info",
            ResAttr::Resolution => "resolution",
            ResAttr::Bitrate => "bitrate",
            ResAttr::Duration => "duration",
            ResAttr::Size => "res_size",
            ResAttr::ColorDepth => "color_depth",
            ResAttr::BitsPerSample => "bits_per_sample",
            ResAttr::SampleFrequency => "sample_frequency",
            ResAttr::NrAudioChannels => "nr_audio_channels",
            ResAttr::Fanart => "fanart",
        }
    }

    /// The DIDL-Lite `<res>` XML attribute name, as it appears on the
    /// wire and as `Self::parse` accepts it in a search criteria's
    /// `res@<attr>` property — distinct from the snake_case
    /// `column_name()` used in storage.
    pub fn xml_attr_name(self) -> &'static str {
        match self {
            ResAttr::ProtocolInfo => "protocolInfo",
            ResAttr::Resolution => "resolution",
            ResAttr::Bitrate => "bitrate",
            ResAttr::Duration => "duration",
            ResAttr::Size => "size",
            ResAttr::ColorDepth => "colorDepth",
            ResAttr::BitsPerSample => "bitsPerSample",
            ResAttr::SampleFrequency => "sampleFrequency",
            ResAttr::NrAudioChannels => "nrAudioChannels",
            ResAttr::Fanart => "fanart",
        }
    }

    pub const ALL: [ResAttr; 10] = [
        ResAttr::ProtocolInfo,
        ResAttr::Resolution,
        ResAttr::Bitrate,
        ResAttr::Duration,
        ResAttr::Size,
        ResAttr::ColorDepth,
        ResAttr::BitsPerSample,
        ResAttr::SampleFrequency,
        ResAttr::NrAudioChannels,
        ResAttr::Fanart,
    ];

    /// Maps a DIDL-Lite `res@` attribute name (as it appears in a search
    /// criteria's `res@protocolInfo` property) to its reconciled column.
    pub fn parse(name: &str) -> Option<ResAttr> {
        match name {
            "protocolInfo" => Some(ResAttr::ProtocolInfo),
            "resolution" => Some(ResAttr::Resolution),
            "bitrate" => Some(ResAttr::Bitrate),
            "duration" => Some(ResAttr::Duration),
            "size" => Some(ResAttr::Size),
            "colorDepth" => Some(ResAttr::ColorDepth),
            "bitsPerSample" => Some(ResAttr::BitsPerSample),
            "sampleFrequency" => Some(ResAttr::SampleFrequency),
            "nrAudioChannels" => Some(ResAttr::NrAudioChannels),
            "fanart" => Some(ResAttr::Fanart),
            _ => None,
        }
    }
}

/// A renderable endpoint of an item — original file, transcoded stream,
/// thumbnail, subtitle track, or cover-art reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub res_id: i32,
    pub handler_type: HandlerType,
    pub purpose: ResourcePurpose,
    pub attributes: BTreeMap<ResAttr, String>,
    pub options: BTreeMap<String, String>,
    pub parameters: BTreeMap<String, String>,
}

impl Resource {
    pub fn new(res_id: i32, handler_type: HandlerType, purpose: ResourcePurpose) -> Self {
        Self {
            res_id,
            handler_type,
            purpose,
            attributes: BTreeMap::new(),
            options: BTreeMap::new(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_attr(mut self, attr: ResAttr, value: impl Into<String>) -> Self {
        self.attributes.insert(attr, value.into());
        self
    }
}

/// Ensures `res_id` values assigned on insert form a dense `[0..n)`
/// sequence.
pub fn renumber_dense(resources: &mut [Resource]) {
    for (i, r) in resources.iter_mut().enumerate() {
        r.res_id = (RES_ID_DENSE_FROM + i) as i32;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CdsObjectKind {
    Container {
        update_id: i64,
        autoscan_attached: bool,
        is_dynamic_folder: bool,
    },
    ItemPure {
        location: String,
    },
    ItemExternalUrl {
        location: String,
    },
    ItemPlaylistRef {
        ref_id: i64,
    },
}

impl CdsObjectKind {
    pub fn has_children(&self) -> bool {
        matches!(self, CdsObjectKind::Container { .. })
    }

    pub fn is_container(&self) -> bool {
        self.has_children()
    }

    pub fn is_external(&self) -> bool {
        matches!(self, CdsObjectKind::ItemExternalUrl { .. })
    }

    pub fn is_playlist_ref(&self) -> bool {
        matches!(self, CdsObjectKind::ItemPlaylistRef { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdsObject {
    pub id: i64,
    pub parent_id: i64,
    pub ref_id: Option<i64>,
    pub upnp_class: String,
    pub dc_title: String,
    pub location: Option<String>,
    pub location_hash: u32,
    pub mime_type: Option<String>,
    pub flags: ObjectFlags,
    pub last_modified: i64,
    pub last_updated: i64,
    pub service_id: Option<String>,
    pub bookmark_pos: i64,
    pub part_number: Option<i32>,
    pub track_number: Option<i32>,
    pub auxdata: BTreeMap<String, String>,
    pub metadata: BTreeMap<String, String>,
    pub resources: Vec<Resource>,
    pub kind: CdsObjectKind,
}

/// Deterministic 32-bit hash of a normalized location string, used as a
/// duplicate-detection key alongside parent id and ref id.
/// FNV-1a: cheap, stable across platforms, no extra crate for one function.
pub fn location_hash(normalized_location: &str) -> u32 {
    let mut hash: u32 = 0x811c9dc5;
    for b in normalized_location.as_bytes() {
        hash ^= *b as u32;
        hash = hash.wrapping_mul(0x01000193);
    }
    hash
}

/// Normalizes a location for hashing/lookup: lowercases the scheme-free
/// prefix, collapses duplicate separators, and strips any trailing slash.
pub fn normalize_location(raw: &str) -> String {
    let replaced = raw.replace('\\', "/");
    let mut collapsed = String::with_capacity(replaced.len());
    let mut last_was_slash = false;
    for c in replaced.chars() {
        if c == '/' {
            if last_was_slash {
                continue;
            }
            last_was_slash = true;
        } else {
            last_was_slash = false;
        }
        collapsed.push(c);
    }
    if collapsed.len() > 1 && collapsed.ends_with('/') {
        collapsed.pop();
    }
    collapsed
}

impl CdsObject {
    pub fn new_container(id: i64, parent_id: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            parent_id,
            ref_id: None,
            upnp_class: "object.container".to_string(),
            dc_title: title.into(),
            location: None,
            location_hash: 0,
            mime_type: None,
            flags: ObjectFlags::empty(),
            last_modified: 0,
            last_updated: 0,
            service_id: None,
            bookmark_pos: 0,
            part_number: None,
            track_number: None,
            auxdata: BTreeMap::new(),
            metadata: BTreeMap::new(),
            resources: Vec::new(),
            kind: CdsObjectKind::Container {
                update_id: 0,
                autoscan_attached: false,
                is_dynamic_folder: false,
            },
        }
    }

    pub fn new_pure_item(id: i64, parent_id: i64, title: impl Into<String>, location: impl Into<String>) -> Self {
        let loc = location.into();
        let norm = normalize_location(&loc);
        Self {
            id,
            parent_id,
            ref_id: None,
            upnp_class: "object.item".to_string(),
            dc_title: title.into(),
            location: Some(loc),
            location_hash: location_hash(&norm),
            mime_type: None,
            flags: ObjectFlags::empty(),
            last_modified: 0,
            last_updated: 0,
            service_id: None,
            bookmark_pos: 0,
            part_number: None,
            track_number: None,
            auxdata: BTreeMap::new(),
            metadata: BTreeMap::new(),
            resources: Vec::new(),
            kind: CdsObjectKind::ItemPure { location: normalize_location(&norm) },
        }
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn add_resource(&mut self, mut resource: Resource) {
        resource.res_id = self.resources.len() as i32;
        self.resources.push(resource);
    }

    pub fn set_aux_data(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.auxdata.insert(key.into(), value.into());
    }

    pub fn set_flag(&mut self, flag: ObjectFlags) {
        self.flags.set(flag);
    }

    pub fn clear_flag(&mut self, flag: ObjectFlags) {
        self.flags.clear(flag);
    }

    pub fn is_virtual(&self) -> bool {
        self.ref_id.is_some() && self.location.is_none()
    }

    pub fn is_reference(&self) -> bool {
        self.ref_id.is_some()
    }

    /// True when the object's own resource set already contains a
    /// handler-produced resource for the given content-type tag (used by
    /// DIDL rendering to decide whether to synthesize an album-art URL).
    pub fn is_meta_resource(&self, tag: HandlerType) -> bool {
        self.resources.iter().any(|r| r.handler_type == tag)
    }

    /// Deep copy that drops identity — used before mutating a template
    /// object into a brand-new insert.
    pub fn clone_without_identity(&self) -> Self {
        let mut copy = self.clone();
        copy.id = 0;
        copy
    }

    /// Structural equality across type, attributes, parameters, and
    /// resources — used by `updateObject`'s diff to decide whether a
    /// write actually changes anything.
    pub fn equals(&self, other: &CdsObject) -> bool {
        self.parent_id == other.parent_id
            && self.ref_id == other.ref_id
            && self.upnp_class == other.upnp_class
            && self.dc_title == other.dc_title
            && self.location == other.location
            && self.mime_type == other.mime_type
            && self.flags == other.flags
            && self.metadata == other.metadata
            && self.resources == other.resources
            && self.kind == other.kind
    }

    /// Fills any field left unset on `self` by inheriting from `reference`.
    /// Used when rendering a `ref_id`-linked pure item that omits its own
    /// class, title, or resources.
    pub fn inherit_from_reference(&mut self, reference: &CdsObject) {
        if self.upnp_class.is_empty() {
            self.upnp_class = reference.upnp_class.clone();
        }
        if self.dc_title.is_empty() {
            self.dc_title = reference.dc_title.clone();
        }
        if self.mime_type.is_none() {
            self.mime_type = reference.mime_type.clone();
        }
        if self.metadata.is_empty() {
            self.metadata = reference.metadata.clone();
        }
        if self.resources.is_empty() || self.flags.contains(ObjectFlags::USE_RESOURCE_REF) {
            self.resources = reference.resources.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_hash_is_deterministic() {
        let a = location_hash(&normalize_location("/music/song.mp3"));
        let b = location_hash(&normalize_location("/music//song.mp3"));
        assert_eq!(a, b);
    }

    #[test]
    fn forbidden_targets_are_root_and_fs_root() {
        assert!(is_forbidden_mutation_target(ROOT_ID));
        assert!(is_forbidden_mutation_target(FS_ROOT_ID));
        assert!(!is_forbidden_mutation_target(2));
    }

    #[test]
    fn dense_renumbering_is_contiguous() {
        let mut resources = vec![
            Resource::new(7, HandlerType::Id3, ResourcePurpose::Primary),
            Resource::new(3, HandlerType::Thumbnail, ResourcePurpose::Thumbnail),
        ];
        renumber_dense(&mut resources);
        assert_eq!(resources[0].res_id, 0);
        assert_eq!(resources[1].res_id, 1);
    }

    #[test]
    fn inherits_absent_fields_from_reference() {
        let mut reference = CdsObject::new_pure_item(2, 1, "Song", "/music/song.mp3");
        reference.mime_type = Some("audio/mpeg".to_string());
        reference.set_metadata("artist", "Adele");

        let mut virt = CdsObject::new_container(3, 1, "");
        virt.upnp_class.clear();
        virt.inherit_from_reference(&reference);

        assert_eq!(virt.upnp_class, "object.item");
        assert_eq!(virt.mime_type.as_deref(), Some("audio/mpeg"));
        assert_eq!(virt.metadata.get("artist").map(String::as_str), Some("Adele"));
    }
}
