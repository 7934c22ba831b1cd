//! DIDL-Lite rendering: turns a slice of `CdsObject` into the XML
//! fragment that fills a `Browse`/`Search` response's `Result` argument.
//!
//! Namespace declarations and escaping rules vary by client quirk: strict
//! XML clients skip the minimal escaping beyond what XML requires, ASCII
//! XML clients get every non-ASCII character numeric-entity encoded, and
//! the `sec` namespace only appears when a caption-protocol quirk is set.

use crate::cds::clients::Quirks;
use crate::cds::object::{CdsObject, CdsObjectKind, ResAttr, Resource};

fn xml_escape_minimal(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;").replace('\'', "&apos;")
}

fn xml_escape_ascii(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in xml_escape_minimal(s).chars() {
        if ch.is_ascii() {
            out.push(ch);
        } else {
            out.push_str(&format!("&#{};", ch as u32));
        }
    }
    out
}

fn escape(s: &str, quirks: Quirks) -> String {
    if quirks.contains(Quirks::ASCII_XML) {
        xml_escape_ascii(s)
    } else {
        xml_escape_minimal(s)
    }
}

/// Presentation knobs resolved per-request from the client profile and
/// server config (spec §4.D step 4): the effective string-truncation
/// limit and the "mark played items" title decoration.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions<'a> {
    pub quirks: Quirks,
    /// `min(serverStringLimit, clientProfile.stringLimit)`, already
    /// resolved by the caller; `None` means no truncation.
    pub string_limit: Option<usize>,
    pub mark_played: bool,
    /// UPnP classes (or class prefixes) eligible for the played marker.
    pub mark_played_classes: &'a [String],
    pub mark_played_marker: &'a str,
    /// `true` suffixes the title with the marker; `false` prefixes it.
    pub mark_played_append: bool,
}

/// Truncates `s` to at most `limit` characters (char-boundary safe, so
/// multi-byte titles are never split mid-codepoint).
fn truncate_str(s: &str, limit: Option<usize>) -> String {
    match limit {
        Some(limit) if s.chars().count() > limit => s.chars().take(limit).collect(),
        _ => s.to_string(),
    }
}

fn class_is_mark_listed(class: &str, classes: &[String]) -> bool {
    classes.iter().any(|c| class == c || class.starts_with(&format!("{c}.")))
}

/// Applies the "played" title marker when the item has been played
/// (`bookmark_pos > 0`, the only playback signal the object model
/// tracks) and its class is on the configured mark list.
fn apply_mark_played(title: &str, obj: &CdsObject, opts: &RenderOptions) -> String {
    if !opts.mark_played || obj.bookmark_pos <= 0 || !class_is_mark_listed(&obj.upnp_class, opts.mark_played_classes) {
        return title.to_string();
    }
    if opts.mark_played_append {
        format!("{title}{}", opts.mark_played_marker)
    } else {
        format!("{}{title}", opts.mark_played_marker)
    }
}

fn resource_tag(resource: &Resource, base_url: &str, object_id: i64, quirks: Quirks) -> String {
    let protocol_info = resource.attributes.get(&ResAttr::ProtocolInfo).cloned().unwrap_or_default();
    let mut attrs = String::new();
    for (attr, value) in &resource.attributes {
        if *attr == ResAttr::ProtocolInfo {
            continue;
        }
        attrs.push_str(&format!(r#" {}="{}""#, attr.xml_attr_name(), escape(value, quirks)));
    }
    let url = format!("{base_url}/content/media/{object_id}/{}", resource.res_id);
    format!(
        r#"<res protocolInfo="{}"{}>{}</res>"#,
        escape(&protocol_info, quirks),
        attrs,
        escape(&url, quirks)
    )
}

fn render_object(obj: &CdsObject, base_url: &str, opts: &RenderOptions) -> String {
    let title_text = truncate_str(&apply_mark_played(&obj.dc_title, obj, opts), opts.string_limit);
    let title = escape(&title_text, opts.quirks);
    let class = escape(&obj.upnp_class, opts.quirks);

    match &obj.kind {
        CdsObjectKind::Container { update_id, .. } => {
            let child_count = obj.auxdata.get("child_count").map(String::as_str).unwrap_or("0");
            format!(
                r#"<container id="{}" parentID="{}" restricted="1" searchable="1" childCount="{}"><dc:title>{}</dc:title><upnp:class>{}</upnp:class><upnp:updateID>{}</upnp:updateID></container>"#,
                obj.id, obj.parent_id, child_count, title, class, update_id
            )
        }
        _ => {
            let resources: String =
                obj.resources.iter().map(|r| resource_tag(r, base_url, obj.id, opts.quirks)).collect();
            let mut extra = String::new();
            for (key, value) in &obj.metadata {
                if let Some((ns, tag)) = key.split_once(':') {
                    extra.push_str(&format!("<{ns}:{tag}>{}</{ns}:{tag}>", escape(value, opts.quirks)));
                }
            }
            format!(
                r#"<item id="{}" parentID="{}" restricted="1"><dc:title>{}</dc:title><upnp:class>{}</upnp:class>{}{}</item>"#,
                obj.id, obj.parent_id, title, class, extra, resources
            )
        }
    }
}

/// Namespace prefixes always present, plus the conditional `sec`/`pv`
/// ones the caption-protocol quirk adds.
fn didl_open_tag(quirks: Quirks) -> String {
    let mut tag = String::from(
        r#"<DIDL-Lite xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/""#,
    );
    if quirks.contains(Quirks::SAMSUNG) {
        tag.push_str(r#" xmlns:sec="http://www.sec.co.kr/""#);
    }
    if quirks.contains(Quirks::PV_SUBTITLES) {
        tag.push_str(r#" xmlns:pv="http://www.pv.com/pvns/""#);
    }
    tag.push('>');
    tag
}

/// Renders a full `Result` payload: the XML declaration is omitted for
/// clients whose profile sets `blockXmlDeclaration` (tracked here via the
/// `STRICT_XML` quirk, which real strict-XML devices pair with that
/// preference).
pub fn render_didl(objects: &[CdsObject], base_url: &str, opts: RenderOptions) -> String {
    let mut out = String::new();
    if !opts.quirks.contains(Quirks::STRICT_XML) {
        out.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    }
    out.push_str(&didl_open_tag(opts.quirks));
    for obj in objects {
        out.push_str(&render_object(obj, base_url, &opts));
    }
    out.push_str("</DIDL-Lite>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cds::object::{HandlerType, ResourcePurpose};

    fn opts(quirks: Quirks) -> RenderOptions<'static> {
        RenderOptions {
            quirks,
            string_limit: None,
            mark_played: false,
            mark_played_classes: &[],
            mark_played_marker: "*",
            mark_played_append: false,
        }
    }

    #[test]
    fn renders_a_container_with_its_update_id() {
        let obj = CdsObject::new_container(5, 0, "Music");
        let xml = render_didl(std::slice::from_ref(&obj), "http://host:1234", opts(Quirks::empty()));
        assert!(xml.contains(r#"<container id="5" parentID="0""#));
        assert!(xml.contains("<upnp:updateID>0</upnp:updateID>"));
    }

    #[test]
    fn renders_a_container_with_its_computed_child_count() {
        let mut obj = CdsObject::new_container(5, 0, "Music");
        obj.set_aux_data("child_count", "3".to_string());
        let xml = render_didl(std::slice::from_ref(&obj), "http://host:1234", opts(Quirks::empty()));
        assert!(xml.contains(r#"childCount="3""#));
    }

    #[test]
    fn renders_an_item_with_its_resources() {
        let mut obj = CdsObject::new_pure_item(7, 0, "Song", "/music/song.mp3");
        obj.mime_type = Some("audio/mpeg".to_string());
        obj.add_resource(
            Resource::new(0, HandlerType::Id3, ResourcePurpose::Primary)
                .with_attr(ResAttr::ProtocolInfo, "http-get:*:audio/mpeg:*")
                .with_attr(ResAttr::Duration, "0:03:30"),
        );
        let xml = render_didl(std::slice::from_ref(&obj), "http://host:1234", opts(Quirks::empty()));
        assert!(xml.contains(r#"<item id="7" parentID="0""#));
        assert!(xml.contains("http://host:1234/content/media/7/0"));
        assert!(xml.contains(r#"duration="0:03:30""#));
        assert!(xml.contains(r#"protocolInfo="http-get:*:audio/mpeg:*""#));
    }

    #[test]
    fn ascii_xml_quirk_numeric_encodes_non_ascii_titles() {
        let obj = CdsObject::new_container(1, 0, "Café");
        let xml = render_didl(std::slice::from_ref(&obj), "http://host", opts(Quirks::ASCII_XML));
        assert!(xml.contains("Caf&#233;"));
    }

    #[test]
    fn strict_xml_quirk_omits_the_declaration() {
        let obj = CdsObject::new_container(1, 0, "Music");
        let xml = render_didl(std::slice::from_ref(&obj), "http://host", opts(Quirks::STRICT_XML));
        assert!(!xml.starts_with("<?xml"));
    }

    #[test]
    fn title_is_truncated_to_the_effective_string_limit() {
        let obj = CdsObject::new_container(1, 0, "A Rather Long Album Title");
        let mut o = opts(Quirks::empty());
        o.string_limit = Some(5);
        let xml = render_didl(std::slice::from_ref(&obj), "http://host", o);
        assert!(xml.contains("<dc:title>A Rat</dc:title>"));
    }

    #[test]
    fn played_items_on_the_mark_list_get_the_marker_prefixed() {
        let mut obj = CdsObject::new_pure_item(7, 0, "Song", "/music/song.mp3");
        obj.upnp_class = "object.item.audioItem.musicTrack".to_string();
        obj.bookmark_pos = 42;
        let mark_classes = vec!["object.item.audioItem".to_string()];
        let o = RenderOptions {
            quirks: Quirks::empty(),
            string_limit: None,
            mark_played: true,
            mark_played_classes: &mark_classes,
            mark_played_marker: "*",
            mark_played_append: false,
        };
        let xml = render_didl(std::slice::from_ref(&obj), "http://host", o);
        assert!(xml.contains("<dc:title>*Song</dc:title>"));
    }

    #[test]
    fn unplayed_items_are_not_marked() {
        let mut obj = CdsObject::new_pure_item(7, 0, "Song", "/music/song.mp3");
        obj.upnp_class = "object.item.audioItem.musicTrack".to_string();
        let mark_classes = vec!["object.item.audioItem".to_string()];
        let o = RenderOptions {
            quirks: Quirks::empty(),
            string_limit: None,
            mark_played: true,
            mark_played_classes: &mark_classes,
            mark_played_marker: "*",
            mark_played_append: false,
        };
        let xml = render_didl(std::slice::from_ref(&obj), "http://host", o);
        assert!(xml.contains("<dc:title>Song</dc:title>"));
    }
}
