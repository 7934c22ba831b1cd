//! axum handlers: decode inbound HTTP/SOAP/GENA requests into the calls
//! `cds::service::CdsService` and friends expect, and render their
//! results back into the wire formats UPnP control points parse.
//!
//! SOAP argument extraction stays at the level of a small tag-text
//! helper rather than a full XML parser — every CDS action argument is a
//! flat, non-nested element inside the SOAP body, so `<Tag>value</Tag>`
//! substring matching covers the entire action set the host needs.

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::cds::clients::ClientProfile;
use crate::cds::error::CdsError;
use crate::cds::io::{IoHandler, ReadOutcome, SeekWhence};
use crate::cds::service::{BrowseFlag, BrowseRequest, SearchRequest};
use crate::error::AppError;
use crate::state::AppState;
use crate::web::xml::{
    base_url, generate_description_xml, generate_media_receiver_registrar_scpd_xml, generate_scpd_xml,
};

pub async fn root_handler() -> &'static str {
    "OpenDLNA Media Server"
}

pub async fn description_handler(State(state): State<AppState>) -> impl IntoResponse {
    let xml = generate_description_xml(&state).await;
    (StatusCode::OK, [(header::CONTENT_TYPE, "text/xml; charset=utf-8")], xml)
}

pub async fn content_directory_scpd() -> impl IntoResponse {
    (StatusCode::OK, [(header::CONTENT_TYPE, "text/xml; charset=utf-8")], generate_scpd_xml())
}

pub async fn media_receiver_registrar_scpd() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/xml; charset=utf-8")],
        generate_media_receiver_registrar_scpd_xml(),
    )
}

/// Pulls the text content of the first `<tag>...</tag>` (or self-closed
/// `<ns:tag>...</ns:tag>`) occurrence out of a SOAP body. Every CDS
/// action argument is a flat leaf element, so this substring search is
/// exact for the documents real control points send.
fn extract_tag(body: &str, tag: &str) -> Option<String> {
    let open_variants = [format!("<{tag}>"), format!("<{tag} ")];
    for open in &open_variants {
        if let Some(start) = body.find(open.as_str()) {
            let content_start = body[start..].find('>').map(|i| start + i + 1)?;
            let close = format!("</{tag}>");
            let end = body[content_start..].find(close.as_str())? + content_start;
            return Some(unescape_xml(&body[content_start..end]));
        }
    }
    None
}

fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn tag_i64(body: &str, tag: &str, default: i64) -> i64 {
    extract_tag(body, tag).and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn tag_string(body: &str, tag: &str) -> String {
    extract_tag(body, tag).unwrap_or_default()
}

fn soap_envelope(action: &str, body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
    <s:Body>
        <u:{action}Response xmlns:u="urn:schemas-upnp-org:service:ContentDirectory:1">
            {body}
        </u:{action}Response>
    </s:Body>
</s:Envelope>"#
    )
}

fn soap_fault(error: &CdsError) -> Response {
    let body = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
    <s:Body>
        <s:Fault>
            <faultcode>s:Client</faultcode>
            <faultstring>UPnPError</faultstring>
            <detail>
                <UPnPError xmlns="urn:schemas-upnp-org:control-1-0">
                    <errorCode>{}</errorCode>
                    <errorDescription>{}</errorDescription>
                </UPnPError>
            </detail>
        </s:Fault>
    </s:Body>
</s:Envelope>"#,
        error.upnp_fault_code(),
        error,
    );
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, "text/xml; charset=utf-8")],
        body,
    )
        .into_response()
}

fn client_ip(headers: &HeaderMap, addr: SocketAddr) -> SocketAddr {
    // Trust X-Forwarded-For only when the host actually sits behind a
    // reverse proxy; for the common direct-connection DMS deployment the
    // socket's own peer address is authoritative.
    let _ = headers;
    addr
}

async fn resolve_client(state: &AppState, headers: &HeaderMap, addr: SocketAddr) -> ClientProfile {
    let user_agent = headers.get(header::USER_AGENT).and_then(|v| v.to_str().ok());
    state.clients.resolve(client_ip(headers, addr).ip(), user_agent).await
}

/// Dispatches every ContentDirectory:1 SOAP action (Browse, Search, the
/// Samsung `X_*` extensions) based on which `<u:Action ...>` element the
/// body carries.
pub async fn content_directory_control(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let client = resolve_client(&state, &headers, addr).await;
    let url = base_url(&state);

    let result = if body.contains("<u:Browse") {
        handle_browse(&state, &body, &client, &url).await
    } else if body.contains("<u:Search") {
        handle_search(&state, &body, &client, &url).await
    } else if body.contains("<u:GetSearchCapabilities") {
        Ok(soap_envelope(
            "GetSearchCapabilities",
            &format!("<SearchCaps>{}</SearchCaps>", state.service.get_search_capabilities()),
        ))
    } else if body.contains("<u:GetSortExtensionCapabilities") {
        Ok(soap_envelope(
            "GetSortExtensionCapabilities",
            &format!("<SortExtensionCaps>{}</SortExtensionCaps>", state.service.get_sort_extension_capabilities()),
        ))
    } else if body.contains("<u:GetSortCapabilities") {
        Ok(soap_envelope(
            "GetSortCapabilities",
            &format!("<SortCaps>{}</SortCaps>", state.service.get_sort_capabilities()),
        ))
    } else if body.contains("<u:GetSystemUpdateID") {
        Ok(soap_envelope("GetSystemUpdateID", &format!("<Id>{}</Id>", state.service.get_system_update_id().await)))
    } else if body.contains("<u:X_GetFeatureList") || body.contains("<u:GetFeatureList") {
        let action = if body.contains("<u:X_GetFeatureList") { "X_GetFeatureList" } else { "GetFeatureList" };
        Ok(soap_envelope(action, &format!("<FeatureList>{}</FeatureList>", state.service.get_feature_list())))
    } else if body.contains("<u:X_SetBookmark") {
        handle_set_bookmark(&state, &body).await
    } else if body.contains("<u:X_GetObjectIDfromIndex") {
        handle_get_object_id_from_index(&state, &body).await
    } else if body.contains("<u:X_GetIndexfromRID") {
        handle_get_index_from_rid(&state, &body).await
    } else {
        return (StatusCode::NOT_IMPLEMENTED, [(header::CONTENT_TYPE, "text/plain; charset=utf-8")], "Not implemented")
            .into_response();
    };

    match result {
        Ok(xml) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/xml; charset=utf-8"), (header::HeaderName::from_static("ext"), "")],
            xml,
        )
            .into_response(),
        Err(e) => soap_fault(&e),
    }
}

async fn handle_browse(
    state: &AppState,
    body: &str,
    client: &ClientProfile,
    base_url: &str,
) -> crate::cds::error::CdsResult<String> {
    let object_id = tag_i64(body, "ObjectID", 0);
    let flag = if tag_string(body, "BrowseFlag") == "BrowseMetadata" { BrowseFlag::Metadata } else { BrowseFlag::DirectChildren };
    let req = BrowseRequest {
        object_id,
        flag,
        starting_index: tag_i64(body, "StartingIndex", 0),
        requested_count: tag_i64(body, "RequestedCount", 0),
        sort_criteria: tag_string(body, "SortCriteria"),
        group: client.group.clone(),
    };
    let result = state.service.browse(req, base_url, client).await?;
    Ok(soap_envelope(
        "Browse",
        &format!(
            "<Result>{}</Result><NumberReturned>{}</NumberReturned><TotalMatches>{}</TotalMatches><UpdateID>{}</UpdateID>",
            xml_escape(&result.result_xml),
            result.number_returned,
            result.total_matches,
            result.update_id,
        ),
    ))
}

async fn handle_search(
    state: &AppState,
    body: &str,
    client: &ClientProfile,
    base_url: &str,
) -> crate::cds::error::CdsResult<String> {
    let req = SearchRequest {
        container_id: tag_i64(body, "ContainerID", 0),
        search_criteria: tag_string(body, "SearchCriteria"),
        starting_index: tag_i64(body, "StartingIndex", 0),
        requested_count: tag_i64(body, "RequestedCount", 0),
        sort_criteria: tag_string(body, "SortCriteria"),
        group: client.group.clone(),
    };
    let result = state.service.search(req, base_url, client).await?;
    Ok(soap_envelope(
        "Search",
        &format!(
            "<Result>{}</Result><NumberReturned>{}</NumberReturned><TotalMatches>{}</TotalMatches><UpdateID>{}</UpdateID>",
            xml_escape(&result.result_xml),
            result.number_returned,
            result.total_matches,
            result.update_id,
        ),
    ))
}

async fn handle_set_bookmark(state: &AppState, body: &str) -> crate::cds::error::CdsResult<String> {
    let object_id = tag_i64(body, "ObjectID", 0);
    let pos = tag_i64(body, "PosSecond", 0);
    let group = extract_tag(body, "CategoryType");
    state.service.x_set_bookmark(object_id, pos, group.as_deref()).await?;
    Ok(soap_envelope("X_SetBookmark", ""))
}

async fn handle_get_object_id_from_index(state: &AppState, body: &str) -> crate::cds::error::CdsResult<String> {
    let parent_id = tag_i64(body, "StorageMedium", 0);
    let index = tag_i64(body, "Index", 0);
    let object_id = state.service.x_get_object_id_from_index(parent_id, index).await?;
    Ok(soap_envelope("X_GetObjectIDfromIndex", &format!("<ObjectID>{object_id}</ObjectID>")))
}

async fn handle_get_index_from_rid(state: &AppState, body: &str) -> crate::cds::error::CdsResult<String> {
    let parent_id = tag_i64(body, "ObjectID", 0);
    let ref_id = tag_i64(body, "RID", 0);
    let index = state.service.x_get_index_from_rid(parent_id, ref_id).await?;
    Ok(soap_envelope("X_GetIndexfromRID", &format!("<Index>{index}</Index>")))
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

/// Every MediaReceiverRegistrar action we bother implementing: Samsung
/// clients only ever poll `IsAuthorized`/`IsValidated` to decide whether
/// to keep talking to us, and both answers are always "yes".
pub async fn media_receiver_registrar_control(body: String) -> Response {
    let action = if body.contains("<u:IsAuthorized") {
        "IsAuthorized"
    } else if body.contains("<u:IsValidated") {
        "IsValidated"
    } else {
        "RegisterDevice"
    };
    let response_body = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
    <s:Body>
        <u:{action}Response xmlns:u="urn:schemas-upnp-org:service:X_MS_MediaReceiverRegistrar:1">
            <Result>1</Result>
        </u:{action}Response>
    </s:Body>
</s:Envelope>"#
    );
    (StatusCode::OK, [(header::CONTENT_TYPE, "text/xml; charset=utf-8")], response_body).into_response()
}

/// Serves `/content/media/{object_id}/{res_id}`, dispatching through the
/// Transcode Dispatcher and honoring byte-range requests against
/// whatever `IoHandler` it hands back.
pub async fn serve_media(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path((object_id, res_id)): Path<(i64, i64)>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let client = resolve_client(&state, &headers, addr).await;
    let obj = state.storage.load_object(object_id).await?;
    let location = obj.location.clone().ok_or(AppError::NotFound)?;
    let _resource = obj.resources.iter().find(|r| r.res_id == res_id).ok_or(AppError::NotFound)?;
    let mime_type = obj.mime_type.clone().unwrap_or_else(|| "application/octet-stream".to_string());

    let file_size = tokio::fs::metadata(&location).await.map(|m| m.len()).ok();
    let (mut handler, dispatch, known_length) = state.transcode.dispatch(&client, &location, &mime_type);
    let length = known_length.or(file_size.filter(|_| dispatch.length != crate::cds::transcode::LENGTH_UNKNOWN));

    handler.open().await?;

    let (start, end) = match (headers.get(header::RANGE), length) {
        (Some(range_header), Some(total)) => {
            let range_str = range_header.to_str().map_err(|_| AppError::InvalidRange)?;
            parse_range_header(range_str, total)?
        }
        _ => (0, length.map(|l| l.saturating_sub(1)).unwrap_or(0)),
    };

    if start > 0 {
        handler.seek(start as i64, SeekWhence::Start).await?;
    }

    let mut response_builder = Response::builder()
        .header(header::CONTENT_TYPE, dispatch.mime_type.clone())
        .header(header::ACCEPT_RANGES, "bytes");

    let status = if let Some(total) = length {
        let len = end - start + 1;
        if len < total {
            response_builder = response_builder.header(header::CONTENT_RANGE, format!("bytes {start}-{end}/{total}"));
            response_builder = response_builder.header(header::CONTENT_LENGTH, len);
            StatusCode::PARTIAL_CONTENT
        } else {
            response_builder = response_builder.header(header::CONTENT_LENGTH, len);
            StatusCode::OK
        }
    } else {
        StatusCode::OK
    };

    let stream = futures_util::stream::try_unfold(handler, |mut handler| async move {
        loop {
            let mut buf = vec![0u8; 64 * 1024];
            match handler.read(&mut buf).await {
                Ok(ReadOutcome::Bytes(n)) => {
                    buf.truncate(n);
                    return Ok(Some((bytes::Bytes::from(buf), handler)));
                }
                Ok(ReadOutcome::Eof) => {
                    let _ = handler.close().await;
                    return Ok(None);
                }
                Ok(ReadOutcome::CheckSocket) => continue,
                Err(e) => return Err(std::io::Error::other(e.to_string())),
            }
        }
    });

    Ok(response_builder.status(status).body(Body::from_stream(stream))?)
}

fn parse_range_header(range_str: &str, file_size: u64) -> Result<(u64, u64), AppError> {
    let range_part = range_str.strip_prefix("bytes=").ok_or(AppError::InvalidRange)?;
    let first_range = range_part.split(',').next().ok_or(AppError::InvalidRange)?;

    if let Some((start_str, end_str)) = first_range.split_once('-') {
        let start = if start_str.is_empty() {
            let suffix_len: u64 = end_str.parse().map_err(|_| AppError::InvalidRange)?;
            if suffix_len >= file_size { 0 } else { file_size - suffix_len }
        } else {
            start_str.parse().map_err(|_| AppError::InvalidRange)?
        };

        let end = if end_str.is_empty() {
            file_size - 1
        } else {
            let parsed_end: u64 = end_str.parse().map_err(|_| AppError::InvalidRange)?;
            parsed_end.min(file_size - 1)
        };

        if start > end || start >= file_size {
            return Err(AppError::InvalidRange);
        }

        Ok((start, end))
    } else {
        Err(AppError::InvalidRange)
    }
}

/// GENA SUBSCRIBE/UNSUBSCRIBE for the ContentDirectory event URL.
pub async fn content_directory_subscribe(
    State(state): State<AppState>,
    headers: HeaderMap,
    method: axum::http::Method,
) -> impl IntoResponse {
    if method.as_str() == "SUBSCRIBE" {
        if let Some(sid_header) = headers.get("SID") {
            // Renewal: re-affirm an existing subscription by SID.
            let sid = sid_header.to_str().unwrap_or("").to_string();
            return (
                StatusCode::OK,
                [
                    (header::HeaderName::from_static("sid"), sid),
                    (header::HeaderName::from_static("timeout"), "Second-1800".to_string()),
                ],
                "",
            )
                .into_response();
        }

        let Some(callback) = headers.get("CALLBACK") else {
            return (StatusCode::BAD_REQUEST, [(header::CONTENT_LENGTH, "0".to_string())], "").into_response();
        };
        let callback_url = callback.to_str().unwrap_or("").trim_start_matches('<').trim_end_matches('>').to_string();
        let sid = format!("uuid:{}", Uuid::new_v4());
        let update_id = state.subscriptions.subscribe(sid.clone(), callback_url).await;

        (
            StatusCode::OK,
            [
                (header::HeaderName::from_static("sid"), sid),
                (header::HeaderName::from_static("timeout"), "Second-1800".to_string()),
            ],
            update_id.to_string(),
        )
            .into_response()
    } else if method.as_str() == "UNSUBSCRIBE" {
        if let Some(sid) = headers.get("SID").and_then(|v| v.to_str().ok()) {
            state.subscriptions.unsubscribe(sid).await;
        }
        (StatusCode::OK, [(header::CONTENT_LENGTH, "0".to_string())], "").into_response()
    } else {
        (StatusCode::METHOD_NOT_ALLOWED, [(header::CONTENT_LENGTH, "0".to_string())], "").into_response()
    }
}
