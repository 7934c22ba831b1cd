//! The host-side `NotifySink`: delivers GENA NOTIFY requests for the
//! Subscription Bus over plain HTTP, the way a subscribed control point
//! expects them framed.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::cds::subscription::NotifySink;

pub struct HttpNotifySink {
    client: reqwest::Client,
}

impl HttpNotifySink {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

impl Default for HttpNotifySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotifySink for HttpNotifySink {
    async fn notify(&self, callback_url: &str, sid: &str, seq: u32, system_update_id: i64, container_update_ids: &str) {
        let body = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">
    <e:property>
        <SystemUpdateID>{system_update_id}</SystemUpdateID>
    </e:property>
    <e:property>
        <ContainerUpdateIDs>{container_update_ids}</ContainerUpdateIDs>
    </e:property>
</e:propertyset>"#
        );

        let method = reqwest::Method::from_bytes(b"NOTIFY").expect("NOTIFY is a valid HTTP method token");
        let result = self
            .client
            .request(method, callback_url)
            .header("CONTENT-TYPE", "text/xml; charset=\"utf-8\"")
            .header("NT", "upnp:event")
            .header("NTS", "upnp:propchange")
            .header("SID", sid)
            .header("SEQ", seq.to_string())
            .body(body)
            .send()
            .await;

        match result {
            Ok(response) => debug!(%callback_url, sid, status = %response.status(), "sent GENA notify"),
            Err(e) => warn!(%callback_url, sid, error = %e, "failed to deliver GENA notify"),
        }
    }
}
