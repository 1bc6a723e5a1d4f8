// Google Docs / Drive REST transport.
//
// Documents are read and mutated through the Docs v1 API; the backing
// document is tagged and found through Drive v3 app properties.

use marginalia_common::document::request::Request;
use marginalia_common::document::Document;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use super::{DocumentTransport, FileRef, TransportError};
use crate::config::StoreConfig;

/// App property key under which the database property string is stored.
const PROPERTY_KEY: &str = "marginalia";

pub struct GoogleDocsTransport {
    http: Client,
    docs_base: Url,
    drive_base: Url,
    token: String,
}

impl GoogleDocsTransport {
    pub fn new(config: &StoreConfig) -> Result<Self, TransportError> {
        let token = config
            .access_token
            .clone()
            .ok_or_else(|| TransportError::Auth("no access token configured".into()))?;
        let http = Client::builder().timeout(config.request_timeout()).build()?;
        Ok(Self {
            http,
            docs_base: parse_base(&config.docs_api_base)?,
            drive_base: parse_base(&config.drive_api_base)?,
            token,
        })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, TransportError> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(classify(status, message))
    }
}

fn parse_base(raw: &str) -> Result<Url, TransportError> {
    Url::parse(raw)
        .map_err(|error| TransportError::Decode(format!("invalid api base {raw:?}: {error}")))
}

fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, TransportError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| TransportError::Decode(format!("api base cannot carry a path: {base}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Map a failed response onto the error the store reasons about.
fn classify(status: StatusCode, message: String) -> TransportError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TransportError::Auth(message),
        StatusCode::BAD_REQUEST if is_revision_mismatch(&message) => TransportError::StaleRevision,
        _ => TransportError::Http {
            status: status.as_u16(),
            message,
        },
    }
}

/// The service's answer to a write whose required revision is no longer current.
fn is_revision_mismatch(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("required revision id") && message.contains("does not match")
}

/// Drive query matching files tagged with `property`.
fn property_query(property: &str) -> String {
    let escaped = property.replace('\\', "\\\\").replace('\'', "\\'");
    let clause = format!("key='{PROPERTY_KEY}' and value='{escaped}'");
    format!("appProperties has {{ {clause} }} and trashed = false")
}

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileRef>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedDocument {
    document_id: String,
    #[serde(default)]
    title: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchUpdate<'a> {
    requests: &'a [Request],
    #[serde(skip_serializing_if = "Option::is_none")]
    write_control: Option<WriteControl<'a>>,
}

#[derive(Serialize)]
struct WriteControl<'a> {
    #[serde(rename = "requiredRevisionId")]
    revision: &'a str,
}

impl DocumentTransport for GoogleDocsTransport {
    async fn signed_in(&self) -> Result<bool, TransportError> {
        let url = endpoint(&self.drive_base, &["about"])?;
        let request = self.http.get(url).query(&[("fields", "user")]);
        match self.send(request).await {
            Ok(_) => Ok(true),
            Err(TransportError::Auth(message)) => {
                info!(%message, "credentials rejected");
                Ok(false)
            }
            Err(error) => Err(error),
        }
    }

    async fn fetch_document(&self, id: &str) -> Result<Document, TransportError> {
        let url = endpoint(&self.docs_base, &["documents", id])?;
        debug!(document = %id, "fetching document");
        let document: Document = self.send(self.http.get(url)).await?.json().await?;
        Ok(document)
    }

    async fn search_by_property(&self, property: &str) -> Result<Vec<FileRef>, TransportError> {
        let url = endpoint(&self.drive_base, &["files"])?;
        let query = property_query(property);
        let params = [("q", query.as_str()), ("fields", "files(id,name)")];
        let response = self.send(self.http.get(url).query(&params)).await?;
        let list: FileList = response.json().await?;
        debug!(%property, found = list.files.len(), "searched for backing document");
        Ok(list.files)
    }

    async fn create_document(&self, title: &str) -> Result<FileRef, TransportError> {
        let url = endpoint(&self.docs_base, &["documents"])?;
        let body = serde_json::json!({ "title": title });
        let response = self.send(self.http.post(url).json(&body)).await?;
        let created: CreatedDocument = response.json().await?;
        info!(document = %created.document_id, %title, "created backing document");
        Ok(FileRef {
            id: created.document_id,
            name: created.title,
        })
    }

    async fn set_property(&self, id: &str, property: &str) -> Result<(), TransportError> {
        let url = endpoint(&self.drive_base, &["files", id])?;
        let body = serde_json::json!({ "appProperties": { PROPERTY_KEY: property } });
        self.send(self.http.patch(url).json(&body)).await?;
        Ok(())
    }

    async fn apply_mutations(
        &self,
        id: &str,
        revision: Option<&str>,
        requests: &[Request],
    ) -> Result<(), TransportError> {
        let action = format!("{id}:batchUpdate");
        let url = endpoint(&self.docs_base, &["documents", action.as_str()])?;
        let body = BatchUpdate {
            requests,
            write_control: revision.map(|revision| WriteControl { revision }),
        };
        debug!(document = %id, requests = requests.len(), ?revision, "applying mutations");
        self.send(self.http.post(url).json(&body)).await?;
        Ok(())
    }
}
