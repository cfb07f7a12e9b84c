//! src/services/blob_client.rs
//!
//! BlobClient: Azure Blob Storage access through a SAS URL. The SAS query
//! string carries the credential, so requests only need the API version header.
//! Uploads are staged as block blobs: the incoming stream is cut into
//! fixed-size blocks, each sent with Put Block, then committed with Put Block
//! List, which replaces any blob of the same name.

use crate::{
    errors::{ClientError, ClientResult},
    models::blob::BlobDescriptor,
    services::{ByteStream, ContainerStatus, ObjectDestination},
};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

const SERVICE: &str = "blob";
const API_VERSION: &str = "2023-11-03";
const CONTAINER_EXISTS_CODE: &str = "ContainerAlreadyExists";

pub const DEFAULT_BLOCK_SIZE: usize = 8 * 1024 * 1024;

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EnumerationResults {
    #[serde(default)]
    blobs: BlobItems,
    #[serde(default)]
    next_marker: Option<String>,
}

#[derive(Deserialize, Default)]
struct BlobItems {
    #[serde(rename = "Blob", default)]
    items: Vec<BlobItem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BlobItem {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StorageErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

pub struct BlobClient {
    http: Client,
    /// Account endpoint including the SAS query string.
    service_url: Url,
    block_size: usize,
}

impl BlobClient {
    pub fn new(http: Client, sas_url: &Url) -> Self {
        Self {
            http,
            service_url: sas_url.clone(),
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    /// A container-scoped SAS URL already ends with the container name.
    fn container_url(&self, container: &str) -> ClientResult<Url> {
        let mut url = self.service_url.clone();
        let scoped = url
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .is_some_and(|last| last == container);
        if !scoped {
            url.path_segments_mut()
                .map_err(|_| ClientError::Decode("SAS URL cannot carry a path".into()))?
                .pop_if_empty()
                .push(container);
        }
        Ok(url)
    }

    /// Blob names keep their `/` separators as path segments. Dot segments
    /// would be collapsed by URL normalization, so they are refused.
    fn blob_url(&self, container: &str, name: &str) -> ClientResult<Url> {
        if name.split('/').any(|segment| segment == "." || segment == "..") {
            return Err(ClientError::InvalidBlobName(name.to_string()));
        }
        let mut url = self.container_url(container)?;
        url.path_segments_mut()
            .map_err(|_| ClientError::Decode("SAS URL cannot carry a path".into()))?
            .extend(name.split('/'));
        Ok(url)
    }

    async fn put_block(&self, blob_url: &Url, block_id: &str, data: Bytes) -> ClientResult<()> {
        let url = with_query(blob_url, &[("comp", "block"), ("blockid", block_id)]);
        let resp = self
            .http
            .put(url)
            .header("x-ms-version", API_VERSION)
            .header("content-type", "application/octet-stream")
            .body(data)
            .send()
            .await
            .map_err(ClientError::http(SERVICE))?;
        check_status(resp).await?;
        Ok(())
    }

    async fn put_block_list(&self, blob_url: &Url, block_ids: &[String]) -> ClientResult<()> {
        let url = with_query(blob_url, &[("comp", "blocklist")]);
        let resp = self
            .http
            .put(url)
            .header("x-ms-version", API_VERSION)
            .header("content-type", "application/xml")
            .body(block_list_xml(block_ids))
            .send()
            .await
            .map_err(ClientError::http(SERVICE))?;
        check_status(resp).await?;
        Ok(())
    }
}

#[async_trait]
impl ObjectDestination for BlobClient {
    async fn ensure_container(&self, container: &str) -> ClientResult<ContainerStatus> {
        let url = with_query(&self.container_url(container)?, &[("restype", "container")]);
        let resp = self
            .http
            .put(url)
            .header("x-ms-version", API_VERSION)
            .header("content-length", "0")
            .send()
            .await
            .map_err(ClientError::http(SERVICE))?;

        if resp.status() == StatusCode::CONFLICT {
            let header_code = resp
                .headers()
                .get("x-ms-error-code")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let err = remote_error(resp).await;
            let exists = match (&header_code, &err) {
                (Some(code), _) => code == CONTAINER_EXISTS_CODE,
                (None, ClientError::Remote { message, .. }) => {
                    message.contains(CONTAINER_EXISTS_CODE)
                        || message.contains("already exists")
                }
                _ => false,
            };
            return if exists {
                Ok(ContainerStatus::AlreadyExisted)
            } else {
                Err(err)
            };
        }

        check_status(resp).await?;
        Ok(ContainerStatus::Created)
    }

    async fn list_blobs(&self, container: &str) -> ClientResult<Vec<BlobDescriptor>> {
        let container_url = self.container_url(container)?;
        let mut blobs = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut params = vec![("restype", "container"), ("comp", "list")];
            if let Some(m) = marker.as_deref() {
                params.push(("marker", m));
            }

            let resp = self
                .http
                .get(with_query(&container_url, &params))
                .header("x-ms-version", API_VERSION)
                .send()
                .await
                .map_err(ClientError::http(SERVICE))?;
            let body = check_status(resp)
                .await?
                .text()
                .await
                .map_err(ClientError::http(SERVICE))?;

            let page: EnumerationResults =
                serde_xml_rs::from_str(body.trim_start_matches('\u{feff}'))
                    .map_err(|e| ClientError::Decode(format!("blob listing: {}", e)))?;
            debug!("Blob listing page returned {} blobs", page.blobs.items.len());
            blobs.extend(page.blobs.items.into_iter().map(|b| BlobDescriptor::new(b.name)));

            match page.next_marker {
                Some(next) if !next.trim().is_empty() => marker = Some(next),
                _ => break,
            }
        }

        Ok(blobs)
    }

    async fn upload(&self, container: &str, name: &str, mut stream: ByteStream) -> ClientResult<()> {
        let url = self.blob_url(container, name)?;
        let upload_id = Uuid::new_v4().simple().to_string();
        let mut block_ids: Vec<String> = Vec::new();
        let mut buffer = BytesMut::new();

        while let Some(chunk) = stream.next().await {
            let mut chunk = chunk?;
            while !chunk.is_empty() {
                let take = (self.block_size - buffer.len()).min(chunk.len());
                buffer.extend_from_slice(&chunk.split_to(take));
                if buffer.len() == self.block_size {
                    let id = block_id(&upload_id, block_ids.len());
                    self.put_block(&url, &id, buffer.split().freeze()).await?;
                    block_ids.push(id);
                }
            }
        }
        if !buffer.is_empty() {
            let id = block_id(&upload_id, block_ids.len());
            self.put_block(&url, &id, buffer.freeze()).await?;
            block_ids.push(id);
        }

        self.put_block_list(&url, &block_ids).await?;
        debug!("Committed {} blocks to {}/{}", block_ids.len(), container, name);
        Ok(())
    }
}

/// Block ids must share one length within a blob; the index is zero-padded.
fn block_id(upload_id: &str, index: usize) -> String {
    general_purpose::STANDARD.encode(format!("{}-{:06}", upload_id, index))
}

fn block_list_xml(block_ids: &[String]) -> String {
    let mut xml = String::from(r#"<?xml version="1.0" encoding="utf-8"?><BlockList>"#);
    for id in block_ids {
        xml.push_str(&format!("<Latest>{}</Latest>", id));
    }
    xml.push_str("</BlockList>");
    xml
}

fn with_query(url: &Url, pairs: &[(&str, &str)]) -> Url {
    let mut url = url.clone();
    url.query_pairs_mut().extend_pairs(pairs);
    url
}

async fn check_status(resp: Response) -> ClientResult<Response> {
    if resp.status().is_success() {
        Ok(resp)
    } else {
        Err(remote_error(resp).await)
    }
}

async fn remote_error(resp: Response) -> ClientError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    let message = serde_xml_rs::from_str::<StorageErrorBody>(body.trim_start_matches('\u{feff}'))
        .ok()
        .and_then(|e| match (e.code.is_empty(), e.message.is_empty()) {
            (_, false) => Some(e.message.lines().next().unwrap_or_default().to_string()),
            (false, true) => Some(e.code),
            (true, true) => None,
        })
        .unwrap_or_else(|| body.trim().to_string());
    ClientError::Remote {
        service: SERVICE,
        status,
        message,
    }
}
