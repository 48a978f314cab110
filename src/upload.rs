//! Canvas file uploads.
//!
//! Uploading is a three step exchange: ask Canvas for an upload ticket,
//! POST the file together with the ticket's parameters to the returned
//! `upload_url` (without credentials, it may be a storage bucket), then
//! confirm through the redirect Canvas answers with.

use crate::client::{create_rest_client, create_upload_client};
use crate::dto::{from_params, ApiDto, Param};
use crate::error::{CanvasError, Result};
use crate::response::Response;
use crate::rest::{CanvasClient, RequestDescriptor};
use reqwest::blocking::multipart::{Form, Part};
use reqwest::header::{ACCEPT, LOCATION};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;
use url::Url;

/// Progress callback function type, called with the number of bytes sent
pub type UploadProgressFn = Box<dyn Fn(u64) + Send + Sync>;

/// Upload ticket request, e.g. for `POST /courses/:course_id/files`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileUploadDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Filled from the reader when left unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_folder_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_folder_path: Option<String>,
    /// "overwrite" or "rename"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_duplicate: Option<String>,
}

impl FileUploadDto {
    pub fn new(name: impl Into<String>) -> Self {
        FileUploadDto {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn from_params(params: Param) -> Result<Self> {
        from_params(params)
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

impl ApiDto for FileUploadDto {
    fn api_property_name(&self) -> &'static str {
        ""
    }

    fn validate(&self) -> Result<()> {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => Ok(()),
            _ => Err(CanvasError::InvalidArgument("file name is required".to_string())),
        }
    }
}

/// Ticket returned by step one
#[derive(Debug, Deserialize)]
struct UploadTicket {
    upload_url: String,
    #[serde(default)]
    upload_params: Map<String, Value>,
    #[serde(default)]
    file_param: Option<String>,
}

/// Upload a file to a Canvas file endpoint and return the confirmed file object
///
/// # Arguments
/// * `client` - Canvas client used for the authenticated steps
/// * `path` - File endpoint, e.g. `courses/1/files` or `users/self/files`
/// * `dto` - File metadata
/// * `reader` - File content
/// * `progress` - Optional progress callback, called with the total bytes sent so far
pub fn upload<R>(
    client: &CanvasClient,
    path: &str,
    mut dto: FileUploadDto,
    mut reader: R,
    progress: Option<UploadProgressFn>,
) -> Result<Response>
where
    R: Read + Seek + Send + 'static,
{
    let size = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;
    if dto.size.is_none() {
        dto.size = Some(size);
    }

    let progress = progress.map(Arc::new);

    // Step 1: upload ticket
    let ticket: UploadTicket = client.request(&RequestDescriptor::post(path).multipart(&dto)?)?;
    tracing::debug!(upload_url = %ticket.upload_url, size, "received upload ticket");
    if let Some(ref progress) = progress {
        progress(0);
    }

    // Step 2: send the file
    let upload_url = Url::parse(&ticket.upload_url)?;
    let reader = ProgressReader::new(reader, progress);
    let form = upload_form(&ticket, &dto, reader, size)?;
    let http_response = create_upload_client(client.config())?
        .post(upload_url.clone())
        .multipart(form)
        .send()
        .map_err(CanvasError::transport)?;

    let status = http_response.status();
    let headers = http_response.headers().clone();
    let body = http_response.bytes().map_err(CanvasError::transport)?.to_vec();
    tracing::debug!(status = status.as_u16(), "uploaded file content");

    if !status.is_success() && !status.is_redirection() {
        return Err(CanvasError::from_response(status, &headers, &body, false));
    }

    let location = headers
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(|l| upload_url.join(l))
        .transpose()?;

    // Step 3: confirm
    match location {
        Some(location) if status.is_redirection() || body.iter().all(u8::is_ascii_whitespace) => {
            confirm(client, location)
        }
        _ if status.is_success() => Ok(Response::new(status, headers, body)),
        _ => Err(CanvasError::api(
            "upload redirect without a Location header",
            Some(status.as_u16()),
        )),
    }
}

/// Follow the confirmation URL; credentials are only sent to the Canvas instance itself
fn confirm(client: &CanvasClient, location: Url) -> Result<Response> {
    if client.config().is_instance_url(&location)? {
        return client.execute(&RequestDescriptor::get(location.to_string()));
    }

    tracing::debug!(
        origin = %location.origin().ascii_serialization(),
        "confirming upload off-instance"
    );
    let http_response = create_rest_client(client.config())?
        .get(location)
        .header(ACCEPT, "application/json")
        .send()
        .map_err(CanvasError::transport)?;

    let status = http_response.status();
    let headers = http_response.headers().clone();
    let body = http_response.bytes().map_err(CanvasError::transport)?.to_vec();
    if !status.is_success() {
        return Err(CanvasError::from_response(status, &headers, &body, false));
    }
    Ok(Response::new(status, headers, body))
}

fn upload_form<R>(ticket: &UploadTicket, dto: &FileUploadDto, reader: R, size: u64) -> Result<Form>
where
    R: Read + Send + 'static,
{
    // the storage backend expects the ticket parameters first, file last
    let mut form = ticket
        .upload_params
        .iter()
        .fold(Form::new(), |form, (key, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            form.text(key.clone(), text)
        });

    let mut part =
        Part::reader_with_length(reader, size).file_name(dto.name.clone().unwrap_or_default());
    if let Some(content_type) = dto.content_type.as_deref() {
        part = part.mime_str(content_type).map_err(|e| {
            CanvasError::InvalidArgument(format!("invalid content type {:?}: {}", content_type, e))
        })?;
    }
    let field = ticket.file_param.clone().unwrap_or_else(|| "file".to_string());
    form = form.part(field, part);

    Ok(form)
}

/// Reader reporting the running byte count as the HTTP client pulls the body
struct ProgressReader<R> {
    inner: R,
    sent: u64,
    progress: Option<Arc<UploadProgressFn>>,
}

impl<R: Read> ProgressReader<R> {
    fn new(inner: R, progress: Option<Arc<UploadProgressFn>>) -> Self {
        ProgressReader {
            inner,
            sent: 0,
            progress,
        }
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.sent += n as u64;
            if let Some(ref progress) = self.progress {
                progress(self.sent);
            }
        }
        Ok(n)
    }
}
