//! Flickr REST client.
//!
//! Only the four read-only methods the downloader needs are wired up:
//! `flickr.photos.search` for paging, and `getInfo`, `getAllContexts` and
//! `getSizes` for per-item metadata. Credentials are passed through as
//! request parameters; obtaining them is left to the caller.

use std::time::Duration;

use chrono::NaiveDateTime;
use flickrdown_logging::flickrdown_trace;
use futures_util::future::try_join3;
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use url::Url;

use crate::{
    ItemId, ItemMeta, MetadataSource, Page, PageFetcher, RemoteError, SizeVariant, Window,
};

pub const DEFAULT_ENDPOINT: &str = "https://api.flickr.com/services/rest/";

/// Layout of Flickr's `taken` timestamps.
pub const FLICKR_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone)]
pub struct FlickrSettings {
    pub endpoint: String,
    pub api_key: String,
    pub auth_token: Option<String>,
    pub user_id: String,
    pub per_page: u32,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl FlickrSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: api_key.into(),
            auth_token: None,
            user_id: "me".to_string(),
            per_page: 100,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FlickrClient {
    http: reqwest::Client,
    settings: FlickrSettings,
}

impl FlickrClient {
    pub fn new(settings: FlickrSettings) -> Result<Self, RemoteError> {
        Url::parse(&settings.endpoint)
            .map_err(|err| RemoteError::Endpoint(format!("{}: {err}", settings.endpoint)))?;
        let http = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| RemoteError::Network(err.to_string()))?;
        Ok(Self { http, settings })
    }

    fn method_url(&self, method: &str, params: &[(&str, String)]) -> Result<Url, RemoteError> {
        let mut url = Url::parse(&self.settings.endpoint)
            .map_err(|err| RemoteError::Endpoint(err.to_string()))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("method", method)
                .append_pair("api_key", &self.settings.api_key)
                .append_pair("format", "json")
                .append_pair("nojsoncallback", "1");
            if let Some(token) = self.settings.auth_token.as_deref() {
                query.append_pair("auth_token", token);
            }
            for (name, value) in params {
                query.append_pair(name, value);
            }
        }
        Ok(url)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<T, RemoteError> {
        let url = self.method_url(method, params)?;
        flickrdown_trace!("Calling {} {:?}", method, params);

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::HttpStatus {
                status: status.as_u16(),
            });
        }
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        decode_response(method, &body)
    }

    pub async fn search(&self, window: &Window, page: u32) -> Result<Page, RemoteError> {
        let (min_upload, max_upload) = upload_date_bounds(window);
        let params = [
            ("user_id", self.settings.user_id.clone()),
            ("min_upload_date", min_upload.to_string()),
            ("max_upload_date", max_upload.to_string()),
            ("page", page.to_string()),
            ("per_page", self.settings.per_page.to_string()),
        ];
        let response: SearchResponse = self.call("flickr.photos.search", &params).await?;
        Ok(Page {
            number: response.photos.page,
            total_pages: response.photos.pages,
            items: response
                .photos
                .photo
                .into_iter()
                .map(|photo| ItemId::new(photo.id))
                .collect(),
        })
    }

    pub async fn metadata(&self, id: &ItemId) -> Result<ItemMeta, RemoteError> {
        let params = [("photo_id", id.as_str().to_string())];
        let (info, contexts, sizes) = try_join3(
            self.call::<InfoResponse>("flickr.photos.getInfo", &params),
            self.call::<ContextsResponse>("flickr.photos.getAllContexts", &params),
            self.call::<SizesResponse>("flickr.photos.getSizes", &params),
        )
        .await?;

        let taken = NaiveDateTime::parse_from_str(&info.photo.dates.taken, FLICKR_DATE_FORMAT)
            .map_err(|err| RemoteError::Decode {
                method: "flickr.photos.getInfo".to_string(),
                message: format!("date taken {:?}: {err}", info.photo.dates.taken),
            })?;

        Ok(ItemMeta {
            id: id.clone(),
            title: info.photo.title.content,
            description: info.photo.description.content,
            taken,
            collections: contexts.set.into_iter().map(|set| set.title).collect(),
            sizes: sizes
                .sizes
                .size
                .into_iter()
                .map(|size| SizeVariant {
                    label: size.label,
                    width: size.width,
                    height: size.height,
                    source: size.source,
                })
                .collect(),
        })
    }
}

#[async_trait::async_trait]
impl PageFetcher for FlickrClient {
    async fn fetch_page(&self, window: &Window, page: u32) -> Result<Page, RemoteError> {
        self.search(window, page).await
    }
}

#[async_trait::async_trait]
impl MetadataSource for FlickrClient {
    async fn fetch_metadata(&self, id: &ItemId) -> Result<ItemMeta, RemoteError> {
        self.metadata(id).await
    }
}

/// Flickr treats both upload bounds as inclusive, so the last second of the
/// half-open window is `to - 1`.
fn upload_date_bounds(window: &Window) -> (i64, i64) {
    let min = window.from.timestamp();
    (min, (window.to.timestamp() - 1).max(min))
}

fn decode_response<T: DeserializeOwned>(method: &str, body: &[u8]) -> Result<T, RemoteError> {
    let decode_error = |err: serde_json::Error| RemoteError::Decode {
        method: method.to_string(),
        message: err.to_string(),
    };
    let value: serde_json::Value = serde_json::from_slice(body).map_err(decode_error)?;
    if value.get("stat").and_then(|stat| stat.as_str()) == Some("fail") {
        let failure: ApiFailure = serde_json::from_value(value).map_err(decode_error)?;
        return Err(RemoteError::Api {
            code: failure.code,
            message: failure.message,
        });
    }
    serde_json::from_value(value).map_err(decode_error)
}

fn map_reqwest_error(err: reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        return RemoteError::Timeout(err.to_string());
    }
    RemoteError::Network(err.to_string())
}

#[derive(Debug, Deserialize)]
struct ApiFailure {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    photos: PhotoList,
}

#[derive(Debug, Deserialize)]
struct PhotoList {
    #[serde(deserialize_with = "lenient_u32")]
    page: u32,
    #[serde(deserialize_with = "lenient_u32")]
    pages: u32,
    #[serde(default)]
    photo: Vec<PhotoRef>,
}

#[derive(Debug, Deserialize)]
struct PhotoRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct InfoResponse {
    photo: PhotoInfo,
}

#[derive(Debug, Deserialize)]
struct PhotoInfo {
    #[serde(default)]
    title: Content,
    #[serde(default)]
    description: Content,
    dates: PhotoDates,
}

#[derive(Debug, Default, Deserialize)]
struct Content {
    #[serde(rename = "_content", default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct PhotoDates {
    taken: String,
}

#[derive(Debug, Deserialize)]
struct ContextsResponse {
    #[serde(default)]
    set: Vec<SetContext>,
}

#[derive(Debug, Deserialize)]
struct SetContext {
    title: String,
}

#[derive(Debug, Deserialize)]
struct SizesResponse {
    sizes: SizeList,
}

#[derive(Debug, Deserialize)]
struct SizeList {
    #[serde(default)]
    size: Vec<SizeEntry>,
}

#[derive(Debug, Deserialize)]
struct SizeEntry {
    label: String,
    #[serde(default, deserialize_with = "lenient_u32")]
    width: u32,
    #[serde(default, deserialize_with = "lenient_u32")]
    height: u32,
    source: String,
}

/// Flickr renders some counters as JSON numbers and others as strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    Text(String),
}

fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => u32::try_from(n).map_err(de::Error::custom),
        NumberOrString::Text(text) => text.trim().parse().map_err(de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_page_accepts_string_counters() {
        let body = br#"{"photos":{"page":"2","pages":3,"perpage":2,"total":"5",
            "photo":[{"id":"11"},{"id":"12"}]},"stat":"ok"}"#;
        let response: SearchResponse = decode_response("flickr.photos.search", body).unwrap();
        assert_eq!(response.photos.page, 2);
        assert_eq!(response.photos.pages, 3);
        assert_eq!(response.photos.photo.len(), 2);
    }

    #[test]
    fn upload_bounds_exclude_the_window_end() {
        let first = Window::day(chrono::NaiveDate::from_ymd_opt(2016, 3, 1).unwrap());
        let second = Window::day(chrono::NaiveDate::from_ymd_opt(2016, 3, 2).unwrap());
        let (first_min, first_max) = upload_date_bounds(&first);
        let (second_min, _) = upload_date_bounds(&second);

        assert_eq!(first_min, 1_456_790_400);
        assert_eq!(first_max, 1_456_876_799);
        assert_eq!(second_min, first_max + 1);
    }

    #[test]
    fn failed_stat_becomes_api_error() {
        let body = br#"{"stat":"fail","code":98,"message":"Invalid auth token"}"#;
        let err = decode_response::<SearchResponse>("flickr.photos.search", body).unwrap_err();
        assert_eq!(
            err,
            RemoteError::Api {
                code: 98,
                message: "Invalid auth token".to_string()
            }
        );
    }

    #[test]
    fn garbage_body_is_decode_error() {
        let err = decode_response::<SearchResponse>("flickr.photos.search", b"<html>").unwrap_err();
        assert!(matches!(err, RemoteError::Decode { .. }));
    }
}
