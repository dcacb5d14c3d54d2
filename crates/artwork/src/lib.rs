//! Album artwork lookup
//!
//! Resolves a cover image URL for the playing track through the Apple Media
//! Services search endpoint, which returns an artwork URL template with
//! `{w}` and `{h}` placeholders.

use ampresence_core::{ArtworkResolver, Config, Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Instant;
use tracing::debug;

pub const SEARCH_BASE_URL: &str = "https://tools.applemediaservices.com/api/apple-media/music";

/// The search endpoint rejects requests that do not look like a browser
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; rv:125.0) Gecko/20100101 Firefox/125.0";

/// Search response, reduced to `songs.data[].attributes.artwork.url`
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    songs: Option<Songs>,
}

#[derive(Debug, Deserialize)]
struct Songs {
    #[serde(default)]
    data: Vec<Song>,
}

#[derive(Debug, Deserialize)]
struct Song {
    attributes: SongAttributes,
}

#[derive(Debug, Deserialize)]
struct SongAttributes {
    artwork: Artwork,
}

#[derive(Debug, Deserialize)]
struct Artwork {
    url: String,
}

pub struct AppleMediaArtwork {
    client: reqwest::Client,
    base_url: String,
    storefront: String,
    size: u32,
}

impl AppleMediaArtwork {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| Error::Config(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: SEARCH_BASE_URL.to_string(),
            storefront: config.storefront.clone(),
            size: config.artwork_size,
        })
    }

    /// Point the resolver at another host serving the same API
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn search_url(&self, query: &str) -> String {
        format!(
            "{}/{}/search.json?types=songs&limit=1&term={}",
            self.base_url.trim_end_matches('/'),
            self.storefront,
            urlencoding::encode(query)
        )
    }
}

/// Substitute the pixel size into an artwork URL template
pub fn expand_template(template: &str, width: u32, height: u32) -> String {
    template
        .replace("{w}", &width.to_string())
        .replace("{h}", &height.to_string())
}

/// Pull the first song's artwork template out of a search response body
fn artwork_template(body: &str, query: &str) -> Result<String> {
    let response: SearchResponse = serde_json::from_str(body).map_err(|e| Error::ArtworkLookupFailed {
        reason: format!("invalid search response: {}", e),
    })?;

    response
        .songs
        .and_then(|songs| songs.data.into_iter().next())
        .map(|song| song.attributes.artwork.url)
        .ok_or_else(|| Error::ArtworkNotFound {
            query: query.to_string(),
        })
}

fn lookup_failed(e: reqwest::Error) -> Error {
    Error::ArtworkLookupFailed { reason: e.to_string() }
}

#[async_trait]
impl ArtworkResolver for AppleMediaArtwork {
    async fn resolve(&self, artist: &str, title: &str, album: &str) -> Result<String> {
        let query = format!("{} {} {}", artist, title, album);
        let url = self.search_url(&query);
        debug!("Looking up artwork: {}", url);

        let started = Instant::now();
        let response = self.client.get(&url).send().await.map_err(lookup_failed)?;
        if !response.status().is_success() {
            return Err(Error::ArtworkLookupFailed {
                reason: format!("search returned status {}", response.status()),
            });
        }
        let body = response.text().await.map_err(lookup_failed)?;
        debug!("Artwork lookup took {:?}", started.elapsed());

        let template = artwork_template(&body, &query)?;
        Ok(expand_template(&template, self.size, self.size))
    }
}
