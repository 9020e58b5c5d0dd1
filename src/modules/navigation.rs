// Pure navigation logic - no storage or document access.
// URL parsing, search substitution and form helpers that can be unit tested.

use std::sync::atomic::{AtomicU64, Ordering};

use url::Url;

use crate::error::StoreError;
use crate::state::{CollectionId, Entity, SearchEngine, QUERY_MARKER};

const FAVICON_SERVICE: &str = "https://favicon.im";

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Builds the search URL for `query` using the engine's `%s` template.
/// Returns `None` for a blank query.
pub fn search_url(engine: &SearchEngine, query: &str) -> Option<String> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return None;
    }
    let q = urlencoding::encode(trimmed);
    Some(engine.target_url_template.replacen(QUERY_MARKER, &q, 1))
}

/// Host name of `url`, retrying with an `https://` prefix for bare domains.
/// Falls back to the input when nothing parses.
pub fn domain_of(url: &str) -> String {
    let trimmed = url.trim();
    if let Ok(u) = Url::parse(trimmed) {
        if let Some(host) = u.host_str() {
            return host.to_string();
        }
    }
    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        if let Ok(u) = Url::parse(&format!("https://{}", trimmed)) {
            if let Some(host) = u.host_str() {
                return host.to_string();
            }
        }
    }
    log::debug!("[Navigation] Could not extract domain from {:?}", url);
    trimmed.to_string()
}

pub fn favicon_url(domain: &str) -> String {
    format!("{}/{}", FAVICON_SERVICE, domain)
}

/// Suggested display name for a url the user typed without a name.
pub fn name_from_url(url: &str) -> String {
    let domain = domain_of(url);
    domain.strip_prefix("www.").unwrap_or(&domain).to_string()
}

/// Turns user input into a navigable site URL.
///
/// 1. Implicit localhost/IP gets http://
/// 2. Input with a known web scheme is kept as-is (normalized)
/// 3. Dotted input without spaces gets https://
pub fn normalize_site_url(input: &str) -> Result<String, StoreError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(StoreError::validation("url is required"));
    }

    let has_scheme_separator = trimmed.contains("://");
    let is_localhost = trimmed.starts_with("localhost") || trimmed.starts_with("127.0.0.1");
    let is_ip = trimmed.parse::<std::net::IpAddr>().is_ok();

    if (is_localhost || is_ip) && !has_scheme_separator {
        if let Ok(u) = Url::parse(&format!("http://{}", trimmed)) {
            return Ok(u.to_string());
        }
    }

    if let Ok(u) = Url::parse(trimmed) {
        // Rejects "github.com:443" style input being read as scheme "github.com"
        if matches!(u.scheme(), "http" | "https" | "file") {
            return Ok(u.to_string());
        }
    }

    if !trimmed.contains(' ') && trimmed.contains('.') && !trimmed.ends_with('.') {
        if let Ok(u) = Url::parse(&format!("https://{}", trimmed)) {
            if u.host().is_some() {
                return Ok(u.to_string());
            }
        }
    }

    Err(StoreError::validation(format!("'{}' is not a valid url", trimmed)))
}

/// Unique-enough id: base36 millisecond timestamp plus a process-local counter.
pub fn generate_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
    let n = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}{}", to_base36(millis), to_base36(n))
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Fields submitted from the add/edit form.
#[derive(Debug, Clone, Default)]
pub struct EntityForm {
    /// Empty for "add", the existing id for "edit".
    pub id: String,
    pub url: String,
    pub name: String,
}

/// Builds a validated entity for `collection` from form input.
///
/// Site urls are normalized; search engine templates are kept verbatim since
/// they carry the query marker.
pub fn entity_from_form(form: &EntityForm, collection: CollectionId) -> Result<Entity, StoreError> {
    let url = match collection {
        CollectionId::Sites => normalize_site_url(&form.url)?,
        CollectionId::SearchEngines => form.url.trim().to_string(),
    };
    let domain = domain_of(&url);
    let name = if form.name.trim().is_empty() {
        name_from_url(&url)
    } else {
        form.name.trim().to_string()
    };
    let id = if form.id.trim().is_empty() {
        generate_id()
    } else {
        form.id.trim().to_string()
    };

    let entity = Entity {
        id,
        display_name: name,
        target_url_template: url,
        icon_url: favicon_url(&domain),
        domain,
    };
    entity.validate(collection)?;
    Ok(entity)
}
