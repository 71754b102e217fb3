// crates/homestead-core/src/listing.rs

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::crypto;
use crate::error::HomesteadError;

/// Fields every listing must carry to count as complete in tier 2.
pub const REQUIRED_FIELDS: [&str; 6] = [
    "listing_id",
    "address",
    "price",
    "property_type",
    "listing_status",
    "source_url",
];

/// One scraped property record.
///
/// Every field is optional at the type level so that a listing with gaps
/// still parses; completeness is judged by the quality tier, not by serde.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    /// Stable identifier assigned by the source site.
    #[serde(default)]
    pub listing_id: Option<String>,
    /// Street address, usually including city, state and zipcode.
    #[serde(default)]
    pub address: Option<String>,
    /// Explicit zipcode, if the scraper extracted one.
    #[serde(default)]
    pub zipcode: Option<String>,
    /// Listing or sale price in USD.
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub bedrooms: Option<f64>,
    #[serde(default)]
    pub bathrooms: Option<f64>,
    /// Living area in square feet.
    #[serde(default)]
    pub living_area_sqft: Option<f64>,
    /// e.g. "SINGLE_FAMILY", "CONDO".
    #[serde(default)]
    pub property_type: Option<String>,
    /// e.g. "FOR_SALE", "SOLD", "PENDING".
    #[serde(default)]
    pub listing_status: Option<String>,
    #[serde(default)]
    pub days_on_market: Option<u32>,
    /// URL the listing was scraped from.
    #[serde(default)]
    pub source_url: Option<String>,
    /// When the miner scraped the listing.
    #[serde(default)]
    pub scraped_at: Option<DateTime<Utc>>,
}

/// The subset of listing fields that define its content for duplicate
/// detection. Field order is fixed by declaration order.
#[derive(Serialize)]
struct ContentFields<'a> {
    listing_id: Option<&'a str>,
    address: Option<&'a str>,
    zipcode: Option<&'a str>,
    price: Option<f64>,
    bedrooms: Option<f64>,
    bathrooms: Option<f64>,
    living_area_sqft: Option<f64>,
    property_type: Option<&'a str>,
    listing_status: Option<&'a str>,
    days_on_market: Option<u32>,
}

fn zipcode_regex() -> &'static Regex {
    static ZIP_RE: OnceLock<Regex> = OnceLock::new();
    ZIP_RE.get_or_init(|| Regex::new(r"\b(\d{5})(?:-\d{4})?\b").expect("static zipcode regex"))
}

/// Treat empty and whitespace-only strings as absent.
fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl Listing {
    /// SHA-256 hex digest over the listing's content fields.
    ///
    /// `source_url` and `scraped_at` are excluded: the same property scraped
    /// twice from two URLs is still the same content.
    pub fn content_hash(&self) -> String {
        let fields = ContentFields {
            listing_id: present(&self.listing_id),
            address: present(&self.address),
            zipcode: present(&self.zipcode),
            price: self.price,
            bedrooms: self.bedrooms,
            bathrooms: self.bathrooms,
            living_area_sqft: self.living_area_sqft,
            property_type: present(&self.property_type),
            listing_status: present(&self.listing_status),
            days_on_market: self.days_on_market,
        };
        // Serializing a struct of plain options cannot fail.
        let bytes = serde_json::to_vec(&fields).unwrap_or_default();
        crypto::sha256_hex(&bytes)
    }

    /// Normalized form of the source URL used for duplicate detection.
    ///
    /// Lowercases scheme and host, strips a leading `www.`, drops the query
    /// string, fragment and trailing slashes. Returns `None` if no URL.
    pub fn normalized_source_uri(&self) -> Option<String> {
        let raw = present(&self.source_url)?;

        let without_fragment = raw.split('#').next().unwrap_or(raw);
        let without_query = without_fragment
            .split('?')
            .next()
            .unwrap_or(without_fragment);

        let (scheme, rest) = match without_query.find("://") {
            Some(idx) => (
                without_query[..idx].to_ascii_lowercase(),
                &without_query[idx + 3..],
            ),
            None => (String::new(), without_query),
        };

        let (host, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, ""),
        };
        let host = host.to_ascii_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host);
        let path = path.trim_end_matches('/');

        if scheme.is_empty() {
            Some(format!("{}{}", host, path))
        } else {
            Some(format!("{}://{}{}", scheme, host, path))
        }
    }

    /// The explicit zipcode, or the last 5-digit zipcode found in the address.
    pub fn effective_zipcode(&self) -> Option<String> {
        if let Some(zip) = present(&self.zipcode) {
            return Some(zip.chars().take(5).collect());
        }
        let address = present(&self.address)?;
        zipcode_regex()
            .captures_iter(address)
            .last()
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// Names of the required fields this listing lacks.
    pub fn missing_required_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if present(&self.listing_id).is_none() {
            missing.push("listing_id");
        }
        if present(&self.address).is_none() {
            missing.push("address");
        }
        if self.price.is_none() {
            missing.push("price");
        }
        if present(&self.property_type).is_none() {
            missing.push("property_type");
        }
        if present(&self.listing_status).is_none() {
            missing.push("listing_status");
        }
        if present(&self.source_url).is_none() {
            missing.push("source_url");
        }
        missing
    }

    /// Whether every required field is present.
    pub fn is_complete(&self) -> bool {
        self.missing_required_fields().is_empty()
    }
}

/// One miner's payload for one `(epoch_id, zipcode)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    /// Miner hotkey (opaque stable identity string).
    pub miner_hotkey: String,
    pub epoch_id: String,
    pub zipcode: String,
    /// When the miner submitted. Earlier submissions win ties.
    pub submitted_at: DateTime<Utc>,
    /// Ordered list of scraped listings.
    pub listings: Vec<Listing>,
}

/// A submission parsed from untrusted JSON, with the number of listings
/// that were dropped because they did not match the listing schema.
#[derive(Debug, Clone)]
pub struct ParsedSubmission {
    pub submission: Submission,
    pub dropped_listings: usize,
}

/// Wire envelope: listings are kept as raw values so that one malformed
/// listing does not invalidate the rest of the submission.
#[derive(Deserialize)]
struct RawSubmission {
    miner_hotkey: String,
    epoch_id: String,
    zipcode: String,
    submitted_at: DateTime<Utc>,
    #[serde(default)]
    listings: Vec<serde_json::Value>,
}

impl Submission {
    /// Parse a submission from JSON bytes.
    ///
    /// A malformed envelope is an `InvalidInput` error. Individual listings
    /// that fail to deserialize are excluded and counted.
    pub fn from_json_slice(bytes: &[u8]) -> Result<ParsedSubmission, HomesteadError> {
        let raw: RawSubmission = serde_json::from_slice(bytes)
            .map_err(|e| HomesteadError::InvalidInput(format!("Malformed submission: {}", e)))?;

        if raw.miner_hotkey.trim().is_empty() {
            return Err(HomesteadError::InvalidInput(
                "Submission has an empty miner hotkey".to_string(),
            ));
        }

        let total = raw.listings.len();
        let listings: Vec<Listing> = raw
            .listings
            .into_iter()
            .filter_map(|value| serde_json::from_value::<Listing>(value).ok())
            .collect();
        let dropped_listings = total - listings.len();

        Ok(ParsedSubmission {
            submission: Submission {
                miner_hotkey: raw.miner_hotkey,
                epoch_id: raw.epoch_id,
                zipcode: raw.zipcode,
                submitted_at: raw.submitted_at,
                listings,
            },
            dropped_listings,
        })
    }

    /// Number of listings carried by this submission.
    pub fn listing_count(&self) -> usize {
        self.listings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_listing() -> Listing {
        Listing {
            listing_id: Some("zp-1001".to_string()),
            address: Some("9 Crest Rd, Beverly Hills, CA 90210".to_string()),
            zipcode: None,
            price: Some(2_450_000.0),
            bedrooms: Some(4.0),
            bathrooms: Some(3.5),
            living_area_sqft: Some(3200.0),
            property_type: Some("SINGLE_FAMILY".to_string()),
            listing_status: Some("FOR_SALE".to_string()),
            days_on_market: Some(12),
            source_url: Some("https://www.Example.com/homes/zp-1001/?ref=feed#top".to_string()),
            scraped_at: None,
        }
    }

    #[test]
    fn test_content_hash_ignores_source_url_and_scrape_time() {
        let a = sample_listing();
        let mut b = sample_listing();
        b.source_url = Some("https://mirror.example.org/x".to_string());
        b.scraped_at = Some(Utc::now());
        assert_eq!(a.content_hash(), b.content_hash());

        let mut c = sample_listing();
        c.price = Some(2_450_001.0);
        assert_ne!(a.content_hash(), c.content_hash());
    }

    #[test]
    fn test_normalized_source_uri() {
        let listing = sample_listing();
        assert_eq!(
            listing.normalized_source_uri().as_deref(),
            Some("https://example.com/homes/zp-1001")
        );

        let mut bare = sample_listing();
        bare.source_url = Some("   ".to_string());
        assert_eq!(bare.normalized_source_uri(), None);
    }

    #[test]
    fn test_effective_zipcode_from_address() {
        let listing = sample_listing();
        assert_eq!(listing.effective_zipcode().as_deref(), Some("90210"));

        let mut explicit = sample_listing();
        explicit.zipcode = Some("90211-1234".to_string());
        assert_eq!(explicit.effective_zipcode().as_deref(), Some("90211"));

        let mut none = sample_listing();
        none.address = Some("Somewhere without digits".to_string());
        assert_eq!(none.effective_zipcode(), None);
    }

    #[test]
    fn test_missing_required_fields() {
        let mut listing = sample_listing();
        assert!(listing.is_complete());

        listing.property_type = Some(String::new());
        listing.price = None;
        assert_eq!(
            listing.missing_required_fields(),
            vec!["price", "property_type"]
        );
    }

    #[test]
    fn test_parse_submission_drops_malformed_listings() {
        let json = serde_json::json!({
            "miner_hotkey": "5Fminer",
            "epoch_id": "2024-05-01T08-00-00Z",
            "zipcode": "90210",
            "submitted_at": "2024-05-01T10:00:00Z",
            "listings": [
                { "listing_id": "a", "price": 500000.0 },
                { "listing_id": "b", "price": "not-a-number" },
                "not an object"
            ]
        });
        let bytes = serde_json::to_vec(&json).unwrap();
        let parsed = Submission::from_json_slice(&bytes).unwrap();
        assert_eq!(parsed.submission.listing_count(), 1);
        assert_eq!(parsed.dropped_listings, 2);
        assert_eq!(parsed.submission.zipcode, "90210");
    }

    #[test]
    fn test_parse_submission_rejects_bad_envelope() {
        let err = Submission::from_json_slice(b"{\"listings\": []}").unwrap_err();
        assert!(matches!(err, HomesteadError::InvalidInput(_)));
    }
}
