//! Connection target resolution for networked backends.

use std::fmt;
use std::sync::Arc;

use broker_core::error::BrokerError;
use broker_core::result::BrokerResult;
use broker_core::traits::ResourceLocator;
use broker_core::types::ResourceAttributes;

/// Attribute holding the connection URL, on resources and handler options.
const DEFAULT_URL_ATTRIBUTE: &str = "url";

/// Cache key used for a fixed, non-located endpoint.
const FIXED_KEY: &str = "<fixed>";

/// Where a networked backend should connect.
#[derive(Clone)]
pub enum Endpoint {
    /// A URL taken from the handler options.
    Fixed(String),
    /// The active resource of a group, read on every call.
    Located {
        /// Locator (usually a resource group).
        locator: Arc<dyn ResourceLocator>,
        /// Attribute on the resource that holds the URL.
        attribute: String,
    },
}

/// A resolved connection target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Key for caching per-target connections (the resource id).
    pub key: String,
    /// Connection URL.
    pub url: String,
}

impl Endpoint {
    /// Prefer the locator when given; otherwise require a `url` option.
    pub fn from_options(
        options: &ResourceAttributes,
        locator: Option<Arc<dyn ResourceLocator>>,
    ) -> BrokerResult<Self> {
        let attribute = options
            .get_str("url_attribute")
            .unwrap_or_else(|| DEFAULT_URL_ATTRIBUTE.to_string());

        match locator {
            Some(locator) => Ok(Self::Located { locator, attribute }),
            None => options.get_str(DEFAULT_URL_ATTRIBUTE).map(Self::Fixed).ok_or_else(|| {
                BrokerError::configuration(
                    "Backend requires either a 'url' option or a resource group",
                )
            }),
        }
    }

    /// Resolve the target to connect to right now.
    pub fn resolve(&self) -> BrokerResult<Target> {
        match self {
            Self::Fixed(url) => Ok(Target {
                key: FIXED_KEY.to_string(),
                url: url.clone(),
            }),
            Self::Located { locator, attribute } => {
                let active = locator.locate()?;
                let url = active.attributes.get_str(attribute).ok_or_else(|| {
                    BrokerError::configuration(format!(
                        "Resource '{}' has no '{attribute}' attribute",
                        active.id
                    ))
                })?;
                Ok(Target {
                    key: active.id,
                    url,
                })
            }
        }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(url) => f.debug_tuple("Fixed").field(&mask_url(url)).finish(),
            Self::Located { locator, attribute } => f
                .debug_struct("Located")
                .field("locator", locator)
                .field("attribute", attribute)
                .finish(),
        }
    }
}

/// Mask the password in a connection URL for safe logging.
pub fn mask_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            let scheme_end = url.find("://").map(|p| p + 3).unwrap_or(0);
            if colon_pos > scheme_end {
                return format!("{}:****@{}", &url[..colon_pos], &url[at_pos + 1..]);
            }
        }
    }
    url.to_string()
}
