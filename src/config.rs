//! Navigator configuration.
//!
//! Read from environment variables (after `.env` is loaded by `main`), with
//! defaults for everything except the backing store credentials, which the
//! Supabase client reads itself.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{NavigatorError, Result};
use crate::row_source::Paging;

const DEFAULT_PAGE_SIZE: usize = 1000;
const DEFAULT_MAX_OFFSET: usize = 50_000;
const DEFAULT_FOCUS_CLEAR_MS: u64 = 1200;
const DEFAULT_BIND: &str = "0.0.0.0:3000";

#[derive(Debug, Clone)]
pub struct NavigatorConfig {
    pub paging: Paging,
    /// How long a focus request stays set before it is cleared.
    pub focus_clear_delay: Duration,
    /// Current viewer; required for favorites and the own-projects merge.
    pub viewer_id: Option<String>,
    /// Where the interactive view is persisted; `None` disables persistence.
    pub view_state_path: Option<PathBuf>,
    pub bind: SocketAddr,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            paging: Paging {
                page_size: DEFAULT_PAGE_SIZE,
                max_offset: DEFAULT_MAX_OFFSET,
            },
            focus_clear_delay: Duration::from_millis(DEFAULT_FOCUS_CLEAR_MS),
            viewer_id: None,
            view_state_path: None,
            bind: SocketAddr::from(([0, 0, 0, 0], 3000)),
        }
    }
}

impl NavigatorConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let page_size = parse_or(get("NAVIGATOR_PAGE_SIZE"), "NAVIGATOR_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        if page_size == 0 {
            return Err(NavigatorError::Config(
                "NAVIGATOR_PAGE_SIZE must be greater than zero".to_string(),
            ));
        }
        let max_offset =
            parse_or(get("NAVIGATOR_MAX_OFFSET"), "NAVIGATOR_MAX_OFFSET", DEFAULT_MAX_OFFSET)?;
        let focus_ms = parse_or(
            get("NAVIGATOR_FOCUS_CLEAR_MS"),
            "NAVIGATOR_FOCUS_CLEAR_MS",
            DEFAULT_FOCUS_CLEAR_MS,
        )?;
        let bind = get("NAVIGATOR_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind: SocketAddr = bind
            .parse()
            .map_err(|e| NavigatorError::Config(format!("NAVIGATOR_BIND={}: {}", bind, e)))?;

        Ok(Self {
            paging: Paging {
                page_size,
                max_offset,
            },
            focus_clear_delay: Duration::from_millis(focus_ms),
            viewer_id: get("NAVIGATOR_VIEWER_ID"),
            view_state_path: get("NAVIGATOR_VIEW_STATE_PATH").map(PathBuf::from),
            bind,
        })
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| NavigatorError::Config(format!("{}={}: {}", key, raw, e))),
    }
}
