//! Application-level configuration loading: operators, identity provider and listing settings.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset, macros::offset};
use tracing::{info, warn};
use uuid::Uuid;

use crate::dao::models::GameDate;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "PICKS_LEDGER_CONFIG_PATH";
/// Where team images are served when no asset was attached; `{abbr}` is the upper-cased abbreviation.
const DEFAULT_ASSET_TEMPLATE: &str = "/mascots/{abbr}.png";
/// How long a cached access token is trusted before the provider is asked again.
const DEFAULT_SESSION_REVALIDATE_SECS: u64 = 300;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    operator_emails: Vec<String>,
    identity: IdentityConfig,
    asset_template: String,
    listing_zone: ListingZone,
    session_revalidate: Duration,
}

/// Time zone deciding which calendar date "today" is.
///
/// Game dates are scheduled in US Eastern time, so the default follows its daylight saving
/// rule. `listing_utc_offset_hours` in the configuration file pins a fixed offset instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListingZone {
    /// UTC-5, or UTC-4 from the second Sunday of March 02:00 to the first Sunday of
    /// November 02:00 local time.
    #[default]
    UsEastern,
    /// Same offset all year.
    Fixed(UtcOffset),
}

impl ListingZone {
    /// Offset in effect at the instant `at`.
    pub fn offset_at(&self, at: OffsetDateTime) -> UtcOffset {
        match self {
            ListingZone::Fixed(offset) => *offset,
            ListingZone::UsEastern => {
                let year = at.to_offset(UtcOffset::UTC).year();
                // 02:00 EST and 02:00 EDT respectively, expressed in UTC.
                let dst_start = nth_sunday(year, Month::March, 2).map(|day| utc_at(day, 7));
                let dst_end = nth_sunday(year, Month::November, 1).map(|day| utc_at(day, 6));
                match (dst_start, dst_end) {
                    (Some(start), Some(end)) if at >= start && at < end => offset!(-4),
                    _ => offset!(-5),
                }
            }
        }
    }

    /// Calendar date in this zone at the instant `at`.
    pub fn date_at(&self, at: OffsetDateTime) -> Date {
        at.to_offset(self.offset_at(at)).date()
    }
}

fn nth_sunday(year: i32, month: Month, n: u8) -> Option<Date> {
    let first = Date::from_calendar_date(year, month, 1).ok()?;
    let to_sunday = (7 - first.weekday().number_days_from_sunday()) % 7;
    Date::from_calendar_date(year, month, 1 + to_sunday + 7 * (n - 1)).ok()
}

fn utc_at(day: Date, hour: u8) -> OffsetDateTime {
    let time = Time::from_hms(hour, 0, 0).unwrap_or(Time::MIDNIGHT);
    PrimitiveDateTime::new(day, time).assume_utc()
}

/// Which identity provider signs users in.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdentityConfig {
    /// Accounts declared inline; meant for local development and tests.
    Static {
        /// Accounts allowed to sign in.
        #[serde(default)]
        accounts: Vec<StaticAccount>,
    },
    /// GoTrue-compatible auth server. The API key comes from `PICKS_IDENTITY_API_KEY`.
    #[serde(rename = "gotrue")]
    GoTrue {
        /// Server root; `/auth/v1/...` is appended.
        base_url: String,
    },
}

impl Default for IdentityConfig {
    fn default() -> Self {
        IdentityConfig::Static {
            accounts: Vec::new(),
        }
    }
}

/// Account accepted by the static identity provider.
#[derive(Debug, Clone, Deserialize)]
pub struct StaticAccount {
    /// Stable account id.
    pub id: Uuid,
    /// Sign-in email, matched case-insensitively.
    pub email: String,
    /// Plain-text password.
    pub password: String,
    /// Role claims, e.g. `operator`.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Whether the email counts as verified for the operator allow-list.
    #[serde(default = "default_verified")]
    pub email_verified: bool,
}

fn default_verified() -> bool {
    true
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        operators = app_config.operator_emails.len(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a configuration document.
    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// Emails granted the operator role once verified.
    pub fn operator_emails(&self) -> &[String] {
        &self.operator_emails
    }

    /// Identity provider settings.
    pub fn identity(&self) -> &IdentityConfig {
        &self.identity
    }

    /// Asset reference served for a team without an attached asset.
    pub fn fallback_asset(&self, abbr: &str) -> String {
        self.asset_template
            .replace("{abbr}", &abbr.trim().to_uppercase())
    }

    /// Today's date in the listing time zone.
    pub fn today(&self) -> GameDate {
        GameDate::new(self.listing_zone.date_at(OffsetDateTime::now_utc()))
    }

    /// Zone used by [`AppConfig::today`].
    pub fn listing_zone(&self) -> ListingZone {
        self.listing_zone
    }

    /// Longest time a cached access token is trusted without asking the provider.
    pub fn session_revalidate(&self) -> Duration {
        self.session_revalidate
    }

    /// Replace the session revalidation interval.
    pub fn with_session_revalidate(mut self, interval: Duration) -> Self {
        self.session_revalidate = interval;
        self
    }

    /// Replace the identity provider, keeping every other setting.
    pub fn with_identity(mut self, identity: IdentityConfig) -> Self {
        self.identity = identity;
        self
    }

    /// Replace the operator allow-list.
    pub fn with_operator_emails(mut self, emails: Vec<String>) -> Self {
        self.operator_emails = emails;
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    operator_emails: Vec<String>,
    identity: IdentityConfig,
    asset_template: Option<String>,
    listing_utc_offset_hours: Option<i8>,
    session_revalidate_secs: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let listing_zone = match value.listing_utc_offset_hours {
            None => ListingZone::UsEastern,
            Some(hours) => ListingZone::Fixed(UtcOffset::from_hms(hours, 0, 0).unwrap_or_else(
                |_| {
                    warn!(hours, "listing offset out of range; using UTC");
                    UtcOffset::UTC
                },
            )),
        };

        Self {
            operator_emails: value.operator_emails,
            identity: value.identity,
            asset_template: value
                .asset_template
                .filter(|template| !template.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_ASSET_TEMPLATE.to_owned()),
            listing_zone,
            session_revalidate: Duration::from_secs(
                value
                    .session_revalidate_secs
                    .unwrap_or(DEFAULT_SESSION_REVALIDATE_SECS),
            ),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn empty_document_uses_defaults() {
        let config = AppConfig::from_json("{}").unwrap();
        assert!(config.operator_emails().is_empty());
        assert!(matches!(config.identity(), IdentityConfig::Static { accounts } if accounts.is_empty()));
        assert_eq!(config.fallback_asset("hou"), "/mascots/HOU.png");
        assert_eq!(config.listing_zone(), ListingZone::UsEastern);
        assert_eq!(config.session_revalidate(), Duration::from_secs(300));
    }

    #[test]
    fn eastern_zone_follows_daylight_saving() {
        let zone = ListingZone::UsEastern;
        // 03:30 UTC is still the previous evening in New York, summer and winter alike.
        assert_eq!(zone.date_at(datetime!(2025-07-15 03:30 UTC)), date!(2025-07-14));
        assert_eq!(zone.date_at(datetime!(2025-01-15 03:30 UTC)), date!(2025-01-14));

        // 04:30 UTC in July is 00:30 EDT; a fixed UTC-5 would still say the 14th.
        let summer_night = datetime!(2025-07-15 04:30 UTC);
        assert_eq!(zone.date_at(summer_night), date!(2025-07-15));
        assert_eq!(
            ListingZone::Fixed(offset!(-5)).date_at(summer_night),
            date!(2025-07-14)
        );
    }

    #[test]
    fn eastern_transitions_happen_at_two_local() {
        let zone = ListingZone::UsEastern;
        // 2025: DST from March 9th 07:00 UTC to November 2nd 06:00 UTC.
        assert_eq!(zone.offset_at(datetime!(2025-03-09 06:59 UTC)), offset!(-5));
        assert_eq!(zone.offset_at(datetime!(2025-03-09 07:00 UTC)), offset!(-4));
        assert_eq!(zone.offset_at(datetime!(2025-11-02 05:59 UTC)), offset!(-4));
        assert_eq!(zone.offset_at(datetime!(2025-11-02 06:00 UTC)), offset!(-5));
    }

    #[test]
    fn explicit_offset_pins_the_zone() {
        let config = AppConfig::from_json(
            r#"{ "listing_utc_offset_hours": 9, "session_revalidate_secs": 0 }"#,
        )
        .unwrap();
        assert_eq!(config.listing_zone(), ListingZone::Fixed(offset!(+9)));
        assert_eq!(config.session_revalidate(), Duration::ZERO);
    }

    #[test]
    fn parses_gotrue_identity_and_template() {
        let config = AppConfig::from_json(
            r#"{
                "operator_emails": ["ops@example.com"],
                "identity": { "kind": "gotrue", "base_url": "https://auth.example.com" },
                "asset_template": "https://cdn.example.com/teams/{abbr}.webp",
                "listing_utc_offset_hours": 0
            }"#,
        )
        .unwrap();
        assert!(matches!(config.identity(), IdentityConfig::GoTrue { base_url } if base_url == "https://auth.example.com"));
        assert_eq!(
            config.fallback_asset("bkn"),
            "https://cdn.example.com/teams/BKN.webp"
        );
        assert_eq!(config.operator_emails(), ["ops@example.com".to_owned()]);
    }

    #[test]
    fn static_accounts_default_to_verified() {
        let config = AppConfig::from_json(
            r#"{ "identity": { "kind": "static", "accounts": [
                { "id": "5f0c8a4e-3b0e-4a55-9d7e-2f1a3c4b5d6e", "email": "a@b.c", "password": "x" }
            ] } }"#,
        )
        .unwrap();
        let IdentityConfig::Static { accounts } = config.identity() else {
            panic!("expected static identity");
        };
        assert!(accounts[0].email_verified);
    }
}
