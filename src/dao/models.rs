use std::{fmt, str::FromStr, time::SystemTime};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use thiserror::Error;
use time::{Date, macros::format_description};
use uuid::Uuid;

/// Calendar date used as the listing partition key for games (`YYYY-MM-DD`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GameDate(Date);

/// Raised when a string is not a `YYYY-MM-DD` calendar date.
#[derive(Debug, Error)]
#[error("invalid game date `{value}`: expected YYYY-MM-DD")]
pub struct GameDateParseError {
    value: String,
}

impl GameDate {
    /// Wrap an already validated calendar date.
    pub fn new(date: Date) -> Self {
        Self(date)
    }

    /// Underlying calendar date.
    pub fn date(&self) -> Date {
        self.0
    }
}

impl FromStr for GameDate {
    type Err = GameDateParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let format = format_description!("[year]-[month]-[day]");
        Date::parse(value.trim(), &format)
            .map(Self)
            .map_err(|_| GameDateParseError {
                value: value.to_owned(),
            })
    }
}

impl fmt::Display for GameDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}",
            self.0.year(),
            u8::from(self.0.month()),
            self.0.day()
        )
    }
}

impl Serialize for GameDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for GameDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Side of a matchup, used both as a vote choice and as an asset slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TeamSide {
    /// Hosting team.
    Home,
    /// Visiting team.
    Away,
}

impl TeamSide {
    /// Stable lowercase label, also used as the storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamSide::Home => "home",
            TeamSide::Away => "away",
        }
    }
}

impl fmt::Display for TeamSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TeamSide {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "home" => Ok(TeamSide::Home),
            "away" => Ok(TeamSide::Away),
            other => Err(format!("unknown side `{other}`: expected `home` or `away`")),
        }
    }
}

/// Lifecycle status of a matchup as displayed to users.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// Not started; the only state in which votes make sense to users.
    #[default]
    Upcoming,
    /// In progress.
    Live,
    /// Finished.
    Final,
}

impl FromStr for GameStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "upcoming" => Ok(GameStatus::Upcoming),
            "live" => Ok(GameStatus::Live),
            "final" => Ok(GameStatus::Final),
            other => Err(format!(
                "unknown status `{other}`: expected `upcoming`, `live` or `final`"
            )),
        }
    }
}

/// One participant of a matchup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamEntity {
    /// Display name, e.g. `Rockets`.
    pub name: String,
    /// Short code, e.g. `HOU`; also keys the fallback asset.
    pub abbr: String,
    /// Season record such as `38-20`.
    pub record: String,
    /// CSS color of the team card.
    pub color: String,
    /// Mascot shown next to the team.
    pub mascot_name: String,
    /// Recent streak such as `W4`, when provided.
    pub streak: Option<String>,
    /// Reference to an uploaded image (URL or path), set by asset attachment only.
    pub asset_ref: Option<String>,
}

/// Published prediction for a matchup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PredictionEntity {
    /// Home win probability in percent.
    pub home_win_pct: i32,
    /// Away win probability in percent.
    pub away_win_pct: i32,
    /// Number of data points the prediction considered.
    pub data_points: i64,
    /// Head-to-head summary.
    pub head_to_head: String,
    /// Explanation in English.
    pub reason: String,
    /// Explanation in Spanish, when provided.
    pub reason_es: Option<String>,
}

/// Aggregate game entity persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameEntity {
    /// Primary key of the game.
    pub id: Uuid,
    /// Listing partition.
    pub game_date: GameDate,
    /// Storage-assigned creation order; strictly increasing across publishes.
    pub seq: i64,
    /// Free-form tip-off time, e.g. `7:30 PM ET`.
    pub game_time: String,
    /// Lifecycle status.
    pub status: GameStatus,
    /// Highlighted as a value pick.
    pub is_value_pick: bool,
    /// Highlighted as the featured game of the day.
    pub is_featured: bool,
    /// Hosting team.
    pub home: TeamEntity,
    /// Visiting team.
    pub away: TeamEntity,
    /// Published prediction.
    pub prediction: PredictionEntity,
    /// Written by the vote ledger only.
    pub votes_home: i64,
    /// Written by the vote ledger only.
    pub votes_away: i64,
    /// Publish time.
    pub created_at: SystemTime,
    /// Last counter or asset change.
    pub updated_at: SystemTime,
}

impl GameEntity {
    /// Mutable access to one side of the matchup.
    pub fn side_mut(&mut self, side: TeamSide) -> &mut TeamEntity {
        match side {
            TeamSide::Home => &mut self.home,
            TeamSide::Away => &mut self.away,
        }
    }
}

/// One user's vote for one game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteEntity {
    /// Voter.
    pub user_id: Uuid,
    /// Game voted on.
    pub game_id: Uuid,
    /// Chosen side; never changes once recorded.
    pub team: TeamSide,
    /// When the vote was cast.
    pub created_at: SystemTime,
}

/// Public profile completed after the first sign-in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileEntity {
    /// Owner account.
    pub user_id: Uuid,
    /// Username as typed by the user.
    pub username: String,
    /// When the profile was completed.
    pub created_at: SystemTime,
}

impl ProfileEntity {
    /// Case-folded form carrying the uniqueness constraint.
    pub fn username_key(&self) -> String {
        self.username.to_ascii_lowercase()
    }
}

/// Result of attempting to record a vote as one storage-level unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteInsert {
    /// Vote row inserted and the matching counter incremented; carries the new counters.
    Recorded {
        /// Home counter after the increment.
        votes_home: i64,
        /// Away counter after the increment.
        votes_away: i64,
    },
    /// The `(user, game)` pair already has a vote; nothing was written.
    Duplicate {
        /// Side of the vote already on record.
        existing: TeamSide,
    },
    /// The referenced game does not exist; nothing was written.
    GameMissing,
}

/// Number of ledger rows per side for one game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoteCounts {
    /// Rows voting home.
    pub home: i64,
    /// Rows voting away.
    pub away: i64,
}

/// Result of attempting to create a profile row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileInsert {
    /// Profile stored.
    Created,
    /// Another user already owns the case-folded username.
    UsernameTaken,
    /// This user already completed their profile.
    AlreadyExists(ProfileEntity),
}
