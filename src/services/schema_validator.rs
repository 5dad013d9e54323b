//! Total, typed validation of the bulk game upload.
//!
//! The payload arrives as untyped JSON. Every field is extracted explicitly so a bad value is
//! reported with its exact location (`games[2].prediction.home_win_pct`) instead of a generic
//! deserialization failure, and so absent or `null` fields pick up their documented defaults.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use utoipa::ToSchema;

use crate::dao::models::{GameDate, GameStatus};

const DEFAULT_GAME_TIME: &str = "TBD";
const DEFAULT_HOME_COLOR: &str = "#1D428A";
const DEFAULT_AWAY_COLOR: &str = "#333333";
const DEFAULT_WIN_PCT: i64 = 50;

/// Why an upload was refused. Nothing is stored when validation fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    /// The document's shape is wrong: not an object, or `games` missing or not an array.
    #[error("malformed payload: {reason}")]
    MalformedPayload {
        /// What is wrong with the shape.
        reason: String,
    },
    /// `game_date` is not `YYYY-MM-DD`.
    #[error("invalid game_date `{value}`: expected YYYY-MM-DD")]
    InvalidDate {
        /// Value as submitted.
        value: String,
    },
    /// One field has the wrong type or an out-of-range value.
    #[error("invalid field `{path}`: {reason}")]
    InvalidField {
        /// Location such as `games[2].prediction.home_win_pct`.
        path: String,
        /// Broken expectation.
        reason: String,
    },
}

/// One participant as submitted, before it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TeamDraft {
    /// Display name; empty when absent.
    pub name: String,
    /// Short code; empty when absent.
    pub abbr: String,
    /// Season record; empty when absent.
    pub record: String,
    /// CSS color; each side has its own default.
    pub color: String,
    /// Mascot name; empty when absent.
    pub mascot_name: String,
    /// Recent streak, if given.
    pub streak: Option<String>,
}

/// Prediction as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PredictionDraft {
    /// 0 to 100; defaults to 50.
    pub home_win_pct: i32,
    /// 0 to 100; defaults to 50.
    pub away_win_pct: i32,
    /// Non-negative; defaults to 0.
    pub data_points: i64,
    /// Head-to-head summary.
    pub head_to_head: String,
    /// Explanation in English.
    pub reason: String,
    /// Explanation in Spanish.
    pub reason_es: Option<String>,
}

/// Fully defaulted candidate game. Carries no aggregates: published games start at 0 / 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct GameDraft {
    /// Defaults to `TBD`.
    pub game_time: String,
    /// Defaults to upcoming.
    pub status: GameStatus,
    /// Defaults to false.
    pub is_value_pick: bool,
    /// Defaults to false.
    pub is_featured: bool,
    /// Hosting team.
    pub home: TeamDraft,
    /// Visiting team.
    pub away: TeamDraft,
    /// Prediction.
    pub prediction: PredictionDraft,
}

/// Drafts in submission order, all sharing one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ValidatedBatch {
    /// Date every game is published under.
    #[schema(value_type = String, example = "2026-02-22")]
    pub game_date: GameDate,
    /// Drafts in submission order.
    pub games: Vec<GameDraft>,
}

/// Validate an upload payload into a [`ValidatedBatch`].
pub fn validate_batch(payload: &Value) -> Result<ValidatedBatch, IngestError> {
    let root = payload.as_object().ok_or_else(|| malformed("payload must be a JSON object"))?;

    let game_date = match root.get("game_date") {
        None | Some(Value::Null) => return Err(malformed("missing `game_date`")),
        Some(Value::String(raw)) => raw.parse::<GameDate>().map_err(|_| IngestError::InvalidDate {
            value: raw.clone(),
        })?,
        Some(other) => {
            return Err(IngestError::InvalidDate {
                value: other.to_string(),
            });
        }
    };

    let entries = match root.get("games") {
        Some(Value::Array(entries)) => entries,
        None | Some(Value::Null) => return Err(malformed("missing `games` list")),
        Some(_) => return Err(malformed("`games` must be a list")),
    };

    let games = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let path = format!("games[{index}]");
            match entry {
                Value::Object(object) => game_draft(Fields::new(object, path)),
                _ => Err(IngestError::InvalidField {
                    path,
                    reason: "expected an object".into(),
                }),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ValidatedBatch { game_date, games })
}

fn malformed(reason: &str) -> IngestError {
    IngestError::MalformedPayload {
        reason: reason.to_owned(),
    }
}

fn game_draft(fields: Fields<'_>) -> Result<GameDraft, IngestError> {
    let status = match fields.optional_string("status")? {
        None => GameStatus::default(),
        Some(raw) => raw
            .trim()
            .to_ascii_lowercase()
            .parse::<GameStatus>()
            .map_err(|reason| fields.invalid("status", reason))?,
    };

    Ok(GameDraft {
        game_time: fields.string_or("game_time", DEFAULT_GAME_TIME)?,
        status,
        is_value_pick: fields.bool_or("is_value_pick", false)?,
        is_featured: fields.bool_or("is_featured", false)?,
        home: team_draft(fields.object("home")?, DEFAULT_HOME_COLOR)?,
        away: team_draft(fields.object("away")?, DEFAULT_AWAY_COLOR)?,
        prediction: prediction_draft(fields.object("prediction")?)?,
    })
}

fn team_draft(fields: Fields<'_>, default_color: &str) -> Result<TeamDraft, IngestError> {
    Ok(TeamDraft {
        name: fields.string_or("name", "")?,
        abbr: fields.string_or("abbr", "")?,
        record: fields.string_or("record", "")?,
        color: fields.string_or("color", default_color)?,
        mascot_name: fields.string_or("mascot_name", "")?,
        streak: fields.optional_string("streak")?,
    })
}

fn prediction_draft(fields: Fields<'_>) -> Result<PredictionDraft, IngestError> {
    Ok(PredictionDraft {
        home_win_pct: fields.percentage("home_win_pct")?,
        away_win_pct: fields.percentage("away_win_pct")?,
        data_points: fields.int_or("data_points", 0, 0..=i64::MAX)?,
        head_to_head: fields.string_or("head_to_head", "")?,
        reason: fields.string_or("reason", "")?,
        reason_es: fields.optional_string("reason_es")?,
    })
}

/// Object being read plus its location in the payload. An absent nested object reads as empty.
struct Fields<'a> {
    object: Option<&'a Map<String, Value>>,
    path: String,
}

impl<'a> Fields<'a> {
    fn new(object: &'a Map<String, Value>, path: String) -> Self {
        Self {
            object: Some(object),
            path,
        }
    }

    fn path_of(&self, key: &str) -> String {
        format!("{}.{key}", self.path)
    }

    fn invalid(&self, key: &str, reason: impl Into<String>) -> IngestError {
        IngestError::InvalidField {
            path: self.path_of(key),
            reason: reason.into(),
        }
    }

    /// Present, non-null value of `key`.
    fn get(&self, key: &str) -> Option<&'a Value> {
        self.object
            .and_then(|object| object.get(key))
            .filter(|value| !value.is_null())
    }

    fn object(&self, key: &str) -> Result<Fields<'a>, IngestError> {
        match self.get(key) {
            None => Ok(Fields {
                object: None,
                path: self.path_of(key),
            }),
            Some(Value::Object(object)) => Ok(Fields::new(object, self.path_of(key))),
            Some(_) => Err(self.invalid(key, "expected an object")),
        }
    }

    fn optional_string(&self, key: &str) -> Result<Option<String>, IngestError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(value)) => Ok(Some(value.clone())),
            Some(_) => Err(self.invalid(key, "expected a string")),
        }
    }

    fn string_or(&self, key: &str, default: &str) -> Result<String, IngestError> {
        Ok(self
            .optional_string(key)?
            .unwrap_or_else(|| default.to_owned()))
    }

    fn bool_or(&self, key: &str, default: bool) -> Result<bool, IngestError> {
        match self.get(key) {
            None => Ok(default),
            Some(Value::Bool(value)) => Ok(*value),
            Some(_) => Err(self.invalid(key, "expected a boolean")),
        }
    }

    fn int_or(
        &self,
        key: &str,
        default: i64,
        range: std::ops::RangeInclusive<i64>,
    ) -> Result<i64, IngestError> {
        let Some(value) = self.get(key) else {
            return Ok(default);
        };
        let number = value
            .as_i64()
            .or_else(|| {
                value
                    .as_f64()
                    .filter(|float| float.fract() == 0.0 && fits_i64(*float))
                    .map(|float| float as i64)
            })
            .ok_or_else(|| self.invalid(key, "expected an integer"))?;

        if !range.contains(&number) {
            return Err(self.invalid(
                key,
                format!(
                    "must be between {} and {}",
                    range.start(),
                    range.end()
                ),
            ));
        }
        Ok(number)
    }

    fn percentage(&self, key: &str) -> Result<i32, IngestError> {
        // An explicit 0 is kept; only absent or null fields fall back to 50.
        let value = self.int_or(key, DEFAULT_WIN_PCT, 0..=100)?;
        Ok(value as i32)
    }
}

/// Whether `float` converts to `i64` without saturating. `i64::MAX as f64` rounds up to 2^63,
/// which is already out of range.
fn fits_i64(float: f64) -> bool {
    float >= i64::MIN as f64 && float < i64::MAX as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn minimal_game_is_fully_defaulted() {
        let batch = validate_batch(&json!({
            "game_date": "2026-02-22",
            "games": [{
                "home": {"name": "Rockets", "abbr": "HOU"},
                "away": {"name": "Nets", "abbr": "BKN"},
                "prediction": {"reason": "x"}
            }]
        }))
        .unwrap();

        assert_eq!(batch.game_date.to_string(), "2026-02-22");
        let game = &batch.games[0];
        assert_eq!(game.game_time, "TBD");
        assert_eq!(game.status, GameStatus::Upcoming);
        assert!(!game.is_value_pick && !game.is_featured);
        assert_eq!(game.home.color, "#1D428A");
        assert_eq!(game.away.color, "#333333");
        assert_eq!(game.home.record, "");
        assert_eq!(game.home.streak, None);
        assert_eq!(game.prediction.home_win_pct, 50);
        assert_eq!(game.prediction.away_win_pct, 50);
        assert_eq!(game.prediction.data_points, 0);
        assert_eq!(game.prediction.head_to_head, "");
        assert_eq!(game.prediction.reason, "x");
        assert_eq!(game.prediction.reason_es, None);
    }

    #[test]
    fn null_reads_as_absent_and_zero_is_kept() {
        let batch = validate_batch(&json!({
            "game_date": "2026-02-22",
            "games": [{
                "game_time": null,
                "home": null,
                "prediction": {"home_win_pct": 0, "away_win_pct": null, "data_points": 12000}
            }]
        }))
        .unwrap();
        let game = &batch.games[0];
        assert_eq!(game.game_time, "TBD");
        assert_eq!(game.home.color, "#1D428A");
        assert_eq!(game.prediction.home_win_pct, 0);
        assert_eq!(game.prediction.away_win_pct, 50);
        assert_eq!(game.prediction.data_points, 12000);
    }

    #[test]
    fn percentages_need_not_sum_to_100() {
        let batch = validate_batch(&json!({
            "game_date": "2026-02-22",
            "games": [{"prediction": {"home_win_pct": 70, "away_win_pct": 70}}]
        }))
        .unwrap();
        assert_eq!(batch.games[0].prediction.home_win_pct, 70);
        assert_eq!(batch.games[0].prediction.away_win_pct, 70);
    }

    #[test]
    fn aggregates_in_input_are_ignored() {
        let batch = validate_batch(&json!({
            "game_date": "2026-02-22",
            "games": [{"votes_home": 999, "community_home": 5}]
        }))
        .unwrap();
        assert_eq!(batch.games.len(), 1);
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        assert!(matches!(
            validate_batch(&json!([])),
            Err(IngestError::MalformedPayload { .. })
        ));
        assert!(matches!(
            validate_batch(&json!({"games": []})),
            Err(IngestError::MalformedPayload { .. })
        ));
        assert!(matches!(
            validate_batch(&json!({"game_date": "2026-02-22"})),
            Err(IngestError::MalformedPayload { .. })
        ));
        assert!(matches!(
            validate_batch(&json!({"game_date": "2026-02-22", "games": {}})),
            Err(IngestError::MalformedPayload { .. })
        ));
    }

    #[test]
    fn bad_date_is_reported() {
        assert_eq!(
            validate_batch(&json!({"game_date": "02/22/2026", "games": []})),
            Err(IngestError::InvalidDate {
                value: "02/22/2026".into()
            })
        );
    }

    #[test]
    fn field_errors_carry_their_path() {
        let err = validate_batch(&json!({
            "game_date": "2026-02-22",
            "games": [{}, {}, {"prediction": {"home_win_pct": "sixty"}}]
        }))
        .unwrap_err();
        assert_eq!(
            err,
            IngestError::InvalidField {
                path: "games[2].prediction.home_win_pct".into(),
                reason: "expected an integer".into()
            }
        );

        let err = validate_batch(&json!({
            "game_date": "2026-02-22",
            "games": [{"prediction": {"away_win_pct": 101}}]
        }))
        .unwrap_err();
        assert!(matches!(err, IngestError::InvalidField { path, .. } if path == "games[0].prediction.away_win_pct"));

        let err = validate_batch(&json!({
            "game_date": "2026-02-22",
            "games": [{"status": "postponed"}]
        }))
        .unwrap_err();
        assert!(matches!(err, IngestError::InvalidField { path, .. } if path == "games[0].status"));

        let err = validate_batch(&json!({"game_date": "2026-02-22", "games": [3]})).unwrap_err();
        assert!(matches!(err, IngestError::InvalidField { path, .. } if path == "games[0]"));
    }

    #[test]
    fn integral_floats_beyond_i64_are_not_integers() {
        let err = validate_batch(&json!({
            "game_date": "2026-02-22",
            "games": [{"prediction": {"data_points": 1e30}}]
        }))
        .unwrap_err();
        assert_eq!(
            err,
            IngestError::InvalidField {
                path: "games[0].prediction.data_points".into(),
                reason: "expected an integer".into()
            }
        );

        let batch = validate_batch(&json!({
            "game_date": "2026-02-22",
            "games": [{"prediction": {"data_points": 12.0}}]
        }))
        .unwrap();
        assert_eq!(batch.games[0].prediction.data_points, 12);
    }
}
