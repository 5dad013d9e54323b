use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{
    GameEntity, GameStatus, PredictionEntity, ProfileEntity, TeamEntity, TeamSide, VoteEntity,
};

use super::error::MongoDaoError;

/// Games are stored with string ids so filters stay readable in the shell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoGameDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub game_date: String,
    pub seq: i64,
    pub game_time: String,
    pub status: GameStatus,
    pub is_value_pick: bool,
    pub is_featured: bool,
    pub home: TeamEntity,
    pub away: TeamEntity,
    pub prediction: PredictionEntity,
    pub votes_home: i64,
    pub votes_away: i64,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl From<GameEntity> for MongoGameDocument {
    fn from(value: GameEntity) -> Self {
        Self {
            id: value.id.to_string(),
            game_date: value.game_date.to_string(),
            seq: value.seq,
            game_time: value.game_time,
            status: value.status,
            is_value_pick: value.is_value_pick,
            is_featured: value.is_featured,
            home: value.home,
            away: value.away,
            prediction: value.prediction,
            votes_home: value.votes_home,
            votes_away: value.votes_away,
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl TryFrom<MongoGameDocument> for GameEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoGameDocument) -> Result<Self, Self::Error> {
        let id = parse_uuid(&value.id)?;
        let game_date = value
            .game_date
            .parse()
            .map_err(|err: crate::dao::models::GameDateParseError| {
                MongoDaoError::CorruptDocument {
                    id: value.id.clone(),
                    reason: err.to_string(),
                }
            })?;

        Ok(Self {
            id,
            game_date,
            seq: value.seq,
            game_time: value.game_time,
            status: value.status,
            is_value_pick: value.is_value_pick,
            is_featured: value.is_featured,
            home: value.home,
            away: value.away,
            prediction: value.prediction,
            votes_home: value.votes_home,
            votes_away: value.votes_away,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoVoteDocument {
    /// `{user_id}:{game_id}`, so the primary key alone already forbids a second vote.
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub game_id: String,
    pub team: TeamSide,
    pub created_at: DateTime,
}

impl From<VoteEntity> for MongoVoteDocument {
    fn from(value: VoteEntity) -> Self {
        Self {
            id: vote_key(value.user_id, value.game_id),
            user_id: value.user_id.to_string(),
            game_id: value.game_id.to_string(),
            team: value.team,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoVoteDocument> for VoteEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoVoteDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: parse_uuid(&value.user_id)?,
            game_id: parse_uuid(&value.game_id)?,
            team: value.team,
            created_at: value.created_at.to_system_time(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoProfileDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    /// Case-folded username carrying the unique index.
    pub username_key: String,
    pub created_at: DateTime,
}

impl From<ProfileEntity> for MongoProfileDocument {
    fn from(value: ProfileEntity) -> Self {
        Self {
            id: value.user_id.to_string(),
            username_key: value.username_key(),
            username: value.username,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoProfileDocument> for ProfileEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoProfileDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: parse_uuid(&value.id)?,
            username: value.username,
            created_at: value.created_at.to_system_time(),
        })
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}

pub fn vote_key(user_id: Uuid, game_id: Uuid) -> String {
    format!("{user_id}:{game_id}")
}

/// Counter field incremented when a vote for `side` lands.
pub fn counter_field(side: TeamSide) -> &'static str {
    match side {
        TeamSide::Home => "votes_home",
        TeamSide::Away => "votes_away",
    }
}

fn parse_uuid(raw: &str) -> Result<Uuid, MongoDaoError> {
    Uuid::parse_str(raw).map_err(|err| MongoDaoError::CorruptDocument {
        id: raw.to_owned(),
        reason: err.to_string(),
    })
}
