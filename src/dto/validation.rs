//! Validation helpers for DTOs.

use uuid::Uuid;
use validator::ValidationError;

/// Most game ids accepted by one `/votes` lookup.
pub const MAX_GAME_IDS: usize = 100;

/// Parse the comma separated `game_ids` query parameter.
///
/// # Examples
///
/// ```ignore
/// parse_game_ids("")                        // Ok(vec![])
/// parse_game_ids("6f1c…,9a0e…")             // Ok(two ids)
/// parse_game_ids("not-a-uuid")              // Err - format
/// ```
pub fn parse_game_ids(raw: &str) -> Result<Vec<Uuid>, ValidationError> {
    let ids = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            Uuid::parse_str(part).map_err(|_| {
                let mut err = ValidationError::new("game_id_format");
                err.message = Some(format!("`{part}` is not a valid game id").into());
                err
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if ids.len() > MAX_GAME_IDS {
        let mut err = ValidationError::new("game_ids_count");
        err.message = Some(
            format!(
                "at most {MAX_GAME_IDS} game ids per request (got {})",
                ids.len()
            )
            .into(),
        );
        return Err(err);
    }

    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_game_ids_valid() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(parse_game_ids(&format!("{a}, {b},")).unwrap(), vec![a, b]);
        assert!(parse_game_ids("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_game_ids_invalid_format() {
        assert!(parse_game_ids("abc").is_err());
        assert!(parse_game_ids(&format!("{},x", Uuid::new_v4())).is_err());
    }

    #[test]
    fn test_parse_game_ids_too_many() {
        let raw = (0..=MAX_GAME_IDS)
            .map(|_| Uuid::new_v4().to_string())
            .collect::<Vec<_>>()
            .join(",");
        assert!(parse_game_ids(&raw).is_err());
    }
}
