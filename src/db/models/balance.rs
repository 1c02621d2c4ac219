use core::fmt;

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct UserId(pub String);

/// Base user_balance table model. The ledger is the only writer; claiming a
/// prize never mutates it (points are a lifetime gauge, not a currency).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserBalance {
    pub user_id: UserId,
    pub points: i64,
    pub trend: String,
    pub updated_at: NaiveDateTime,
}

impl UserBalance {
    /// Empty ledger entry for a user with no recorded events yet.
    pub fn zero(user_id: UserId) -> Self {
        Self {
            user_id,
            points: 0,
            trend: Trend::Same.as_str().to_string(),
            updated_at: Utc::now().naive_utc(),
        }
    }

    pub fn trend(&self) -> Trend {
        Trend::parse(&self.trend)
    }
}

/// Direction of the most recent balance mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Same,
}

impl Trend {
    pub fn from_delta(delta: i64) -> Self {
        match delta {
            d if d > 0 => Trend::Up,
            d if d < 0 => Trend::Down,
            _ => Trend::Same,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Same => "same",
        }
    }

    fn parse(value: &str) -> Self {
        match value {
            "up" => Trend::Up,
            "down" => Trend::Down,
            _ => Trend::Same,
        }
    }
}

/// Append-only audit row, one per balance mutation.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PointEvent {
    pub id: uuid::Uuid,
    pub user_id: UserId,
    pub delta: i64,
    pub reason: String,
    pub created_at: NaiveDateTime,
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        UserId(value)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        UserId(value.to_string())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_trend_from_delta() {
        assert_eq!(Trend::from_delta(10), Trend::Up);
        assert_eq!(Trend::from_delta(-4), Trend::Down);
        assert_eq!(Trend::from_delta(0), Trend::Same);
    }

    #[test]
    fn test_trend_roundtrip_through_storage() {
        for trend in [Trend::Up, Trend::Down, Trend::Same] {
            assert_eq!(Trend::parse(trend.as_str()), trend);
        }
        // unknown stored values degrade to 'same' rather than failing a read
        assert_eq!(Trend::parse("sideways"), Trend::Same);
    }

    #[test]
    fn test_zero_balance() {
        let balance = UserBalance::zero("42".into());
        assert_eq!(balance.points, 0);
        assert_eq!(balance.trend(), Trend::Same);
    }
}
