/// Points credited to the winner of a recorded match.
pub const WINNER_POINTS: i64 = 10;

/// Points credited to a losing participant of a recorded match.
pub const PARTICIPANT_POINTS: i64 = 3;

// Visual insets for the reward track. The fill bar and prize markers are
// both mapped into [TRACK_START_INSET, 100 - TRACK_END_INSET] so markers
// never sit flush against the track edges.
pub const TRACK_START_INSET: f64 = 8.0;
pub const TRACK_END_INSET: f64 = 8.0;

/// Header carrying the verified user identity, set by the auth gateway.
/// Identities arriving in a request body are never trusted.
pub const USER_ID_HEADER: &str = "x-user-id";

pub const REASON_MATCH_WINNER: &str = "match_winner";
pub const REASON_MATCH_PARTICIPANT: &str = "match_participant";
pub const REASON_ADMIN_ADJUSTMENT: &str = "admin_adjustment";

pub const DEFAULT_SERVER_PORT: &str = "3000";

#[cfg(feature = "production")]
pub const ORIGIN_URL_ENDSWITH: &[u8] = b".bracketworks.gg";
