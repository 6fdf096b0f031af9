//! Identify response body and its mapping onto [`RecognitionOutcome`].

use serde::Deserialize;
use tracing::{debug, warn};

use super::{ExternalIds, NotFoundReason, RecognitionOutcome, RecognizedSong};
use crate::error::AppError;

pub const CODE_SUCCESS: i64 = 0;
pub const CODE_NO_RESULT: i64 = 1001;
pub const CODE_FINGERPRINT_FAILED: i64 = 2004;
pub const CODE_INVALID_ACCESS_KEY: i64 = 3001;
pub const CODE_LIMIT_EXCEEDED: i64 = 3003;

#[derive(Debug, Deserialize)]
pub struct IdentifyResponse {
    pub status: Status,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Deserialize)]
pub struct Status {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub music: Vec<Music>,
}

#[derive(Debug, Deserialize)]
pub struct Music {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artists: Vec<Named>,
    #[serde(default)]
    pub album: Option<Named>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub genres: Vec<Named>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub external_ids: Option<RawExternalIds>,
    #[serde(default)]
    pub external_metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct Named {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct RawExternalIds {
    #[serde(default)]
    pub isrc: Option<String>,
}

impl Music {
    fn into_song(self) -> RecognizedSong {
        let external = self.external_metadata.unwrap_or_default();
        let spotify = external["spotify"]["track"]["id"].as_str().map(String::from);
        let youtube = external["youtube"]["vid"].as_str().map(String::from);

        RecognizedSong {
            title: self.title,
            artists: named(self.artists),
            album: self.album.map(|a| a.name).filter(|name| !name.is_empty()),
            duration_ms: self.duration_ms,
            genres: named(self.genres),
            release_date: self.release_date,
            external_ids: ExternalIds {
                spotify,
                youtube,
                isrc: self.external_ids.and_then(|ids| ids.isrc),
            },
        }
    }
}

/// Names of the entries that carry one.
fn named(entries: Vec<Named>) -> Vec<String> {
    entries
        .into_iter()
        .map(|entry| entry.name)
        .filter(|name| !name.is_empty())
        .collect()
}

/// Map a finished HTTP exchange to an outcome.
///
/// Transport status wins: 401, 404, 429 and any other non-2xx are decided
/// without looking at the body. A 2xx body is then mapped by its embedded
/// status code. Only an unparseable 2xx body is an error.
pub fn interpret(http_status: u16, body: &str) -> Result<RecognitionOutcome, AppError> {
    match http_status {
        200..=299 => {}
        401 => {
            return Ok(RecognitionOutcome::InvalidCredentials {
                message: format!("HTTP 401: {}", body.trim()),
            })
        }
        404 => return Ok(RecognitionOutcome::ServiceUnavailable),
        429 => return Ok(RecognitionOutcome::RateLimited),
        status => {
            return Ok(RecognitionOutcome::TransientNetworkError {
                status,
                body: body.to_string(),
            })
        }
    }

    let response: IdentifyResponse = serde_json::from_str(body)?;
    Ok(map_status(response))
}

pub fn map_status(response: IdentifyResponse) -> RecognitionOutcome {
    let IdentifyResponse { status, metadata } = response;
    debug!(
        "[recognize] status code={} msg={:?} version={:?}",
        status.code, status.msg, status.version
    );

    match status.code {
        CODE_SUCCESS => {
            let first = metadata.and_then(|m| m.music.into_iter().next());
            match first {
                Some(music) => RecognitionOutcome::Matched {
                    song: music.into_song(),
                },
                None => {
                    warn!("[recognize] success status without any music entries");
                    RecognitionOutcome::NotFound {
                        reason: NotFoundReason::NoMatch,
                    }
                }
            }
        }
        CODE_NO_RESULT => RecognitionOutcome::NotFound {
            reason: NotFoundReason::NoMatch,
        },
        CODE_FINGERPRINT_FAILED => {
            warn!("[recognize] no fingerprint could be generated: sample too short, too quiet, or not music");
            RecognitionOutcome::NotFound {
                reason: NotFoundReason::UnusableSample,
            }
        }
        CODE_INVALID_ACCESS_KEY => RecognitionOutcome::InvalidCredentials {
            message: status.msg,
        },
        CODE_LIMIT_EXCEEDED => RecognitionOutcome::QuotaExceeded {
            message: status.msg,
        },
        code => RecognitionOutcome::UnknownError {
            code,
            message: status.msg,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MATCH_BODY: &str = r#"{
        "status": {"msg": "Success", "code": 0, "version": "1.0"},
        "metadata": {
            "timestamp_utc": "2024-03-01 10:00:00",
            "music": [
                {
                    "title": "Blinding Lights",
                    "artists": [{"name": "The Weeknd"}],
                    "album": {"name": "After Hours"},
                    "duration_ms": 200040,
                    "genres": [{"name": "Pop"}, {"name": "Synthwave"}],
                    "release_date": "2019-11-29",
                    "score": 100,
                    "external_ids": {"isrc": "USUG11904206", "upc": "00602508"},
                    "external_metadata": {
                        "spotify": {"track": {"id": "0VjIjW4GlUZAMYd2vXMi3b"}},
                        "youtube": {"vid": "4NRXx6U8ABQ"}
                    }
                },
                {
                    "title": "Second Best",
                    "artists": [{"name": "Someone"}],
                    "duration_ms": 1000
                }
            ]
        },
        "cost_time": 0.7
    }"#;

    #[test]
    fn test_success_surfaces_first_entry() {
        let outcome = interpret(200, MATCH_BODY).unwrap();
        let song = outcome.song().unwrap();
        assert_eq!(song.title, "Blinding Lights");
        assert_eq!(song.artists, vec!["The Weeknd"]);
        assert_eq!(song.album.as_deref(), Some("After Hours"));
        assert_eq!(song.duration_ms, 200_040);
        assert_eq!(song.genres, vec!["Pop", "Synthwave"]);
        assert_eq!(song.release_date.as_deref(), Some("2019-11-29"));
        assert_eq!(song.external_ids.isrc.as_deref(), Some("USUG11904206"));
        assert_eq!(
            song.external_ids.spotify.as_deref(),
            Some("0VjIjW4GlUZAMYd2vXMi3b")
        );
        assert_eq!(song.external_ids.youtube.as_deref(), Some("4NRXx6U8ABQ"));
    }

    #[test]
    fn test_success_without_music_is_not_found() {
        let body = r#"{"status": {"msg": "Success", "code": 0}, "metadata": {"music": []}}"#;
        assert_eq!(
            interpret(200, body).unwrap(),
            RecognitionOutcome::NotFound {
                reason: NotFoundReason::NoMatch
            }
        );
        let body = r#"{"status": {"msg": "Success", "code": 0}}"#;
        assert!(!interpret(200, body).unwrap().is_match());
    }

    #[test]
    fn test_status_code_mapping() {
        let body = |code: i64, msg: &str| {
            format!(r#"{{"status": {{"msg": "{msg}", "code": {code}, "version": "1.0"}}}}"#)
        };

        assert_eq!(
            interpret(200, &body(1001, "No result")).unwrap(),
            RecognitionOutcome::NotFound {
                reason: NotFoundReason::NoMatch
            }
        );
        assert_eq!(
            interpret(200, &body(2004, "Can't generate fingerprint")).unwrap(),
            RecognitionOutcome::NotFound {
                reason: NotFoundReason::UnusableSample
            }
        );
        assert_eq!(
            interpret(200, &body(3001, "Missing/Invalid Access Key")).unwrap(),
            RecognitionOutcome::InvalidCredentials {
                message: "Missing/Invalid Access Key".into()
            }
        );
        assert_eq!(
            interpret(200, &body(3003, "Limit exceeded")).unwrap(),
            RecognitionOutcome::QuotaExceeded {
                message: "Limit exceeded".into()
            }
        );
        assert_eq!(
            interpret(200, &body(3000, "Invalid params")).unwrap(),
            RecognitionOutcome::UnknownError {
                code: 3000,
                message: "Invalid params".into()
            }
        );
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(interpret(429, "slow down").unwrap(), RecognitionOutcome::RateLimited);
        assert_eq!(interpret(429, "").unwrap(), RecognitionOutcome::RateLimited);
        assert_eq!(interpret(404, "").unwrap(), RecognitionOutcome::ServiceUnavailable);
        assert!(matches!(
            interpret(401, "bad key").unwrap(),
            RecognitionOutcome::InvalidCredentials { .. }
        ));
        assert_eq!(
            interpret(502, "Bad Gateway").unwrap(),
            RecognitionOutcome::TransientNetworkError {
                status: 502,
                body: "Bad Gateway".into()
            }
        );
    }

    #[test]
    fn test_http_status_wins_over_body() {
        let body = r#"{"status": {"msg": "Success", "code": 0}}"#;
        assert_eq!(interpret(429, body).unwrap(), RecognitionOutcome::RateLimited);
    }

    #[test]
    fn test_entries_without_name_still_match() {
        let body = r#"{
            "status": {"msg": "Success", "code": 0},
            "metadata": {"music": [{
                "title": "Untitled",
                "artists": [{"name": "Known"}, {"id": "a1"}],
                "album": {},
                "genres": [{}]
            }]}
        }"#;
        let outcome = interpret(200, body).unwrap();
        let song = outcome.song().unwrap();
        assert_eq!(song.title, "Untitled");
        assert_eq!(song.artists, vec!["Known"]);
        assert!(song.album.is_none());
        assert!(song.genres.is_empty());
    }

    #[test]
    fn test_garbage_success_body_is_error() {
        assert!(matches!(
            interpret(200, "<html>oops</html>"),
            Err(AppError::Serialization(_))
        ));
    }
}
