#![feature(int_roundings)]

use std::fmt;

use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub mod api;
pub mod config;
pub mod monitor;
pub mod roll;
pub mod tracker;
pub mod widget;

/// Question text used when the service sends a popup without one
pub const DEFAULT_QUESTION: &str = "Are you present in the class?";

/// Option labels used when the service sends a popup without options
pub fn default_options() -> Vec<String> {
	vec!["Yes, I'm present".to_string(), "No".to_string()]
}

/// An attendance prompt issued by the service for one meeting session.
///
/// Created server-side and never mutated locally; identity is `popup_id`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Popup {
	pub popup_id: String,
	/// Question text (service may omit it)
	#[serde(default)]
	pub question: Option<String>,
	/// Answer options in display order (service may omit them)
	#[serde(default)]
	pub options: Option<Vec<String>>,
	/// Expiry instant, ISO-8601 (naive local from the service, RFC3339 tolerated)
	pub expires_at: String,
	/// Lifecycle status as reported by the service ("active", "expired", ...)
	#[serde(default)]
	pub status: Option<String>,
}

impl Popup {
	pub fn question_text(&self) -> &str {
		self.question.as_deref().filter(|q| !q.is_empty()).unwrap_or(DEFAULT_QUESTION)
	}

	/// Options to render; falls back to the default affirmative/negative pair
	pub fn option_labels(&self) -> Vec<String> {
		match &self.options {
			Some(opts) if !opts.is_empty() => opts.clone(),
			_ => default_options(),
		}
	}

	/// A popup without a status field counts as active
	pub fn is_active(&self) -> bool {
		self.status.as_deref().is_none_or(|s| s == "active")
	}

	/// Parse `expires_at`; None if the service sent something unparseable
	pub fn expiry(&self) -> Option<DateTime<Local>> {
		parse_service_timestamp(&self.expires_at)
	}

	/// Unparseable expiry counts as expired (never render something we can't time out)
	pub fn is_expired(&self, now: DateTime<Local>) -> bool {
		match self.expiry() {
			Some(expiry) => expiry <= now,
			None => true,
		}
	}

	/// Whole minutes left before expiry, ceiling, floored at zero
	pub fn remaining_minutes(&self, now: DateTime<Local>) -> i64 {
		let Some(expiry) = self.expiry() else { return 0 };
		let ms = (expiry - now).num_milliseconds();
		if ms <= 0 { 0 } else { ms.div_ceil(60_000) }
	}

	/// Milliseconds left before expiry, floored at zero
	pub fn remaining_ms(&self, now: DateTime<Local>) -> i64 {
		let Some(expiry) = self.expiry() else { return 0 };
		(expiry - now).num_milliseconds().max(0)
	}
}

impl fmt::Display for Popup {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "{}", self.question_text())?;
		for (i, option) in self.option_labels().iter().enumerate() {
			writeln!(f, "  {}. {}", i + 1, option)?;
		}
		Ok(())
	}
}

/// One entry from the active-sessions listing
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SessionInfo {
	pub session_id: String,
	/// Meeting link the session was created with; matched against the room name
	#[serde(default)]
	pub jitsi_link: Option<String>,
}

/// JSON body POSTed to the service to mark attendance
#[derive(Clone, Debug, Serialize)]
pub struct AttendanceSubmission {
	pub session_id: String,
	pub student_roll: String,
	pub method: String,
	pub response: String,
	pub option_index: usize,
	pub popup_id: String,
	pub participant_name: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub room_name: Option<String>,
}

/// Parse a timestamp as the service emits it: RFC3339 when an offset is present,
/// otherwise naive `datetime.isoformat()` interpreted as local time.
pub fn parse_service_timestamp(raw: &str) -> Option<DateTime<Local>> {
	if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
		return Some(dt.with_timezone(&Local));
	}
	let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
	naive.and_local_timezone(Local).earliest()
}

#[cfg(test)]
mod tests {
	use chrono::{Duration, Local};

	use super::*;

	fn popup_expiring_in(minutes: i64) -> Popup {
		Popup {
			popup_id: "P1".to_string(),
			question: None,
			options: None,
			expires_at: (Local::now() + Duration::minutes(minutes)).to_rfc3339(),
			status: Some("active".to_string()),
		}
	}

	#[test]
	fn defaults_fill_missing_question_and_options() {
		let popup = popup_expiring_in(5);
		assert_eq!(popup.question_text(), DEFAULT_QUESTION);
		assert_eq!(popup.option_labels(), default_options());
	}

	#[test]
	fn remaining_minutes_rounds_up() {
		let now = Local::now();
		let popup = Popup {
			expires_at: (now + Duration::seconds(4 * 60 + 30)).to_rfc3339(),
			..popup_expiring_in(0)
		};
		assert_eq!(popup.remaining_minutes(now), 5);

		let exact = Popup {
			expires_at: (now + Duration::minutes(5)).to_rfc3339(),
			..popup_expiring_in(0)
		};
		assert_eq!(exact.remaining_minutes(now), 5);
	}

	#[test]
	fn past_expiry_is_expired_and_zero_minutes() {
		let now = Local::now();
		let popup = popup_expiring_in(-1);
		assert!(popup.is_expired(now));
		assert_eq!(popup.remaining_minutes(now), 0);
	}

	#[test]
	fn unparseable_expiry_counts_as_expired() {
		let popup = Popup { expires_at: "soon".to_string(), ..popup_expiring_in(0) };
		assert!(popup.is_expired(Local::now()));
	}

	#[test]
	fn naive_isoformat_parses_as_local() {
		let expiry = (Local::now() + Duration::minutes(10)).naive_local();
		let raw = expiry.format("%Y-%m-%dT%H:%M:%S%.6f").to_string();
		let popup = Popup { expires_at: raw, ..popup_expiring_in(0) };
		assert!(!popup.is_expired(Local::now()));
	}

	#[test]
	fn missing_status_counts_as_active() {
		let popup = Popup { status: None, ..popup_expiring_in(5) };
		assert!(popup.is_active());
		let expired = Popup { status: Some("expired".to_string()), ..popup_expiring_in(5) };
		assert!(!expired.is_active());
	}
}
