//! HTTP contract with the attendance service.
//!
//! Requests go through the meeting page's own `fetch` (same origin as the
//! original in-page integration), with the JSON bodies deserialized on the
//! Rust side. Every function returns a Result; the poll loop treats failures
//! as "no data this tick" and retries naturally.

use chromiumoxide::Page;
use color_eyre::{Result, eyre::eyre};
use serde::Deserialize;

use crate::{AttendanceSubmission, Popup, SessionInfo};

#[derive(Debug, Deserialize)]
struct ActiveSessionsPayload {
	#[serde(default)]
	success: bool,
	#[serde(default)]
	sessions: Vec<SessionInfo>,
}

#[derive(Debug, Deserialize)]
struct PopupStatusPayload {
	#[serde(default)]
	success: bool,
	#[serde(default)]
	has_active_popup: bool,
	#[serde(default)]
	popup_status: Option<Popup>,
}

/// Service acknowledgement for an attendance submission
#[derive(Debug, Deserialize)]
pub struct ApiAck {
	#[serde(default)]
	pub success: bool,
	#[serde(default)]
	pub message: Option<String>,
}

/// `GET` a service endpoint through the page and return the raw body text
async fn fetch_text(page: &Page, url: &str) -> Result<String> {
	let script = format!(
		r#"
		(async function() {{
			try {{
				const response = await fetch("{}");
				if (!response.ok) return null;
				return await response.text();
			}} catch (e) {{
				return null;
			}}
		}})()
		"#,
		url
	);

	let result = page.evaluate(script).await.map_err(|e| eyre!("Failed to fetch {}: {}", url, e))?;
	result.value().and_then(|v| v.as_str()).map(|s| s.to_string()).ok_or_else(|| eyre!("No response from {}", url))
}

/// Sessions listing, `GET /api/online/active_sessions`
pub fn parse_active_sessions(json: &str) -> Result<Vec<SessionInfo>> {
	let payload: ActiveSessionsPayload = serde_json::from_str(json).map_err(|e| eyre!("Failed to parse sessions listing: {}", e))?;
	if !payload.success {
		return Ok(Vec::new());
	}
	Ok(payload.sessions)
}

/// First session whose link contains the room name as a substring
pub fn match_session_for_room<'a>(sessions: &'a [SessionInfo], room_name: &str) -> Option<&'a SessionInfo> {
	sessions.iter().find(|session| session.jitsi_link.as_deref().is_some_and(|link| link.contains(room_name)))
}

/// Popup status, `GET /api/online/jitsi_popup_status/{session_id}`.
/// None when the service reports no active popup.
pub fn parse_popup_status(json: &str) -> Result<Option<Popup>> {
	let payload: PopupStatusPayload = serde_json::from_str(json).map_err(|e| eyre!("Failed to parse popup status: {}", e))?;
	if !payload.success || !payload.has_active_popup {
		return Ok(None);
	}
	Ok(payload.popup_status)
}

pub fn parse_submission_ack(json: &str) -> Result<ApiAck> {
	serde_json::from_str(json).map_err(|e| eyre!("Failed to parse submission response: {}", e))
}

pub async fn fetch_active_sessions(page: &Page, base_url: &str) -> Result<Vec<SessionInfo>> {
	let body = fetch_text(page, &format!("{}/api/online/active_sessions", base_url)).await?;
	parse_active_sessions(&body)
}

/// Resolve the room name to a server-assigned session id. Ok(None) when no
/// session matches yet; the poller retries on later ticks.
pub async fn find_session_for_room(page: &Page, base_url: &str, room_name: &str) -> Result<Option<String>> {
	let sessions = fetch_active_sessions(page, base_url).await?;
	Ok(match_session_for_room(&sessions, room_name).map(|session| session.session_id.clone()))
}

pub async fn fetch_popup_status(page: &Page, base_url: &str, session_id: &str) -> Result<Option<Popup>> {
	let body = fetch_text(page, &format!("{}/api/online/jitsi_popup_status/{}", base_url, session_id)).await?;
	parse_popup_status(&body)
}

/// `POST /api/online/jitsi_attendance` with the documented JSON body
pub async fn submit_attendance(page: &Page, base_url: &str, submission: &AttendanceSubmission) -> Result<ApiAck> {
	let payload = serde_json::to_string(submission).map_err(|e| eyre!("Failed to encode submission: {}", e))?;
	let script = format!(
		r#"
		(async function() {{
			try {{
				const payload = {};
				const response = await fetch("{}/api/online/jitsi_attendance", {{
					method: 'POST',
					headers: {{ 'Content-Type': 'application/json' }},
					body: JSON.stringify(payload)
				}});
				return await response.text();
			}} catch (e) {{
				return null;
			}}
		}})()
		"#,
		payload, base_url
	);

	let result = page.evaluate(script).await.map_err(|e| eyre!("Failed to submit attendance: {}", e))?;
	let body = result.value().and_then(|v| v.as_str()).map(|s| s.to_string()).ok_or_else(|| eyre!("No response from attendance submission"))?;
	parse_submission_ack(&body)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn session_lookup_matches_room_link_substring() {
		let json = r#"{
			"success": true,
			"sessions": [
				{"session_id": "S0", "jitsi_link": "https://meet.jit.si/chemistry-202"},
				{"session_id": "S1", "jitsi_link": "https://meet.jit.si/algebra-101"}
			]
		}"#;
		let sessions = parse_active_sessions(json).unwrap();
		assert_eq!(sessions.len(), 2);
		let matched = match_session_for_room(&sessions, "algebra-101").unwrap();
		assert_eq!(matched.session_id, "S1");
		assert!(match_session_for_room(&sessions, "history-303").is_none());
	}

	#[test]
	fn sessions_without_links_never_match() {
		let sessions = vec![SessionInfo { session_id: "S2".to_string(), jitsi_link: None }];
		assert!(match_session_for_room(&sessions, "anything").is_none());
	}

	#[test]
	fn unsuccessful_listing_is_empty() {
		let sessions = parse_active_sessions(r#"{"success": false, "sessions": [{"session_id": "S1"}]}"#).unwrap();
		assert!(sessions.is_empty());
	}

	#[test]
	fn popup_status_with_active_popup() {
		let json = r#"{
			"success": true,
			"has_active_popup": true,
			"popup_status": {
				"popup_id": "P1",
				"question": "Are you present?",
				"options": ["Yes", "No"],
				"expires_at": "2099-01-01T10:00:00",
				"status": "active"
			}
		}"#;
		let popup = parse_popup_status(json).unwrap().unwrap();
		assert_eq!(popup.popup_id, "P1");
		assert_eq!(popup.option_labels(), vec!["Yes".to_string(), "No".to_string()]);
		assert!(popup.is_active());
	}

	#[test]
	fn popup_status_without_active_popup() {
		assert!(parse_popup_status(r#"{"success": true, "has_active_popup": false}"#).unwrap().is_none());
		assert!(parse_popup_status(r#"{"success": false}"#).unwrap().is_none());
	}

	#[test]
	fn malformed_payloads_are_errors() {
		assert!(parse_active_sessions("<html>busy</html>").is_err());
		assert!(parse_popup_status("{truncated").is_err());
		assert!(parse_submission_ack("").is_err());
	}

	#[test]
	fn submission_ack_carries_message() {
		let ack = parse_submission_ack(r#"{"success": false, "message": "Popup has expired"}"#).unwrap();
		assert!(!ack.success);
		assert_eq!(ack.message.as_deref(), Some("Popup has expired"));

		let ok = parse_submission_ack(r#"{"success": true}"#).unwrap();
		assert!(ok.success);
		assert!(ok.message.is_none());
	}

	#[test]
	fn submission_body_has_documented_fields() {
		let submission = crate::AttendanceSubmission {
			session_id: "S1".to_string(),
			student_roll: "23CSEDS001".to_string(),
			method: "jitsi_popup_auto".to_string(),
			response: "Yes".to_string(),
			option_index: 0,
			popup_id: "P1".to_string(),
			participant_name: "John Doe (23CSEDS001)".to_string(),
			room_name: Some("algebra-101".to_string()),
		};
		let value: serde_json::Value = serde_json::to_value(&submission).unwrap();
		assert_eq!(value["session_id"], "S1");
		assert_eq!(value["student_roll"], "23CSEDS001");
		assert_eq!(value["option_index"], 0);
		assert_eq!(value["popup_id"], "P1");
		assert_eq!(value["room_name"], "algebra-101");
	}
}
