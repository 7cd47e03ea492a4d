//! The attendance monitor: one controller owning the poll loop, the current
//! popup state, and the submission flow. Replaces the original's two
//! overlapping in-page implementations with a single lifecycle
//! (`start`/`stop`) driven from Rust.

use std::sync::LazyLock;

use chromiumoxide::Page;
use color_eyre::{Result, eyre::eyre};
use regex::Regex;
use tokio::task::JoinHandle;
use v_utils::{elog, log};

use crate::{
	AttendanceSubmission, Popup, api,
	config::AppConfig,
	roll::{self, ManualEntry},
	tracker::ResponseTracker,
	widget::{self, Selection, ToastKind},
};

/// Submission method tag sent to the service
const SUBMISSION_METHOD: &str = "jitsi_popup_auto";

static ROOM_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"meet\.jit\.si/(.+)").expect("static pattern"));

/// Room name from the meeting URL: the `meet.jit.si/<room>` capture, else the
/// last path segment. Query and fragment are ignored.
pub fn room_name_from_url(url: &str) -> Option<String> {
	let trimmed = url.split(['?', '#']).next().unwrap_or(url);
	if let Some(captures) = ROOM_PATTERN.captures(trimmed) {
		let room = captures[1].trim_matches('/').to_string();
		if !room.is_empty() {
			return Some(room);
		}
	}
	let without_scheme = trimmed.split_once("://").map(|(_, rest)| rest).unwrap_or(trimmed);
	let path = without_scheme.split_once('/').map(|(_, path)| path)?;
	path.split('/').filter(|segment| !segment.is_empty()).next_back().map(|segment| segment.to_string())
}

/// What a popup-status response means for the widget
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum PopupAction {
	/// No active popup (or an inactive one): hide anything visible
	Hide,
	/// Same popup as last tick: leave the widget alone
	Ignore,
	/// New popup id: (re)show
	Show,
}

pub(crate) fn classify_popup(status: Option<&Popup>, current_popup_id: Option<&str>) -> PopupAction {
	match status {
		None => PopupAction::Hide,
		Some(popup) if !popup.is_active() => PopupAction::Hide,
		Some(popup) if Some(popup.popup_id.as_str()) == current_popup_id => PopupAction::Ignore,
		Some(_) => PopupAction::Show,
	}
}

/// Render guard for a new popup: suppressed when already answered or expired
pub(crate) fn should_render(popup: &Popup, already_responded: bool, now: chrono::DateTime<chrono::Local>) -> bool {
	!already_responded && !popup.is_expired(now)
}

pub struct AttendanceMonitor {
	page: Page,
	config: AppConfig,
	room_name: String,
	tracker: ResponseTracker,
	current_session_id: Option<String>,
	/// Identity of the last-shown popup; the sole re-render dedup signal
	current_popup_id: Option<String>,
	/// The popup actually on screen, if any
	current_popup: Option<Popup>,
	cached_roll: Option<String>,
}

/// Running monitor; aborting it clears the timer and hides any widget
pub struct MonitorHandle {
	task: JoinHandle<()>,
	page: Page,
}

impl MonitorHandle {
	pub async fn stop(self) {
		self.task.abort();
		if let Err(e) = widget::hide_popup(&self.page).await {
			elog!("Failed to hide widget on teardown: {}", e);
		}
	}
}

impl AttendanceMonitor {
	pub fn new(page: Page, room_name: String, config: AppConfig, tracker: ResponseTracker) -> Self {
		let cached_roll = config.student_roll.as_ref().map(|roll| roll.trim().to_uppercase()).filter(|roll| !roll.is_empty());
		Self {
			page,
			config,
			room_name,
			tracker,
			current_session_id: None,
			current_popup_id: None,
			current_popup: None,
			cached_roll,
		}
	}

	/// Spawn the poll loop. Ticks run on a fixed interval; overlap between a
	/// slow tick and the next one is accepted, not guarded.
	pub fn start(self) -> MonitorHandle {
		let page = self.page.clone();
		let interval_secs = self.config.check_interval_secs.max(1);
		log!("Attendance monitoring active for room: {}", self.room_name);
		let task = tokio::spawn(async move {
			let mut monitor = self;
			let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
			loop {
				interval.tick().await;
				if let Err(e) = monitor.tick().await {
					elog!("Monitoring error: {}", e);
				}
			}
		});
		MonitorHandle { task, page }
	}

	/// One poll cycle: collect any pending click, resolve the session if
	/// needed, then reconcile the widget with the service's popup status.
	async fn tick(&mut self) -> Result<()> {
		if let Some(selection) = widget::take_selection(&self.page).await? {
			self.handle_selection(selection).await?;
		}

		if self.current_session_id.is_none() {
			match api::find_session_for_room(&self.page, &self.config.api_base_url, &self.room_name).await {
				Ok(Some(session_id)) => {
					log!("Monitoring session: {}", session_id);
					self.current_session_id = Some(session_id);
					widget::show_toast(&self.page, "Connected to attendance system!", ToastKind::Success).await?;
				}
				Ok(None) => {
					if self.config.debug {
						log!("No active session matches room {} yet", self.room_name);
					}
					return Ok(());
				}
				Err(e) => {
					// No data this tick; the next tick retries
					tracing::debug!("Session lookup failed: {}", e);
					return Ok(());
				}
			}
		}

		let Some(session_id) = self.current_session_id.clone() else { return Ok(()) };

		let status = match api::fetch_popup_status(&self.page, &self.config.api_base_url, &session_id).await {
			Ok(status) => status,
			Err(e) => {
				tracing::debug!("Popup status fetch failed: {}", e);
				return Ok(());
			}
		};

		// Rust-side backup for the in-page expiry timer
		if let Some(current) = &self.current_popup
			&& current.is_expired(chrono::Local::now())
		{
			log!("Popup {} expired, hiding widget", current.popup_id);
			self.current_popup = None;
			widget::hide_popup(&self.page).await?;
		}

		match classify_popup(status.as_ref(), self.current_popup_id.as_deref()) {
			PopupAction::Hide => {
				if self.current_popup.take().is_some() {
					widget::hide_popup(&self.page).await?;
				}
			}
			PopupAction::Ignore => {
				if self.config.debug {
					tracing::debug!("Popup unchanged, widget untouched");
				}
			}
			PopupAction::Show => {
				let popup = status.ok_or_else(|| eyre!("Show action without popup data"))?;
				self.current_popup_id = Some(popup.popup_id.clone());
				self.show_popup(popup).await?;
			}
		}

		Ok(())
	}

	/// Render a newly observed popup, unless the user already answered it or
	/// it has expired
	async fn show_popup(&mut self, popup: Popup) -> Result<()> {
		let already_responded = self.tracker.has_responded(&popup.popup_id);
		let now = chrono::Local::now();
		if !should_render(&popup, already_responded, now) {
			if already_responded {
				log!("Already responded to popup {} - not showing again", popup.popup_id);
			} else {
				log!("Popup {} has already expired", popup.popup_id);
			}
			return Ok(());
		}

		log!("Showing popup {}:\n{}", popup.popup_id, popup);
		widget::render_popup(&self.page, &popup).await?;
		let message = format!("Attendance check started! Please respond within {} minutes.", popup.remaining_minutes(now));
		widget::show_toast(&self.page, &message, ToastKind::Info).await?;
		self.current_popup = Some(popup);
		Ok(())
	}

	/// Submit the clicked option. Success marks the popup responded and
	/// removes the widget; failure re-enables the buttons for a manual retry.
	async fn handle_selection(&mut self, selection: Selection) -> Result<()> {
		let Some(popup) = self.current_popup.clone() else {
			// Stale marker from a widget we no longer track
			return Ok(());
		};
		let Some(session_id) = self.current_session_id.clone() else { return Ok(()) };

		log!("Student responded: {}", selection.option);

		let Some(student_roll) = self.resolve_roll().await? else {
			widget::reenable_options(&self.page).await?;
			return Ok(());
		};

		let participant_name = roll::scrape_participant_name(&self.page).await?.unwrap_or_default();
		let submission = AttendanceSubmission {
			session_id,
			student_roll: student_roll.clone(),
			method: SUBMISSION_METHOD.to_string(),
			response: selection.option,
			option_index: selection.index,
			popup_id: popup.popup_id.clone(),
			participant_name,
			room_name: Some(self.room_name.clone()),
		};

		match api::submit_attendance(&self.page, &self.config.api_base_url, &submission).await {
			Ok(ack) if ack.success => {
				log!("Attendance marked for {} on popup {}", student_roll, popup.popup_id);
				let message = format!("Attendance marked successfully for {}!", student_roll);
				widget::show_toast(&self.page, &message, ToastKind::Success).await?;
				self.tracker.mark_responded(&popup.popup_id);
				self.current_popup = None;
				widget::animate_remove_popup(&self.page).await?;
			}
			Ok(ack) => {
				let message = ack.message.unwrap_or_else(|| "Submission rejected".to_string());
				elog!("Attendance submission rejected: {}", message);
				widget::show_toast(&self.page, &format!("Error: {}", message), ToastKind::Error).await?;
				widget::reenable_options(&self.page).await?;
			}
			Err(e) => {
				elog!("Error submitting attendance: {}", e);
				widget::show_toast(&self.page, "Failed to submit attendance. Please try again.", ToastKind::Error).await?;
				widget::reenable_options(&self.page).await?;
			}
		}

		Ok(())
	}

	/// Roll number: cached, else scraped from the page, else prompted on the
	/// terminal. None means the submission must be aborted.
	async fn resolve_roll(&mut self) -> Result<Option<String>> {
		if let Some(roll) = &self.cached_roll {
			return Ok(Some(roll.clone()));
		}

		if let Some(roll) = roll::extract_roll(&self.page).await? {
			self.cached_roll = Some(roll.clone());
			return Ok(Some(roll));
		}

		match roll::prompt_roll_number().await? {
			ManualEntry::Valid(roll) => {
				self.cached_roll = Some(roll.clone());
				Ok(Some(roll))
			}
			ManualEntry::Invalid(input) => {
				elog!("Invalid roll number entered: {}", input);
				widget::show_toast(&self.page, "Invalid roll number format. Please use format like: 23CSEDS001", ToastKind::Error).await?;
				Ok(None)
			}
			ManualEntry::Cancelled => {
				widget::show_toast(&self.page, "Roll number is required to mark attendance", ToastKind::Error).await?;
				Ok(None)
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use chrono::{Duration, Local};

	use super::*;

	fn popup(id: &str, status: &str, expires_in_minutes: i64) -> Popup {
		Popup {
			popup_id: id.to_string(),
			question: None,
			options: None,
			expires_at: (Local::now() + Duration::minutes(expires_in_minutes)).to_rfc3339(),
			status: Some(status.to_string()),
		}
	}

	#[test]
	fn room_name_from_jitsi_urls() {
		assert_eq!(room_name_from_url("https://meet.jit.si/algebra-101").as_deref(), Some("algebra-101"));
		assert_eq!(room_name_from_url("https://meet.jit.si/algebra-101?userDisplayName=Jane#config").as_deref(), Some("algebra-101"));
		assert_eq!(room_name_from_url("https://jitsi.example.org/rooms/physics-1").as_deref(), Some("physics-1"));
		assert_eq!(room_name_from_url("https://example.org"), None);
		assert_eq!(room_name_from_url("https://example.org/"), None);
	}

	#[test]
	fn no_popup_hides_widget() {
		assert_eq!(classify_popup(None, Some("P1")), PopupAction::Hide);
		assert_eq!(classify_popup(None, None), PopupAction::Hide);
	}

	#[test]
	fn inactive_popup_hides_widget() {
		let p = popup("P1", "expired", 5);
		assert_eq!(classify_popup(Some(&p), None), PopupAction::Hide);
	}

	#[test]
	fn same_popup_id_is_not_rerendered() {
		let p = popup("P1", "active", 5);
		assert_eq!(classify_popup(Some(&p), Some("P1")), PopupAction::Ignore);
	}

	#[test]
	fn new_popup_id_is_shown() {
		let p = popup("P2", "active", 5);
		assert_eq!(classify_popup(Some(&p), Some("P1")), PopupAction::Show);
		assert_eq!(classify_popup(Some(&p), None), PopupAction::Show);
	}

	#[test]
	fn render_guard_suppresses_responded_and_expired() {
		let now = Local::now();
		let fresh = popup("P1", "active", 5);
		assert!(should_render(&fresh, false, now));
		assert!(!should_render(&fresh, true, now));
		let expired = popup("P2", "active", -1);
		assert!(!should_render(&expired, false, now));
	}
}
