//! Persisted record of popups the user has already answered.
//!
//! A popup id in this set must never be rendered again. The set is a plain
//! JSON list in the state dir; it is never pruned.

use std::path::PathBuf;

#[cfg(feature = "xdg")]
use v_utils::xdg_state_dir;
use v_utils::{elog, log};

const STORAGE_FILENAME: &str = "responded_popups.json";

pub struct ResponseTracker {
	path: PathBuf,
}

impl ResponseTracker {
	pub fn new(path: PathBuf) -> Self {
		Self { path }
	}

	/// Tracker backed by the standard state location
	pub fn at_default_location() -> Self {
		#[cfg(feature = "xdg")]
		let dir = xdg_state_dir!("attendance");
		#[cfg(not(feature = "xdg"))]
		let dir = std::env::temp_dir().join("attendance_headless");
		Self::new(dir.join(STORAGE_FILENAME))
	}

	/// True if a successful submission for this popup was recorded earlier
	pub fn has_responded(&self, popup_id: &str) -> bool {
		self.load().iter().any(|id| id == popup_id)
	}

	/// Record a successful submission. Idempotent; storage failures are logged and swallowed.
	pub fn mark_responded(&self, popup_id: &str) {
		let mut responded = self.load();
		if responded.iter().any(|id| id == popup_id) {
			return;
		}
		responded.push(popup_id.to_string());
		self.save(&responded);
		log!("Marked popup {} as responded - will not show again", popup_id);
	}

	/// Placeholder kept from the original design: re-saves the set without
	/// filtering anything out. Unbounded growth is accepted.
	pub fn cleanup_old_responses(&self) {
		let responded = self.load();
		self.save(&responded);
	}

	/// Read the stored set; a missing or corrupt file is the empty set
	fn load(&self) -> Vec<String> {
		let raw = match std::fs::read_to_string(&self.path) {
			Ok(raw) => raw,
			Err(_) => return Vec::new(),
		};
		match serde_json::from_str(&raw) {
			Ok(ids) => ids,
			Err(e) => {
				elog!("Corrupt response storage at {} ({}), treating as empty", self.path.display(), e);
				Vec::new()
			}
		}
	}

	fn save(&self, responded: &[String]) {
		if let Some(parent) = self.path.parent()
			&& let Err(e) = std::fs::create_dir_all(parent)
		{
			elog!("Failed to create response storage dir: {}", e);
			return;
		}
		let json = match serde_json::to_string(responded) {
			Ok(json) => json,
			Err(e) => {
				elog!("Failed to encode response storage: {}", e);
				return;
			}
		};
		if let Err(e) = std::fs::write(&self.path, json) {
			elog!("Failed to write response storage: {}", e);
		}
	}
}
