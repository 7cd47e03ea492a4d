//! In-page rendering of the attendance widget and toast notifications.
//!
//! The page owns at most one widget node at a time. Buttons record the
//! user's pick in a page-global marker and disable themselves immediately;
//! the poll loop collects the marker and performs the submission, so the
//! disable is an advisory guard only.

use chromiumoxide::Page;
use chrono::Local;
use color_eyre::{Result, eyre::eyre};
use serde::{Deserialize, Serialize};

use crate::Popup;

const WIDGET_ID: &str = "jitsi-auto-attendance-popup";
const SELECTION_MARKER: &str = "__attendanceSelection";

/// Option the user clicked, as recorded by the widget's buttons
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct Selection {
	pub option: String,
	pub index: usize,
}

pub fn parse_selection(raw: &str) -> Result<Selection> {
	serde_json::from_str(raw).map_err(|e| eyre!("Failed to parse selection marker: {}", e))
}

#[derive(Clone, Copy, Debug)]
pub enum ToastKind {
	Success,
	Error,
	Warning,
	Info,
}

impl ToastKind {
	fn color(self) -> &'static str {
		match self {
			ToastKind::Success => "#28a745",
			ToastKind::Error => "#dc3545",
			ToastKind::Warning => "#ffc107",
			ToastKind::Info => "#17a2b8",
		}
	}
}

#[derive(Serialize)]
struct RenderPayload<'a> {
	question: &'a str,
	options: Vec<String>,
	remaining_minutes: i64,
	remaining_ms: i64,
}

/// Chromium treats setTimeout delays above 2^31-1 ms as 0, which would remove
/// a far-out widget on render; the poll loop's expiry check covers the rest
fn clamp_timer_ms(remaining_ms: i64) -> i64 {
	remaining_ms.min(i64::from(i32::MAX))
}

/// Inject the widget for a popup. Replaces any existing widget node, clears
/// the selection marker, and schedules in-page self-removal at the expiry
/// instant. Guards (already responded, already expired) belong to the caller.
pub async fn render_popup(page: &Page, popup: &Popup) -> Result<()> {
	let now = Local::now();
	let payload = RenderPayload {
		question: popup.question_text(),
		options: popup.option_labels(),
		remaining_minutes: popup.remaining_minutes(now),
		remaining_ms: clamp_timer_ms(popup.remaining_ms(now)),
	};
	let payload = serde_json::to_string(&payload).map_err(|e| eyre!("Failed to encode widget payload: {}", e))?;

	let script = format!(
		r#"
		(function() {{
			const payload = {payload};

			const existing = document.getElementById('{WIDGET_ID}');
			if (existing) existing.remove();
			window.{SELECTION_MARKER} = null;

			const popup = document.createElement('div');
			popup.id = '{WIDGET_ID}';
			popup.style.cssText = 'position:fixed;top:20px;right:20px;background:linear-gradient(135deg,#007bff,#0056b3);' +
				'color:white;padding:25px;border-radius:15px;box-shadow:0 10px 30px rgba(0,0,0,0.4);z-index:999999;' +
				'font-family:-apple-system,BlinkMacSystemFont,Segoe UI,Roboto,sans-serif;min-width:320px;max-width:400px;' +
				'border:3px solid rgba(255,255,255,0.3);';

			const title = document.createElement('h3');
			title.textContent = 'Attendance Check';
			title.style.cssText = 'margin:0 0 18px 0;font-size:20px;font-weight:600;';
			popup.appendChild(title);

			const question = document.createElement('p');
			question.textContent = payload.question;
			question.style.cssText = 'margin:0 0 20px 0;font-size:16px;line-height:1.5;';
			popup.appendChild(question);

			const optionsBox = document.createElement('div');
			payload.options.forEach((option, index) => {{
				const btn = document.createElement('button');
				btn.className = 'attendance-option-btn';
				btn.dataset.label = option;
				btn.dataset.index = index;
				btn.textContent = option;
				btn.style.cssText = 'display:block;width:100%;margin:10px 0;padding:14px 18px;background:rgba(255,255,255,0.15);' +
					'border:2px solid rgba(255,255,255,0.35);color:white;border-radius:10px;cursor:pointer;font-size:15px;font-weight:600;';
				btn.addEventListener('click', () => {{
					window.{SELECTION_MARKER} = JSON.stringify({{ option: option, index: index }});
					for (const b of popup.querySelectorAll('.attendance-option-btn')) {{
						b.disabled = true;
						b.style.opacity = '0.5';
						b.style.pointerEvents = 'none';
						b.textContent = 'Submitting...';
					}}
				}});
				optionsBox.appendChild(btn);
			}});
			popup.appendChild(optionsBox);

			const footer = document.createElement('div');
			footer.style.cssText = 'display:flex;justify-content:space-between;align-items:center;padding-top:12px;' +
				'border-top:1px solid rgba(255,255,255,0.25);font-size:13px;';
			const remaining = document.createElement('span');
			remaining.textContent = payload.remaining_minutes + ' min remaining';
			footer.appendChild(remaining);
			const dismiss = document.createElement('button');
			dismiss.textContent = 'Dismiss';
			dismiss.style.cssText = 'background:rgba(255,255,255,0.2);border:none;color:white;padding:6px 12px;' +
				'border-radius:6px;cursor:pointer;font-size:11px;';
			dismiss.addEventListener('click', () => popup.remove());
			footer.appendChild(dismiss);
			popup.appendChild(footer);

			document.body.appendChild(popup);

			setTimeout(() => {{
				const node = document.getElementById('{WIDGET_ID}');
				if (node) node.remove();
			}}, payload.remaining_ms);

			return true;
		}})()
		"#
	);

	page.evaluate(script).await.map_err(|e| eyre!("Failed to render widget: {}", e))?;
	Ok(())
}

/// Remove the widget node and clear the selection marker. Idempotent.
pub async fn hide_popup(page: &Page) -> Result<()> {
	let script = format!(
		r#"
		(function() {{
			window.{SELECTION_MARKER} = null;
			const node = document.getElementById('{WIDGET_ID}');
			if (node) {{ node.remove(); return true; }}
			return false;
		}})()
		"#
	);
	page.evaluate(script).await.map_err(|e| eyre!("Failed to hide widget: {}", e))?;
	Ok(())
}

/// Slide the widget out before removal (used after a successful submission)
pub async fn animate_remove_popup(page: &Page) -> Result<()> {
	let script = format!(
		r#"
		(function() {{
			window.{SELECTION_MARKER} = null;
			const node = document.getElementById('{WIDGET_ID}');
			if (!node) return false;
			node.style.transition = 'transform 0.3s ease-in, opacity 0.3s ease-in';
			node.style.transform = 'translateX(100%)';
			node.style.opacity = '0';
			setTimeout(() => node.remove(), 300);
			return true;
		}})()
		"#
	);
	page.evaluate(script).await.map_err(|e| eyre!("Failed to remove widget: {}", e))?;
	Ok(())
}

/// Read and clear the click marker left by the option buttons
pub async fn take_selection(page: &Page) -> Result<Option<Selection>> {
	let script = format!(
		r#"
		(function() {{
			const selection = window.{SELECTION_MARKER} || null;
			window.{SELECTION_MARKER} = null;
			return selection;
		}})()
		"#
	);
	let result = page.evaluate(script).await.map_err(|e| eyre!("Failed to read selection marker: {}", e))?;
	match result.value().and_then(|v| v.as_str()) {
		Some(raw) => Ok(Some(parse_selection(raw)?)),
		None => Ok(None),
	}
}

/// Restore the option buttons after a failed submission so the user can retry
pub async fn reenable_options(page: &Page) -> Result<()> {
	let script = format!(
		r#"
		(function() {{
			const node = document.getElementById('{WIDGET_ID}');
			if (!node) return false;
			for (const btn of node.querySelectorAll('.attendance-option-btn')) {{
				btn.disabled = false;
				btn.style.opacity = '1';
				btn.style.pointerEvents = 'auto';
				btn.textContent = btn.dataset.label || btn.textContent;
			}}
			return true;
		}})()
		"#
	);
	page.evaluate(script).await.map_err(|e| eyre!("Failed to re-enable options: {}", e))?;
	Ok(())
}

/// Transient bottom-left banner, self-dismissing after 4s; independent of the widget
pub async fn show_toast(page: &Page, message: &str, kind: ToastKind) -> Result<()> {
	let message = serde_json::to_string(message).map_err(|e| eyre!("Failed to encode toast message: {}", e))?;
	let script = format!(
		r#"
		(function() {{
			const toast = document.createElement('div');
			toast.textContent = {message};
			toast.style.cssText = 'position:fixed;bottom:20px;left:20px;background:{color};color:white;' +
				'padding:16px 20px;border-radius:10px;box-shadow:0 6px 20px rgba(0,0,0,0.3);z-index:999999;' +
				'font-family:-apple-system,BlinkMacSystemFont,Segoe UI,Roboto,sans-serif;font-size:14px;max-width:350px;';
			document.body.appendChild(toast);
			setTimeout(() => toast.remove(), 4000);
			return true;
		}})()
		"#,
		color = kind.color()
	);
	page.evaluate(script).await.map_err(|e| eyre!("Failed to show toast: {}", e))?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn selection_marker_roundtrip() {
		let selection = parse_selection(r#"{"option": "Yes, I'm present", "index": 0}"#).unwrap();
		assert_eq!(selection, Selection { option: "Yes, I'm present".to_string(), index: 0 });
	}

	#[test]
	fn garbage_selection_marker_is_an_error() {
		assert!(parse_selection("clicked").is_err());
	}

	#[test]
	fn in_page_timer_stays_within_i32_range() {
		assert_eq!(clamp_timer_ms(5_000), 5_000);
		assert_eq!(clamp_timer_ms(i64::from(i32::MAX)), i64::from(i32::MAX));
		// ~25+ days out must not collapse to an immediate timeout
		assert_eq!(clamp_timer_ms(i64::from(i32::MAX) + 1), i64::from(i32::MAX));
	}
}
