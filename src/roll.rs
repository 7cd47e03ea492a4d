//! Roll number extraction from Jitsi display names.
//!
//! The roll number is a fixed alphanumeric shape (e.g. `23CSEDS001`) that
//! students are asked to put in their display name. Extraction tries an
//! ordered list of patterns against an ordered list of DOM selectors, then
//! URL parameters, then falls back to a terminal prompt.

use std::sync::LazyLock;

use chromiumoxide::Page;
use color_eyre::{Result, eyre::eyre};
use regex::Regex;
use v_utils::log;

/// Selector candidates for roll extraction, most specific first
const DISPLAY_NAME_SELECTORS: &[&str] = &[".localvideo .displayname", ".displayname", "[data-testid=\"displayname\"]", ".participant-name"];

/// Selectors used when capturing the participant name for submission bodies
const PARTICIPANT_NAME_SELECTORS: &[&str] = &[".localvideo .displayname", ".displayname", "[data-testid=\"displayname\"]"];

/// Ordered patterns over uppercased display-name text; first match wins
static NAME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
	[
		// In parentheses - "Name (23CSEDS001)"
		r"\([^)]*?(\d{2}[A-Z]{2,6}\d{2,3})[^)]*?\)",
		// Trailing - "Name 23CSEDS001"
		r"\s(\d{2}[A-Z]{2,6}\d{2,3})\s*$",
		// Leading - "23CSEDS001 Name"
		r"^(\d{2}[A-Z]{2,6}\d{2,3})\s+",
		// Anywhere in the text
		r"\b(\d{2}[A-Z]{2,6}\d{2,3})\b",
		// Subject-specific shapes
		r"(\d{2}CSE[A-Z]*\d{2,3})",
		r"(\d{2}BCA\d{2,3})",
		r"(\d{2}MCA\d{2,3})",
	]
	.iter()
	.map(|p| Regex::new(p).expect("static pattern"))
	.collect()
});

/// Reduced set used for URL query parameters
static URL_PARAM_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
	[r"\([^)]*?(\d{2}[A-Z]{2,6}\d{2,3})[^)]*?\)", r"\b(\d{2}[A-Z]{2,6}\d{2,3})\b"]
		.iter()
		.map(|p| Regex::new(p).expect("static pattern"))
		.collect()
});

/// Canonical shape for manually entered roll numbers
static MANUAL_ROLL_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{2}[A-Z]{3}[A-Z]*\d{3}$").expect("static pattern"));

/// Outcome of a manual roll-number entry
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ManualEntry {
	Valid(String),
	/// Non-empty input that failed validation
	Invalid(String),
	Cancelled,
}

fn first_match(text: &str, patterns: &[Regex]) -> Option<String> {
	let upper = text.to_uppercase();
	for pattern in patterns {
		if let Some(captures) = pattern.captures(&upper) {
			return Some(captures.get(1).map(|m| m.as_str()).unwrap_or_default().to_string());
		}
	}
	None
}

/// Extract a roll number from free-text display-name content
pub fn extract_roll_from_text(text: &str) -> Option<String> {
	first_match(text, &NAME_PATTERNS)
}

/// First roll number found across candidate texts: the full pattern list is
/// tried on each text in order, so a later candidate can still match when an
/// earlier one holds a plain name
pub fn extract_roll_from_texts<'a, I>(texts: I) -> Option<String>
where
	I: IntoIterator<Item = &'a str>,
{
	texts.into_iter().find_map(extract_roll_from_text)
}

/// Extract a roll number from a URL display-name parameter (reduced pattern set)
pub fn extract_roll_from_url_param(text: &str) -> Option<String> {
	first_match(text, &URL_PARAM_PATTERNS)
}

/// Validate a manually entered roll number against the canonical shape
pub fn validate_manual_roll(input: &str) -> ManualEntry {
	let trimmed = input.trim();
	if trimmed.is_empty() {
		return ManualEntry::Cancelled;
	}
	let upper = trimmed.to_uppercase();
	if MANUAL_ROLL_PATTERN.is_match(&upper) {
		ManualEntry::Valid(upper)
	} else {
		ManualEntry::Invalid(trimmed.to_string())
	}
}

/// Texts of every display-name candidate present in the DOM, in selector order
pub async fn scrape_display_name_candidates(page: &Page) -> Result<Vec<String>> {
	let script = format!(
		r#"
		(function() {{
			const selectors = {};
			const texts = [];
			for (const selector of selectors) {{
				const element = document.querySelector(selector);
				if (element) {{
					const text = element.textContent.trim();
					if (text) texts.push(text);
				}}
			}}
			return JSON.stringify(texts);
		}})()
		"#,
		serde_json::to_string(DISPLAY_NAME_SELECTORS)?
	);

	let result = page.evaluate(script).await.map_err(|e| eyre!("Failed to read display name candidates: {}", e))?;
	let json = result.value().and_then(|v| v.as_str()).unwrap_or("[]");
	serde_json::from_str(json).map_err(|e| eyre!("Failed to parse display name candidates: {}", e))
}

/// Display name sent as `participant_name` in submission bodies; first
/// non-empty candidate wins
pub async fn scrape_participant_name(page: &Page) -> Result<Option<String>> {
	let script = format!(
		r#"
		(function() {{
			const selectors = {};
			for (const selector of selectors) {{
				const element = document.querySelector(selector);
				if (element) {{
					const text = element.textContent.trim();
					if (text) return text;
				}}
			}}
			return null;
		}})()
		"#,
		serde_json::to_string(PARTICIPANT_NAME_SELECTORS)?
	);

	let result = page.evaluate(script).await.map_err(|e| eyre!("Failed to read participant name: {}", e))?;
	Ok(result.value().and_then(|v| v.as_str()).map(|s| s.to_string()))
}

/// Read a display-name hint from the page URL's query parameters
async fn url_display_name_param(page: &Page) -> Result<Option<String>> {
	let script = r#"
		(function() {
			const params = new URLSearchParams(window.location.search);
			return params.get('userDisplayName') || params.get('displayName');
		})()
	"#;

	let result = page.evaluate(script).await.map_err(|e| eyre!("Failed to read URL params: {}", e))?;
	Ok(result.value().and_then(|v| v.as_str()).map(|s| s.to_string()))
}

/// Try every display-name candidate in the DOM, then URL parameters. None
/// means the caller must prompt the user.
pub async fn extract_roll(page: &Page) -> Result<Option<String>> {
	for display_name in scrape_display_name_candidates(page).await? {
		log!("Found display name: {}", display_name);
		if let Some(roll) = extract_roll_from_text(&display_name) {
			log!("Extracted roll number: {} from: {}", roll, display_name);
			return Ok(Some(roll));
		}
	}

	if let Some(param) = url_display_name_param(page).await? {
		log!("Checking URL param: {}", param);
		if let Some(roll) = extract_roll_from_url_param(&param) {
			log!("Extracted roll number from URL: {}", roll);
			return Ok(Some(roll));
		}
	}

	Ok(None)
}

/// Ask for the roll number on the controlling terminal
pub async fn prompt_roll_number() -> Result<ManualEntry> {
	use tokio::io::{AsyncBufReadExt, BufReader};

	eprintln!("Could not detect your roll number from the meeting display name.");
	eprintln!("Enter your roll number (e.g. 23CSEDS001), or press Enter to cancel:");

	let mut line = String::new();
	let mut reader = BufReader::new(tokio::io::stdin());
	reader.read_line(&mut line).await.map_err(|e| eyre!("Failed to read roll number: {}", e))?;

	Ok(validate_manual_roll(&line))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn extracts_from_common_name_shapes() {
		let cases = [
			("John Doe (23CSEDS001)", "23CSEDS001"),
			("jane smith(24CSEAIML002)", "24CSEAIML002"),
			("Alice Johnson (23BCA003)", "23BCA003"),
			("Bob Wilson (24MCA004)", "24MCA004"),
			("John Doe 23CSEDS001", "23CSEDS001"),
			("23CSEDS001 John Doe", "23CSEDS001"),
			("23CSEDS001", "23CSEDS001"),
			("UDDHAB CHAKRABORTY (23CSEDS101)", "23CSEDS101"),
			("Student Name(22CSE070)", "22CSE070"),
			("Name with spaces (23CSEAIML123)", "23CSEAIML123"),
		];
		for (name, expected) in cases {
			assert_eq!(extract_roll_from_text(name).as_deref(), Some(expected), "input: {name:?}");
		}
	}

	#[test]
	fn lowercase_input_is_uppercased() {
		assert_eq!(extract_roll_from_text("john doe (23cseds001)").as_deref(), Some("23CSEDS001"));
	}

	#[test]
	fn non_matching_names_yield_none() {
		for name in ["Just a Name", "123456789", "Random Text", ""] {
			assert_eq!(extract_roll_from_text(name), None, "input: {name:?}");
		}
	}

	#[test]
	fn later_candidate_texts_are_tried_when_earlier_ones_have_no_roll() {
		// First selector holds a plain name; a later one carries the roll
		let texts = ["John Doe", "Jane (23CSEDS001)"];
		assert_eq!(extract_roll_from_texts(texts).as_deref(), Some("23CSEDS001"));

		let earlier_wins = ["23BCA003 Alice", "Bob (24MCA004)"];
		assert_eq!(extract_roll_from_texts(earlier_wins).as_deref(), Some("23BCA003"));

		assert_eq!(extract_roll_from_texts(["John Doe", "Jane Smith"]), None);
		assert_eq!(extract_roll_from_texts([]), None);
	}

	#[test]
	fn participant_name_capture_has_its_own_selector_list() {
		assert!(!PARTICIPANT_NAME_SELECTORS.contains(&".participant-name"));
		assert!(DISPLAY_NAME_SELECTORS.contains(&".participant-name"));
	}

	#[test]
	fn url_param_set_is_reduced_but_matches_plain_rolls() {
		assert_eq!(extract_roll_from_url_param("Jane (24CSEAIML002)").as_deref(), Some("24CSEAIML002"));
		assert_eq!(extract_roll_from_url_param("24CSEAIML002"), Some("24CSEAIML002".to_string()));
		assert_eq!(extract_roll_from_url_param("no roll here"), None);
	}

	#[test]
	fn manual_entry_validation() {
		assert_eq!(validate_manual_roll("23CSEDS001"), ManualEntry::Valid("23CSEDS001".to_string()));
		assert_eq!(validate_manual_roll("  23cseds001 "), ManualEntry::Valid("23CSEDS001".to_string()));
		assert_eq!(validate_manual_roll("23CS001"), ManualEntry::Invalid("23CS001".to_string()));
		assert_eq!(validate_manual_roll("CSEDS001"), ManualEntry::Invalid("CSEDS001".to_string()));
		assert_eq!(validate_manual_roll("   "), ManualEntry::Cancelled);
	}
}
