use v_utils::macros::{MyConfigPrimitives, Settings};

#[derive(Clone, Debug, Default, MyConfigPrimitives, Settings)]
pub struct AppConfig {
	/// Base URL of the attendance service
	#[settings(default = default_api_base_url())]
	pub api_base_url: String,
	/// Seconds between popup-status polls (default: 3)
	#[serde(default = "default_check_interval_secs")]
	pub check_interval_secs: u64,
	/// Seconds to wait after navigation before monitoring starts, lets the meeting UI settle (default: 2)
	#[serde(default = "default_startup_delay_secs")]
	pub startup_delay_secs: u64,
	/// Pre-set roll number; skips display-name extraction and prompting
	#[serde(default)]
	pub student_roll: Option<String>,
	/// Verbose per-tick logging
	#[serde(default)]
	pub debug: bool,
	/// Run with visible browser window (non-headless mode)
	#[serde(default)]
	pub visible: bool,
}

fn default_api_base_url() -> String {
	"http://localhost:5000".to_string()
}

fn default_check_interval_secs() -> u64 {
	3
}

fn default_startup_delay_secs() -> u64 {
	2
}

impl AppConfig {
	/// Config with serde defaults applied (derived `Default` zeroes the fields)
	pub fn with_defaults() -> Self {
		Self {
			api_base_url: default_api_base_url(),
			check_interval_secs: default_check_interval_secs(),
			startup_delay_secs: default_startup_delay_secs(),
			..Self::default()
		}
	}
}
