use attendance_headless::{
	config::AppConfig,
	monitor::{self, AttendanceMonitor},
	tracker::ResponseTracker,
};
use chromiumoxide::browser::{Browser, BrowserConfig};
use clap::Parser;
use color_eyre::{Result, eyre::eyre};
use futures::StreamExt;

#[derive(Debug, Parser)]
#[command(name = "attendance_headless")]
#[command(about = "Headless attendance monitor for Jitsi meetings", long_about = None)]
struct Args {
	/// Jitsi meeting URL to join and watch
	meeting_url: String,

	/// Run with visible browser window (non-headless mode)
	#[arg(long)]
	visible: bool,

	/// Base URL of the attendance service
	#[arg(long, default_value = "http://localhost:5000")]
	api_base_url: String,

	/// Seconds between popup-status polls
	#[arg(long, default_value_t = 3)]
	interval: u64,

	/// Room name override (otherwise derived from the meeting URL)
	#[arg(long)]
	room: Option<String>,

	/// Roll number override (otherwise extracted from the display name)
	#[arg(long)]
	roll: Option<String>,

	/// Verbose per-tick logging
	#[arg(long)]
	debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	let args = Args::parse();

	let room_name = match args.room.clone() {
		Some(room) => room,
		None => monitor::room_name_from_url(&args.meeting_url).ok_or_else(|| eyre!("Could not determine room name from {}", args.meeting_url))?,
	};

	let config = AppConfig {
		api_base_url: args.api_base_url.clone(),
		check_interval_secs: args.interval,
		student_roll: args.roll.clone(),
		debug: args.debug,
		visible: args.visible,
		..AppConfig::with_defaults()
	};

	println!("Starting attendance monitor...");
	println!("Room: {room_name}");
	println!("Service: {}", config.api_base_url);

	let browser_config = if config.visible {
		BrowserConfig::builder()
			.with_head() // Visible browser with UI
			.build()
			.map_err(|e| eyre!("Failed to build browser config: {}", e))?
	} else {
		BrowserConfig::builder()
			.build() // Headless mode
			.map_err(|e| eyre!("Failed to build browser config: {}", e))?
	};

	let (mut browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| eyre!("Failed to launch browser: {}", e))?;

	// Drain CDP events so the browser doesn't hang
	let handle = tokio::spawn(async move {
		while let Some(_event) = handler.next().await {
			// Silently consume events
		}
	});

	let page = browser.new_page("about:blank").await.map_err(|e| eyre!("Failed to create new page: {}", e))?;

	println!("Navigating to meeting...");
	page.goto(&args.meeting_url).await.map_err(|e| eyre!("Failed to navigate: {}", e))?;

	// Let the meeting UI settle before monitoring starts
	tokio::time::sleep(tokio::time::Duration::from_secs(config.startup_delay_secs)).await;

	let tracker = ResponseTracker::at_default_location();
	tracker.cleanup_old_responses();

	let running = AttendanceMonitor::new(page.clone(), room_name, config, tracker).start();

	println!("Monitoring for attendance prompts. Press Ctrl+C to exit...");
	tokio::signal::ctrl_c().await?;

	running.stop().await;

	// Clean up
	drop(page);
	browser.close().await.map_err(|e| eyre!("Failed to close browser: {}", e))?;
	drop(browser);
	handle.abort();

	Ok(())
}
