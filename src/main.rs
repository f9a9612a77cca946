mod bootstrap;
mod cycler;
mod data_loaders;
mod host;
mod ipc;
mod logging;
mod model;
mod paths;
mod popup;
mod rotator;
mod router;
mod runtime;
mod store;

use std::{
	io::{self, Write},
	sync::mpsc::TryRecvError,
	thread,
	time::{Duration, Instant},
};

use crate::{
	data_loaders::config::AppConfig,
	ipc::{spawn_stdin_listener, write_response, Inbound},
	paths::{config_path, data_root_dir},
	runtime::LocalRuntime,
};

pub const DEBUG_NAME: &str = "THEMATIC";

fn main() -> anyhow::Result<()> {
	let exit_on_eof = std::env::args().skip(1).any(|a| a == "--once");

	logging::init(false, "warn");

	let root = data_root_dir();
	bootstrap::bootstrap_data_dir(&root);

	let config_path = config_path();
	let config = AppConfig::load(&config_path).unwrap_or_default();

	logging::set_debug(config.debug);
	logging::set_level(&config.log_level);
	std::panic::set_hook(Box::new(|panic_info| {
		error!("[{}] Panic: {}", DEBUG_NAME, panic_info);
	}));

	info!("!---------- [{}] Starting Thematic Backgrounds ----------!", DEBUG_NAME);
	info!("[{}] Config loaded from {}", DEBUG_NAME, config_path.display());

	let mut runtime = LocalRuntime::from_config(&config);
	bootstrap::seed_store(&mut runtime.store);
	runtime.resume();

	let loop_sleep = Duration::from_millis(config.settings.runtime.tick_sleep_ms.max(1));
	let requests = spawn_stdin_listener();
	let mut stdout = io::stdout();
	let mut input_open = true;

	loop {
		while input_open {
			match requests.try_recv() {
				Ok(Inbound::Message(message)) => {
					if let Some(reply) = runtime.handle_message(&message) {
						if let Err(e) = write_response(&mut stdout, &reply) {
							warn!("[{}][IPC] Failed to write response: {e:#}", DEBUG_NAME);
						}
					}
				}
				Ok(Inbound::Closed) | Err(TryRecvError::Disconnected) => {
					info!("[{}][IPC] Request input closed", DEBUG_NAME);
					input_open = false;
				}
				Err(TryRecvError::Empty) => break,
			}
		}

		if !input_open && exit_on_eof {
			let _ = stdout.flush();
			info!("[{}] Input exhausted; exiting", DEBUG_NAME);
			return Ok(());
		}

		runtime.tick_alarms(Instant::now());
		thread::sleep(loop_sleep);
	}
}
