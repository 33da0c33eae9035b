pub mod alarm;
#[cfg(feature = "audio")]
pub mod audio;
pub mod clock;
pub mod config;
pub mod context;
pub mod errors;
pub mod models;
pub mod notifications;
pub mod recheck;
pub mod schedule;
pub mod settings;
pub mod store;
mod utils;

#[cfg(feature = "app")]
mod bridge;
#[cfg(feature = "app")]
mod commands;

#[cfg(test)]
mod test_utils;

#[cfg(feature = "app")]
pub(crate) use app::AppState;
#[cfg(feature = "app")]
pub use app::run;

#[cfg(feature = "app")]
mod app {
    use std::sync::Arc;

    use log::{info, warn};
    use tauri::{Manager, RunEvent};

    use crate::{
        alarm::{AlarmCue, AlarmOutputs},
        bridge::{WebviewHaptics, WebviewNotifications, WebviewPresenter},
        clock::SystemClock,
        commands,
        config::ReminderConfig,
        context::{AppContext, InitState},
        settings::SettingsStore,
        store::{KeyValueStore, MemoryStore, SqliteStore},
    };

    pub(crate) struct AppState {
        pub(crate) context: Arc<AppContext>,
        pub(crate) notifications: Arc<WebviewNotifications>,
    }

    #[cfg(feature = "audio")]
    fn alarm_cue() -> Arc<dyn AlarmCue> {
        Arc::new(crate::audio::RodioCue::new())
    }

    #[cfg(not(feature = "audio"))]
    fn alarm_cue() -> Arc<dyn AlarmCue> {
        Arc::new(crate::alarm::SilentCue)
    }

    #[cfg_attr(mobile, tauri::mobile_entry_point)]
    pub fn run() {
        let config = ReminderConfig::from_env();

        // Initialize logging (reads RUST_LOG env var)
        let level = if config.debug_mode {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };
        env_logger::Builder::from_default_env()
            .filter_level(level)
            .init();

        info!("Medminder starting up...");

        let app = tauri::Builder::default()
            .plugin(tauri_plugin_opener::init())
            .setup(move |app| {
                let result = (|| -> anyhow::Result<()> {
                    let app_data_dir = app
                        .path()
                        .app_data_dir()
                        .map_err(|err| anyhow::anyhow!(err))?;
                    std::fs::create_dir_all(&app_data_dir)?;

                    let db_path = app_data_dir.join("medminder.sqlite3");
                    let backend: Arc<dyn KeyValueStore> = match SqliteStore::open(db_path) {
                        Ok(store) => Arc::new(store),
                        Err(err) => {
                            warn!("Database unavailable, medicines won't persist: {err:#}");
                            Arc::new(MemoryStore::new())
                        }
                    };

                    let settings_path = app_data_dir.join("settings.json");
                    let settings = Arc::new(SettingsStore::new(settings_path)?);

                    let handle = app.handle().clone();
                    let notifications = Arc::new(WebviewNotifications::new(handle.clone()));
                    let outputs = AlarmOutputs {
                        cue: alarm_cue(),
                        haptics: Arc::new(WebviewHaptics::new(handle.clone())),
                        presenter: Arc::new(WebviewPresenter::new(handle)),
                    };

                    let context = tauri::async_runtime::block_on(async {
                        let context = Arc::new(AppContext::new(
                            backend,
                            notifications.clone(),
                            outputs,
                            settings,
                            Arc::new(SystemClock),
                            config.clone(),
                        ));
                        if let InitState::Failed(reason) = context.initialize().await {
                            warn!("Reminders disabled: {reason}");
                        }
                        context
                    });

                    app.manage(AppState {
                        context,
                        notifications,
                    });

                    Ok(())
                })();

                result.map_err(|err| err.into())
            })
            .invoke_handler(tauri::generate_handler![
                commands::get_init_state,
                commands::list_medicines,
                commands::add_medicine,
                commands::toggle_medicine,
                commands::delete_medicine,
                commands::mark_taken,
                commands::next_dose,
                commands::get_alarm_state,
                commands::take_alarm,
                commands::snooze_alarm,
                commands::dismiss_alarm,
                commands::get_alarm_settings,
                commands::set_alarm_settings,
                commands::set_notification_permission,
                commands::send_test_notification,
            ])
            .build(tauri::generate_context!())
            .expect("error while building tauri application");

        app.run(|app_handle, event| {
            if let RunEvent::Exit = event {
                if let Some(state) = app_handle.try_state::<AppState>() {
                    let context = state.context.clone();
                    tauri::async_runtime::block_on(async move { context.shutdown().await });
                }
            }
        });
    }
}
