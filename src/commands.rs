use std::sync::Arc;

use tauri::{AppHandle, Emitter, State};

use crate::{
    alarm::AlarmState,
    context::{AppContext, InitState},
    models::{MedicineRecord, NewMedicine},
    schedule::NextDose,
    settings::AlarmSettings,
    AppState,
};

fn context_from_state(state: &State<'_, AppState>) -> Arc<AppContext> {
    state.context.clone()
}

async fn broadcast_medicines(app: &AppHandle, context: &AppContext) {
    let medicines = context.medicines().await;
    if let Err(err) = app.emit("medicines-changed", medicines) {
        log::warn!("Failed to emit medicines-changed: {err}");
    }
}

#[tauri::command]
pub fn get_init_state(state: State<'_, AppState>) -> InitState {
    state.context.init_state()
}

#[tauri::command]
pub async fn list_medicines(state: State<'_, AppState>) -> Result<Vec<MedicineRecord>, String> {
    let context = context_from_state(&state);
    Ok(context.medicines().await)
}

#[tauri::command]
pub async fn add_medicine(
    state: State<'_, AppState>,
    app_handle: AppHandle,
    medicine: NewMedicine,
) -> Result<MedicineRecord, String> {
    let context = context_from_state(&state);
    let record = context
        .add_medicine(medicine)
        .await
        .map_err(|e| e.to_string())?;
    broadcast_medicines(&app_handle, &context).await;
    Ok(record)
}

#[tauri::command]
pub async fn toggle_medicine(
    state: State<'_, AppState>,
    app_handle: AppHandle,
    id: String,
) -> Result<MedicineRecord, String> {
    let context = context_from_state(&state);
    let record = context
        .toggle_medicine(&id)
        .await
        .map_err(|e| e.to_string())?;
    broadcast_medicines(&app_handle, &context).await;
    Ok(record)
}

#[tauri::command]
pub async fn delete_medicine(
    state: State<'_, AppState>,
    app_handle: AppHandle,
    id: String,
) -> Result<(), String> {
    let context = context_from_state(&state);
    context
        .delete_medicine(&id)
        .await
        .map_err(|e| e.to_string())?;
    broadcast_medicines(&app_handle, &context).await;
    Ok(())
}

#[tauri::command]
pub async fn mark_taken(
    state: State<'_, AppState>,
    app_handle: AppHandle,
    id: String,
) -> Result<MedicineRecord, String> {
    let context = context_from_state(&state);
    let record = context.mark_taken(&id).await.map_err(|e| e.to_string())?;
    broadcast_medicines(&app_handle, &context).await;
    Ok(record)
}

#[tauri::command]
pub async fn next_dose(state: State<'_, AppState>, id: String) -> Result<NextDose, String> {
    let context = context_from_state(&state);
    context.next_dose(&id).await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn get_alarm_state(state: State<'_, AppState>) -> Result<AlarmState, String> {
    let context = context_from_state(&state);
    Ok(context.alarm().state().await)
}

#[tauri::command]
pub async fn take_alarm(
    state: State<'_, AppState>,
    app_handle: AppHandle,
) -> Result<AlarmState, String> {
    let context = context_from_state(&state);
    let alarm_state = context.alarm().take().await.map_err(|e| e.to_string())?;
    broadcast_medicines(&app_handle, &context).await;
    Ok(alarm_state)
}

#[tauri::command]
pub async fn snooze_alarm(state: State<'_, AppState>) -> Result<AlarmState, String> {
    let context = context_from_state(&state);
    context.alarm().snooze().await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn dismiss_alarm(state: State<'_, AppState>) -> Result<AlarmState, String> {
    let context = context_from_state(&state);
    context.alarm().dismiss().await.map_err(|e| e.to_string())
}

#[tauri::command]
pub fn get_alarm_settings(state: State<'_, AppState>) -> AlarmSettings {
    state.context.settings().alarm()
}

#[tauri::command]
pub fn set_alarm_settings(
    state: State<'_, AppState>,
    settings: AlarmSettings,
) -> Result<AlarmSettings, String> {
    state
        .context
        .settings()
        .update_alarm(settings)
        .map_err(|e| e.to_string())
}

/// Called by the frontend after it asked for notification permission.
#[tauri::command]
pub async fn set_notification_permission(
    state: State<'_, AppState>,
    granted: bool,
) -> Result<usize, String> {
    state.notifications.set_permitted(granted);
    if !granted {
        return Ok(0);
    }
    let context = context_from_state(&state);
    Ok(context.resync_notifications().await)
}

#[tauri::command]
pub fn send_test_notification(state: State<'_, AppState>) -> bool {
    state.context.send_test_notification()
}
