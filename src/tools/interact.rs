//! Interaction tools (spec.md §6 "interact" capability): clicks, typing,
//! drag, keyboard, scrolling, and the emulation/clock knobs grouped under
//! the same family since all of them mutate page or page-adjacent state.

use schemars::JsonSchema;
use serde::Deserialize;

use crate::errors::BrokerError;
use crate::session::Session;

use super::ToolResult;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RefArgs {
    pub r#ref: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TypeArgs {
    pub r#ref: String,
    pub text: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DragArgs {
    pub from_ref: String,
    pub to_ref: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PressKeyArgs {
    pub key: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ScrollArgs {
    #[serde(default)]
    pub dx: f64,
    #[serde(default)]
    pub dy: f64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EmulateMediaArgs {
    pub media: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EmulateGeolocationArgs {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default = "default_accuracy")]
    pub accuracy: f64,
}

fn default_accuracy() -> f64 {
    100.0
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EmulateTimezoneArgs {
    pub timezone_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ClockFastForwardArgs {
    pub millis: u64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ClockSetFixedTimeArgs {
    pub epoch_millis: i64,
}

async fn active_index(session: &Session) -> Result<usize, BrokerError> {
    session.current_tab_or_die().await?;
    Ok(session.current_tab_index())
}

pub async fn click(session: &Session, args: serde_json::Value) -> Result<ToolResult, BrokerError> {
    let args: RefArgs = serde_json::from_value(args).map_err(|e| BrokerError::BadInput(e.to_string()))?;
    let idx = active_index(session).await?;
    let tabs = session.tabs().await;
    let tab = tabs.get(idx).ok_or(BrokerError::NoTab)?;
    let dom_index = tab.snapshots.resolve(&args.r#ref)?;
    tab.page.click_ref(dom_index).await.map_err(|e| BrokerError::Driver(e.to_string()))?;
    Ok(ToolResult::text(format!("clicked {}", args.r#ref)).capture_snapshot())
}

pub async fn type_text(session: &Session, args: serde_json::Value) -> Result<ToolResult, BrokerError> {
    let args: TypeArgs = serde_json::from_value(args).map_err(|e| BrokerError::BadInput(e.to_string()))?;
    let idx = active_index(session).await?;
    let tabs = session.tabs().await;
    let tab = tabs.get(idx).ok_or(BrokerError::NoTab)?;
    let dom_index = tab.snapshots.resolve(&args.r#ref)?;
    tab.page.type_ref(dom_index, &args.text).await.map_err(|e| BrokerError::Driver(e.to_string()))?;
    Ok(ToolResult::text(format!("typed into {}", args.r#ref)).capture_snapshot())
}

pub async fn hover(session: &Session, args: serde_json::Value) -> Result<ToolResult, BrokerError> {
    let args: RefArgs = serde_json::from_value(args).map_err(|e| BrokerError::BadInput(e.to_string()))?;
    let idx = active_index(session).await?;
    let tabs = session.tabs().await;
    let tab = tabs.get(idx).ok_or(BrokerError::NoTab)?;
    let dom_index = tab.snapshots.resolve(&args.r#ref)?;
    tab.page.hover_ref(dom_index).await.map_err(|e| BrokerError::Driver(e.to_string()))?;
    Ok(ToolResult::text(format!("hovered {}", args.r#ref)))
}

pub async fn drag(session: &Session, args: serde_json::Value) -> Result<ToolResult, BrokerError> {
    let args: DragArgs = serde_json::from_value(args).map_err(|e| BrokerError::BadInput(e.to_string()))?;
    let idx = active_index(session).await?;
    let tabs = session.tabs().await;
    let tab = tabs.get(idx).ok_or(BrokerError::NoTab)?;
    let from = tab.snapshots.resolve(&args.from_ref)?;
    let to = tab.snapshots.resolve(&args.to_ref)?;
    tab.page.drag_ref(from, to).await.map_err(|e| BrokerError::Driver(e.to_string()))?;
    Ok(ToolResult::text(format!("dragged {} to {}", args.from_ref, args.to_ref)).capture_snapshot())
}

pub async fn press_key(session: &Session, args: serde_json::Value) -> Result<ToolResult, BrokerError> {
    let args: PressKeyArgs = serde_json::from_value(args).map_err(|e| BrokerError::BadInput(e.to_string()))?;
    let idx = active_index(session).await?;
    let tabs = session.tabs().await;
    let tab = tabs.get(idx).ok_or(BrokerError::NoTab)?;
    tab.page.press_key(&args.key).await.map_err(|e| BrokerError::Driver(e.to_string()))?;
    Ok(ToolResult::text(format!("pressed {}", args.key)).capture_snapshot())
}

pub async fn scroll(session: &Session, args: serde_json::Value) -> Result<ToolResult, BrokerError> {
    let args: ScrollArgs = serde_json::from_value(args).map_err(|e| BrokerError::BadInput(e.to_string()))?;
    let idx = active_index(session).await?;
    let tabs = session.tabs().await;
    let tab = tabs.get(idx).ok_or(BrokerError::NoTab)?;
    tab.page.scroll_by(args.dx, args.dy).await.map_err(|e| BrokerError::Driver(e.to_string()))?;
    Ok(ToolResult::text("scrolled"))
}

pub async fn scroll_to_element(session: &Session, args: serde_json::Value) -> Result<ToolResult, BrokerError> {
    let args: RefArgs = serde_json::from_value(args).map_err(|e| BrokerError::BadInput(e.to_string()))?;
    let idx = active_index(session).await?;
    let tabs = session.tabs().await;
    let tab = tabs.get(idx).ok_or(BrokerError::NoTab)?;
    let dom_index = tab.snapshots.resolve(&args.r#ref)?;
    tab.page.scroll_to_ref(dom_index).await.map_err(|e| BrokerError::Driver(e.to_string()))?;
    Ok(ToolResult::text(format!("scrolled to {}", args.r#ref)))
}

pub async fn emulate_media(session: &Session, args: serde_json::Value) -> Result<ToolResult, BrokerError> {
    let args: EmulateMediaArgs = serde_json::from_value(args).map_err(|e| BrokerError::BadInput(e.to_string()))?;
    let idx = active_index(session).await?;
    let tabs = session.tabs().await;
    let tab = tabs.get(idx).ok_or(BrokerError::NoTab)?;
    tab.page.emulate_media(args.media.as_deref()).await.map_err(|e| BrokerError::Driver(e.to_string()))?;
    Ok(ToolResult::text("media emulation applied"))
}

pub async fn emulate_geolocation(session: &Session, args: serde_json::Value) -> Result<ToolResult, BrokerError> {
    let args: EmulateGeolocationArgs = serde_json::from_value(args).map_err(|e| BrokerError::BadInput(e.to_string()))?;
    let idx = active_index(session).await?;
    let tabs = session.tabs().await;
    let tab = tabs.get(idx).ok_or(BrokerError::NoTab)?;
    tab.page
        .emulate_geolocation(args.latitude, args.longitude, args.accuracy)
        .await
        .map_err(|e| BrokerError::Driver(e.to_string()))?;
    Ok(ToolResult::text("geolocation overridden"))
}

pub async fn emulate_timezone(session: &Session, args: serde_json::Value) -> Result<ToolResult, BrokerError> {
    let args: EmulateTimezoneArgs = serde_json::from_value(args).map_err(|e| BrokerError::BadInput(e.to_string()))?;
    let idx = active_index(session).await?;
    let tabs = session.tabs().await;
    let tab = tabs.get(idx).ok_or(BrokerError::NoTab)?;
    tab.page.emulate_timezone(&args.timezone_id).await.map_err(|e| BrokerError::Driver(e.to_string()))?;
    Ok(ToolResult::text("timezone overridden"))
}

pub async fn clock_install(session: &Session) -> Result<ToolResult, BrokerError> {
    let idx = active_index(session).await?;
    let tabs = session.tabs().await;
    let tab = tabs.get(idx).ok_or(BrokerError::NoTab)?;
    tab.page.clock_install().await.map_err(|e| BrokerError::Driver(e.to_string()))?;
    Ok(ToolResult::text("virtual clock installed"))
}

pub async fn clock_fast_forward(session: &Session, args: serde_json::Value) -> Result<ToolResult, BrokerError> {
    let args: ClockFastForwardArgs = serde_json::from_value(args).map_err(|e| BrokerError::BadInput(e.to_string()))?;
    let idx = active_index(session).await?;
    let tabs = session.tabs().await;
    let tab = tabs.get(idx).ok_or(BrokerError::NoTab)?;
    tab.page.clock_fast_forward(args.millis).await.map_err(|e| BrokerError::Driver(e.to_string()))?;
    Ok(ToolResult::text(format!("advanced clock by {}ms", args.millis)))
}

pub async fn clock_pause(session: &Session) -> Result<ToolResult, BrokerError> {
    let idx = active_index(session).await?;
    let tabs = session.tabs().await;
    let tab = tabs.get(idx).ok_or(BrokerError::NoTab)?;
    tab.page.clock_pause().await.map_err(|e| BrokerError::Driver(e.to_string()))?;
    Ok(ToolResult::text("clock paused"))
}

pub async fn clock_resume(session: &Session) -> Result<ToolResult, BrokerError> {
    let idx = active_index(session).await?;
    let tabs = session.tabs().await;
    let tab = tabs.get(idx).ok_or(BrokerError::NoTab)?;
    tab.page.clock_resume().await.map_err(|e| BrokerError::Driver(e.to_string()))?;
    Ok(ToolResult::text("clock resumed"))
}

pub async fn clock_set_fixed_time(session: &Session, args: serde_json::Value) -> Result<ToolResult, BrokerError> {
    let args: ClockSetFixedTimeArgs = serde_json::from_value(args).map_err(|e| BrokerError::BadInput(e.to_string()))?;
    let idx = active_index(session).await?;
    let tabs = session.tabs().await;
    let tab = tabs.get(idx).ok_or(BrokerError::NoTab)?;
    tab.page.clock_set_fixed_time(args.epoch_millis).await.map_err(|e| BrokerError::Driver(e.to_string()))?;
    Ok(ToolResult::text(format!("clock fixed at {}", args.epoch_millis)))
}
