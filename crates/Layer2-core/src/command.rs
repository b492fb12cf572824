//! Commands - 호스트 명령 팔레트 어댑터
//!
//! `bdsettings`: 설정 패널이 있는 플러그인의 설정 열기
//! `bdtoggle`: 플러그인 켜기/끄기
//!
//! 선택지는 실행할 때마다 매니저에서 다시 계산합니다.

use bridge_foundation::{Error, Result};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::host::HostValue;
use crate::plugin::{PluginManager, SharedManager};

/// 플러그인 명령이 등록되는 섹션
pub const COMMAND_SECTION: &str = "BD";

// ============================================================================
// Command 정의
// ============================================================================

/// 옵션 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    String,
    Integer,
    Boolean,
}

/// 옵션 선택지
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandChoice {
    pub label: String,
    pub value: String,
}

pub type ChoicesFn = dyn Fn() -> Vec<CommandChoice> + Send + Sync;
pub type PredicateFn = dyn Fn() -> bool + Send + Sync;
pub type ExecuteFn = dyn Fn(&[CommandArg]) -> Result<CommandOutcome> + Send + Sync;

/// 명령 옵션
#[derive(Clone)]
pub struct CommandOption {
    pub name: String,
    pub description: String,
    pub kind: OptionType,
    pub required: bool,
    /// 동적 선택지 (없으면 자유 입력)
    choices: Option<Arc<ChoicesFn>>,
}

impl CommandOption {
    pub fn new(name: impl Into<String>, description: impl Into<String>, kind: OptionType) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind,
            required: false,
            choices: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_choices(mut self, choices: impl Fn() -> Vec<CommandChoice> + Send + Sync + 'static) -> Self {
        self.choices = Some(Arc::new(choices));
        self
    }

    /// 현재 선택지
    pub fn choices(&self) -> Vec<CommandChoice> {
        self.choices.as_ref().map(|f| f()).unwrap_or_default()
    }

    pub fn has_choices(&self) -> bool {
        self.choices.is_some()
    }
}

/// 실행 인자
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandArg {
    pub name: String,
    pub value: String,
}

impl CommandArg {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// 실행 결과 (호스트가 화면에 반영)
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// 할 일 없음
    Nothing,
    /// 설정 모달 열기
    OpenSettings { title: String, panel: HostValue },
    /// 토글 결과
    Toggled { id: String, enabled: bool },
}

/// 명령
#[derive(Clone)]
pub struct Command {
    pub id: String,
    pub name: String,
    pub description: String,
    pub options: Vec<CommandOption>,
    predicate: Option<Arc<PredicateFn>>,
    execute: Arc<ExecuteFn>,
}

impl Command {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        execute: impl Fn(&[CommandArg]) -> Result<CommandOutcome> + Send + Sync + 'static,
    ) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            description: description.into(),
            options: Vec::new(),
            predicate: None,
            execute: Arc::new(execute),
        }
    }

    pub fn with_option(mut self, option: CommandOption) -> Self {
        self.options.push(option);
        self
    }

    /// 명령을 보여줄 조건
    pub fn with_predicate(mut self, predicate: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn is_available(&self) -> bool {
        self.predicate.as_ref().map_or(true, |p| p())
    }

    /// 필수 옵션 확인 후 실행
    pub fn execute(&self, args: &[CommandArg]) -> Result<CommandOutcome> {
        for option in self.options.iter().filter(|o| o.required) {
            if !args.iter().any(|a| a.name == option.name) {
                return Err(Error::InvalidInput(format!(
                    "Missing required option '{}' for /{}",
                    option.name, self.name
                )));
            }
        }
        (self.execute)(args)
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("options", &self.options.iter().map(|o| &o.name).collect::<Vec<_>>())
            .finish()
    }
}

fn arg<'a>(args: &'a [CommandArg], name: &str) -> Option<&'a str> {
    args.iter()
        .find(|a| a.name == name)
        .map(|a| a.value.as_str())
        .filter(|v| !v.is_empty())
}

// ============================================================================
// CommandRegistry
// ============================================================================

/// 호스트의 명령 등록 창구
pub trait CommandRegistry: Send + Sync {
    fn register(&self, section: &str, command: Command) -> Result<()>;

    fn unregister(&self, section: &str, id: &str);
}

/// 메모리 명령 목록
#[derive(Default)]
pub struct CommandSet {
    /// (섹션, id) → 명령
    commands: RwLock<BTreeMap<(String, String), Command>>,
}

impl CommandSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 이름으로 찾기
    pub fn get(&self, name: &str) -> Option<Command> {
        self.commands
            .read()
            .values()
            .find(|c| c.name == name)
            .cloned()
    }

    /// 지금 보여줄 수 있는 명령
    pub fn available(&self) -> Vec<Command> {
        self.commands
            .read()
            .values()
            .filter(|c| c.is_available())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.commands.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.read().is_empty()
    }

    /// 이름으로 실행
    pub fn run(&self, name: &str, args: &[CommandArg]) -> Result<CommandOutcome> {
        let command = self
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("Command /{} not found", name)))?;
        debug!("Running /{}", name);
        command.execute(args)
    }
}

impl CommandRegistry for CommandSet {
    fn register(&self, section: &str, command: Command) -> Result<()> {
        let key = (section.to_string(), command.id.clone());
        let mut commands = self.commands.write();
        if commands.contains_key(&key) {
            return Err(Error::InvalidInput(format!(
                "Command {} is already registered in {}",
                command.id, section
            )));
        }
        commands.insert(key, command);
        Ok(())
    }

    fn unregister(&self, section: &str, id: &str) {
        self.commands
            .write()
            .remove(&(section.to_string(), id.to_string()));
    }
}

// ============================================================================
// 플러그인 명령
// ============================================================================

fn settings_choices(manager: &PluginManager) -> Vec<CommandChoice> {
    manager
        .plugins()
        .iter()
        .filter(|p| manager.has_settings_panel(p.id()))
        .map(|p| CommandChoice {
            label: p.name().to_string(),
            value: p.id().to_string(),
        })
        .collect()
}

/// `bdsettings`
pub fn settings_command(shared: SharedManager) -> Command {
    let for_predicate = Arc::clone(&shared);
    let for_choices = Arc::clone(&shared);

    Command::new("bdsettings", "Open the settings of a BetterDiscord plugin", move |args| {
        let Some(id) = arg(args, "plugin") else {
            return Ok(CommandOutcome::Nothing);
        };

        let mut manager = shared.lock();
        let Some(title) = manager.get(id).map(|p| p.name().to_string()) else {
            return Ok(CommandOutcome::Nothing);
        };
        if !manager.has_settings_panel(id) {
            return Ok(CommandOutcome::Nothing);
        }

        let panel = manager.settings_panel(id)?;
        Ok(CommandOutcome::OpenSettings { title, panel })
    })
    .with_predicate(move || {
        let manager = for_predicate.lock();
        manager.plugins().iter().any(|p| manager.has_settings_panel(p.id()))
    })
    .with_option(
        CommandOption::new("plugin", "The plugin to open the settings for", OptionType::String)
            .required()
            .with_choices(move || settings_choices(&for_choices.lock())),
    )
}

/// `bdtoggle`
pub fn toggle_command(shared: SharedManager) -> Command {
    let for_choices = Arc::clone(&shared);

    Command::new("bdtoggle", "Enable or disable a BetterDiscord plugin", move |args| {
        let Some(id) = arg(args, "plugin") else {
            return Ok(CommandOutcome::Nothing);
        };

        let mut manager = shared.lock();
        let id = manager
            .get(id)
            .map(|p| p.id().to_string())
            .ok_or_else(|| Error::NotFound(format!("Plugin {} not found", id)))?;
        manager.toggle(&id)?;
        let enabled = manager.is_enabled(&id);
        info!("Toggled {} ({})", id, if enabled { "enabled" } else { "disabled" });
        Ok(CommandOutcome::Toggled { id, enabled })
    })
    .with_option(
        CommandOption::new("plugin", "The plugin to toggle", OptionType::String)
            .required()
            .with_choices(move || {
                for_choices
                    .lock()
                    .plugins()
                    .iter()
                    .map(|p| CommandChoice {
                        label: p.name().to_string(),
                        value: p.id().to_string(),
                    })
                    .collect()
            }),
    )
}

/// 플러그인 명령 등록
pub fn register_plugin_commands(registry: &dyn CommandRegistry, shared: &SharedManager) -> Result<()> {
    registry.register(COMMAND_SECTION, settings_command(Arc::clone(shared)))?;
    registry.register(COMMAND_SECTION, toggle_command(Arc::clone(shared)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::files::{MemoryAddonFiles, PluginFile};
    use crate::testing::{plugin_source, RecordingNotifier, ScriptedEngine};
    use bridge_foundation::MemoryEnabledStore;

    fn setup(enabled: &[&str]) -> (CommandSet, SharedManager) {
        let mut manager = PluginManager::new(
            Arc::new(ScriptedEngine::default()),
            Arc::new(MemoryAddonFiles::new()),
            Arc::new(MemoryEnabledStore::with_enabled(enabled.iter().copied())),
            Arc::new(RecordingNotifier::default()),
        );
        manager.load_all(vec![
            PluginFile::new("Alpha.plugin.js", plugin_source("Alpha", "1.0.0", "start(){} stop(){}")),
            PluginFile::new(
                "Panel.plugin.js",
                plugin_source("Panel", "1.0.0", "start(){} stop(){} getSettingsPanel(){}"),
            ),
        ]);
        let shared = manager.into_shared();
        let commands = CommandSet::new();
        register_plugin_commands(&commands, &shared).unwrap();
        (commands, shared)
    }

    #[test]
    fn test_settings_command_hidden_without_panels() {
        let (commands, _) = setup(&[]);
        assert_eq!(commands.len(), 2);

        let settings = commands.get("bdsettings").unwrap();
        assert!(!settings.is_available());
        assert!(settings.options[0].choices().is_empty());
        assert_eq!(commands.available().len(), 1);
    }

    #[test]
    fn test_settings_command_opens_panel() {
        let (commands, _) = setup(&["Panel", "Alpha"]);

        let settings = commands.get("bdsettings").unwrap();
        assert!(settings.is_available());
        assert_eq!(
            settings.options[0].choices(),
            vec![CommandChoice {
                label: "Panel".into(),
                value: "Panel".into()
            }]
        );

        let outcome = commands
            .run("bdsettings", &[CommandArg::new("plugin", "Panel")])
            .unwrap();
        assert_eq!(
            outcome,
            CommandOutcome::OpenSettings {
                title: "Panel".into(),
                panel: HostValue::string("Panel:getSettingsPanel"),
            }
        );

        let outcome = commands
            .run("bdsettings", &[CommandArg::new("plugin", "Alpha")])
            .unwrap();
        assert_eq!(outcome, CommandOutcome::Nothing);
        assert!(matches!(commands.run("bdsettings", &[]), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_toggle_command() {
        let (commands, shared) = setup(&[]);

        let outcome = commands
            .run("bdtoggle", &[CommandArg::new("plugin", "Alpha.plugin.js")])
            .unwrap();
        assert_eq!(
            outcome,
            CommandOutcome::Toggled {
                id: "Alpha".into(),
                enabled: true
            }
        );
        assert!(shared.lock().get("Alpha").unwrap().is_running());
        assert_eq!(commands.get("bdtoggle").unwrap().options[0].choices().len(), 2);
    }

    #[test]
    fn test_duplicate_registration() {
        let (commands, shared) = setup(&[]);
        assert!(register_plugin_commands(&commands, &shared).is_err());
        commands.unregister(COMMAND_SECTION, "bdtoggle");
        assert!(commands.get("bdtoggle").is_none());
    }
}
