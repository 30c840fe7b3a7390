#![allow(dead_code)]

use async_trait::async_trait;
use devstack_bootstrap::core::{CommandOutput, CommandRunner, Invocation};
use devstack_bootstrap::utils::error::{ProvisionError, Result};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

type Reaction = Box<dyn Fn(&Invocation, &Tools) -> Result<CommandOutput> + Send + Sync>;

/// 可在測試中新增或移除的「已安裝工具」
#[derive(Clone, Default)]
pub struct Tools(Arc<Mutex<HashSet<String>>>);

impl Tools {
    pub fn install(&self, tool: &str) {
        self.0.lock().unwrap().insert(tool.to_string());
    }

    pub fn contains(&self, tool: &str) -> bool {
        self.0.lock().unwrap().contains(tool)
    }
}

struct Rule {
    command: Vec<String>,
    reaction: Reaction,
}

fn matches_prefix<S: AsRef<str>>(command: &[S], invocation: &Invocation) -> bool {
    let Some((program, args)) = command.split_first() else {
        return false;
    };
    program.as_ref() == invocation.program
        && args.len() <= invocation.args.len()
        && args.iter().zip(&invocation.args).all(|(a, b)| a.as_ref() == b)
}

/// 依「程式 + 參數前綴」回應的假 CommandRunner，並記錄所有呼叫
#[derive(Clone, Default)]
pub struct ScriptedRunner {
    tools: Tools,
    rules: Arc<Mutex<Vec<Rule>>>,
    calls: Arc<Mutex<Vec<Invocation>>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tools(self, tools: &[&str]) -> Self {
        for tool in tools {
            self.tools.install(tool);
        }
        self
    }

    /// 後加入的規則優先
    pub fn on(self, command: &[&str], output: CommandOutput) -> Self {
        self.on_with(command, move |_, _| Ok(output.clone()))
    }

    pub fn on_with<F>(self, command: &[&str], reaction: F) -> Self
    where
        F: Fn(&Invocation, &Tools) -> Result<CommandOutput> + Send + Sync + 'static,
    {
        self.rules.lock().unwrap().push(Rule {
            command: command.iter().map(|s| s.to_string()).collect(),
            reaction: Box::new(reaction),
        });
        self
    }

    /// 模擬無法啟動程式 (例如權限不足)
    pub fn spawn_error(self, command: &[&str]) -> Self {
        self.on_with(command, |invocation, _| {
            Err(ProvisionError::IoError(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                format!("cannot spawn {}", invocation.program),
            )))
        })
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn was_called(&self, command: &[&str]) -> bool {
        self.count(command) > 0
    }

    pub fn count(&self, command: &[&str]) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches_prefix(command, call))
            .count()
    }

    pub fn find(&self, command: &[&str]) -> Option<Invocation> {
        self.calls()
            .into_iter()
            .find(|call| matches_prefix(command, call))
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    fn resolve(&self, program: &str) -> Option<PathBuf> {
        self.tools
            .contains(program)
            .then(|| PathBuf::from("/usr/bin").join(program))
    }

    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(invocation.clone());

        let rules = self.rules.lock().unwrap();
        let rule = rules
            .iter()
            .rev()
            .find(|rule| matches_prefix(&rule.command, invocation));
        match rule {
            Some(rule) => (rule.reaction)(invocation, &self.tools),
            None => Ok(CommandOutput::success("")),
        }
    }
}

/// 模擬 git：init 建立 .git，commit 後 status 變乾淨，直到有新檔案
pub fn fake_git(runner: ScriptedRunner) -> ScriptedRunner {
    runner
        .on_with(&["git", "init"], |invocation, _| {
            let root = invocation.cwd.clone().expect("git runs in the project root");
            std::fs::create_dir_all(root.join(".git"))?;
            Ok(CommandOutput::success("Initialized empty Git repository"))
        })
        .on_with(&["git", "status", "--porcelain"], |invocation, _| {
            let root = invocation.cwd.clone().expect("git runs in the project root");
            if root.join(".git").join("COMMITTED").exists() {
                Ok(CommandOutput::success(""))
            } else {
                Ok(CommandOutput::success("A  .gitignore\n"))
            }
        })
        .on_with(&["git", "commit"], |invocation, _| {
            let root = invocation.cwd.clone().expect("git runs in the project root");
            std::fs::write(root.join(".git").join("COMMITTED"), "")?;
            Ok(CommandOutput::success("[main (root-commit)] Initial commit"))
        })
}
