use crate::backup::command::{CommandOutput, CommandRunner};
use crate::backup::result_error::result::Result;
use std::cell::RefCell;
use std::collections::VecDeque;

/// Replays canned outputs in order and records every command line it was given.
///
/// Once the script is exhausted every further call exits 0 with no output.
#[derive(Default)]
pub(crate) struct ScriptedRunner {
    outputs: RefCell<VecDeque<CommandOutput>>,
    calls: RefCell<Vec<(String, Vec<(String, String)>)>>,
}

impl ScriptedRunner {
    pub(crate) fn new(outputs: Vec<CommandOutput>) -> Self {
        Self {
            outputs: RefCell::new(outputs.into()),
            calls: RefCell::default(),
        }
    }

    pub(crate) fn commands(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|(c, _)| c.clone()).collect()
    }

    pub(crate) fn envs(&self, call: usize) -> Vec<(String, String)> {
        self.calls.borrow()[call].1.clone()
    }
}

impl CommandRunner for ScriptedRunner {
    fn execute(&self, command_line: &str, envs: &[(&str, &str)]) -> Result<CommandOutput> {
        self.calls.borrow_mut().push((
            command_line.to_string(),
            envs.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ));
        Ok(self.outputs.borrow_mut().pop_front().unwrap_or_default())
    }
}
