//! Read-submit-print loop around a [`Session`].

use anyhow::Result;
use tracing::{debug, instrument};

use crate::io::console::Console;
use crate::io::model::ModelClient;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplOutcome {
    /// User turns completed before input ended.
    pub turns: u32,
}

/// Prompt for input until end of input or the first error.
///
/// Blank lines are skipped without calling the model.
#[instrument(skip_all)]
pub fn run_repl<M, C>(session: &mut Session, model: &M, console: &mut C) -> Result<ReplOutcome>
where
    M: ModelClient + ?Sized,
    C: Console + ?Sized,
{
    let mut turns = 0;
    while let Some(line) = console.read_line()? {
        if line.trim().is_empty() {
            continue;
        }
        let outcome = session.submit(&line, model, console)?;
        console.show_reply(&outcome.reply)?;
        turns += 1;
    }
    debug!(turns, "input closed");
    Ok(ReplOutcome { turns })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::model::ModelReply;
    use crate::session::SessionConfig;
    use crate::test_support::{ScriptedConsole, ScriptedModel, TestProject};

    #[test]
    fn each_line_gets_one_reply_until_input_ends() {
        let project = TestProject::new();
        let mut session = project.session(SessionConfig::default());
        let model = ScriptedModel::new([ModelReply::text("one"), ModelReply::text("two")]);
        let mut console = ScriptedConsole::with_input(["first", "second"]);

        let outcome = run_repl(&mut session, &model, &mut console).expect("repl");

        assert_eq!(outcome, ReplOutcome { turns: 2 });
        assert_eq!(console.replies(), vec!["one".to_string(), "two".to_string()]);
        model.assert_drained();
    }

    #[test]
    fn blank_lines_never_reach_the_model() {
        let project = TestProject::new();
        let mut session = project.session(SessionConfig::default());
        let model = ScriptedModel::new([ModelReply::text("ok")]);
        let mut console = ScriptedConsole::with_input(["", "   ", "real question", "\t"]);

        let outcome = run_repl(&mut session, &model, &mut console).expect("repl");

        assert_eq!(outcome.turns, 1);
        assert_eq!(model.calls(), 1);
    }

    #[test]
    fn empty_input_ends_cleanly() {
        let project = TestProject::new();
        let mut session = project.session(SessionConfig::default());
        let model = ScriptedModel::new(Vec::<ModelReply>::new());
        let mut console = ScriptedConsole::default();

        let outcome = run_repl(&mut session, &model, &mut console).expect("repl");

        assert_eq!(outcome.turns, 0);
        assert_eq!(session.history().len(), 1);
    }
}
