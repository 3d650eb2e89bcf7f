use std::io::{self, Write};
use std::time::Duration;

use chrono::Local;
use evidence_core::{update, BatchState, Effect, Msg, Notification};
use evidence_engine::EngineHandle;
use evidence_logging::evidence_info;

use super::cli::Command;
use super::config::AppConfig;
use super::effects::EffectRunner;
use super::render;

const TICK: Duration = Duration::from_millis(100);

/// Loads the job list, dispatches the command and pumps engine events until
/// the controller is idle again.
pub fn run(command: &Command, config: &AppConfig) -> anyhow::Result<()> {
    evidence_info!(
        "Running {:?} for project {} against {}",
        command,
        config.project_id,
        config.backend_url
    );
    let runner = EffectRunner::new(EngineHandle::new(config.engine_config()));
    let mut app = App::new(runner, io::stdout().lock());

    app.run_effects(vec![Effect::RefreshJobs])?;
    app.pump_until(|app| app.runner.is_settled())?;
    if *command == Command::Status {
        return app.print_rows();
    }

    for msg in command.messages() {
        app.dispatch(msg)?;
    }
    app.pump_until(|app| app.state.is_idle() && app.runner.is_settled())?;
    app.print_rows()
}

struct App<W: Write> {
    state: BatchState,
    runner: EffectRunner,
    out: W,
    last_progress: Option<String>,
}

impl<W: Write> App<W> {
    fn new(runner: EffectRunner, out: W) -> Self {
        Self {
            state: BatchState::new(),
            runner,
            out,
            last_progress: None,
        }
    }

    fn pump_until(&mut self, mut done: impl FnMut(&Self) -> bool) -> anyhow::Result<()> {
        while !done(self) {
            let msg = match self.runner.recv_timeout(TICK) {
                Some(event) => self.runner.translate(event)?,
                None => Msg::Tick,
            };
            self.dispatch(msg)?;
        }
        Ok(())
    }

    fn dispatch(&mut self, msg: Msg) -> anyhow::Result<()> {
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;
        self.run_effects(effects)?;
        if self.state.consume_dirty() {
            self.print_progress()?;
        }
        Ok(())
    }

    fn run_effects(&mut self, effects: Vec<Effect>) -> anyhow::Result<()> {
        let notifications = self.runner.enqueue(effects);
        self.print_notifications(&notifications)
    }

    fn print_notifications(&mut self, notifications: &[Notification]) -> anyhow::Result<()> {
        for notification in notifications {
            writeln!(
                self.out,
                "{}",
                render::render_notification(notification, Local::now())
            )?;
        }
        Ok(())
    }

    fn print_progress(&mut self) -> anyhow::Result<()> {
        let line = render::render_progress(&self.state.view());
        if line.is_some() && line != self.last_progress {
            if let Some(text) = &line {
                writeln!(self.out, "{text}")?;
            }
            self.last_progress = line;
        }
        Ok(())
    }

    fn print_rows(&mut self) -> anyhow::Result<()> {
        for row in render::render_rows(&self.state.view()) {
            writeln!(self.out, "{row}")?;
        }
        self.out.flush()?;
        Ok(())
    }
}
