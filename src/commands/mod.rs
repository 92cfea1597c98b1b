//! Console front-end.
//!
//! Staff type commands on stdin; the dashboard is redrawn whenever the
//! snapshot or the selected tab changes. Command names mirror the buttons of
//! the dashboard: tabs, "New Order" and "Done".

pub mod orders;

use std::future::Future;
use std::io::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::api::OrderService;
use crate::filter::Tab;
use crate::lifecycle::OrderController;
use crate::orders::OrderId;
use crate::render;

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";
const ACKNOWLEDGE_PROMPT: &str = "Press enter to continue ";

pub const HELP: &str = "\
Commands:
  tab all|member|non-member   switch the order list tab
  new                         place a new order
  done <id>                   mark an order completed
  refresh                     fetch orders now
  members                     list members and coin balances
  help                        show this help
  quit                        exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Tab(Tab),
    New,
    Done(OrderId),
    Refresh,
    Members,
    Help,
    Quit,
}

/// Parse one input line. Blank lines are `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let mut parts = line.split_whitespace();
    let Some(head) = parts.next() else {
        return Ok(None);
    };
    let arg = parts.next();

    let command = match head.to_ascii_lowercase().as_str() {
        "tab" => {
            let tab = arg.ok_or("Usage: tab all|member|non-member")?;
            ConsoleCommand::Tab(tab.parse()?)
        }
        "new" => ConsoleCommand::New,
        "done" => {
            let id = arg.ok_or("Usage: done <order id>")?;
            ConsoleCommand::Done(OrderId::new(id))
        }
        "refresh" => ConsoleCommand::Refresh,
        "members" => ConsoleCommand::Members,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" | "q" => ConsoleCommand::Quit,
        other => return Err(format!("Unknown command: {other}. Type 'help' for commands.")),
    };
    Ok(Some(command))
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Line-oriented staff input.
pub trait Prompter {
    /// Show `prompt` and wait for one line. `None` once input is closed.
    fn ask(&mut self, prompt: &str) -> impl Future<Output = Option<String>>;

    /// Show a message.
    fn say(&mut self, message: &str);
}

pub struct StdinPrompter {
    lines: Lines<BufReader<Stdin>>,
}

impl StdinPrompter {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for StdinPrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompter for StdinPrompter {
    async fn ask(&mut self, prompt: &str) -> Option<String> {
        print!("{prompt}");
        let _ = std::io::stdout().flush();
        match self.lines.next_line().await {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to read stdin: {e}");
                None
            }
        }
    }

    fn say(&mut self, message: &str) {
        println!("{message}");
    }
}

// ---------------------------------------------------------------------------
// View state and renderer
// ---------------------------------------------------------------------------

/// Selected tab plus redraw control shared with the renderer task.
#[derive(Clone)]
pub struct ViewState {
    tab: Arc<watch::Sender<Tab>>,
    paused: Arc<AtomicBool>,
    redraw: Arc<Notify>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewState {
    pub fn new() -> Self {
        let (tab, _) = watch::channel(Tab::default());
        Self {
            tab: Arc::new(tab),
            paused: Arc::new(AtomicBool::new(false)),
            redraw: Arc::new(Notify::new()),
        }
    }

    pub fn tab(&self) -> Tab {
        *self.tab.borrow()
    }

    pub fn set_tab(&self, tab: Tab) {
        self.tab.send_replace(tab);
    }

    /// Hold redraws while a form owns the terminal.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.request_redraw();
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn request_redraw(&self) {
        self.redraw.notify_one();
    }
}

/// Redraw the dashboard on stdout on every snapshot replacement, tab switch
/// or explicit request.
pub fn spawn_renderer<S: OrderService>(
    controller: Arc<OrderController<S>>,
    view: ViewState,
) -> JoinHandle<()> {
    spawn_renderer_with(controller, view, |screen| {
        print!("{CLEAR_SCREEN}{screen}\n> ");
        let _ = std::io::stdout().flush();
    })
}

/// Like [`spawn_renderer`], handing each rendered screen to `draw`.
pub fn spawn_renderer_with<S, F>(
    controller: Arc<OrderController<S>>,
    view: ViewState,
    mut draw: F,
) -> JoinHandle<()>
where
    S: OrderService,
    F: FnMut(String) + Send + 'static,
{
    let mut snapshots = controller.synchronizer().store().subscribe();
    let mut tabs = view.tab.subscribe();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                changed = tabs.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = view.redraw.notified() => {}
            }
            if view.is_paused() {
                continue;
            }
            let snapshot = snapshots.borrow_and_update().clone();
            let tab = *tabs.borrow_and_update();
            draw(render::render_dashboard(&snapshot, tab, |id| {
                controller.is_completing(id)
            }));
        }
        debug!("Renderer stopped");
    })
}

// ---------------------------------------------------------------------------
// Main loop
// ---------------------------------------------------------------------------

/// Read and dispatch commands until `quit` or end of input.
pub async fn run_console<S: OrderService, P: Prompter>(
    controller: Arc<OrderController<S>>,
    view: ViewState,
    prompter: &mut P,
) {
    prompter.say(HELP);
    view.request_redraw();

    while let Some(line) = prompter.ask("> ").await {
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                prompter.say(&e);
                continue;
            }
        };

        match command {
            ConsoleCommand::Tab(tab) => view.set_tab(tab),
            ConsoleCommand::New => {
                view.pause();
                orders::place_order_flow(&controller, prompter).await;
                view.resume();
            }
            ConsoleCommand::Done(id) => {
                match orders::complete_order(&controller, &id).await {
                    Ok(()) => view.request_redraw(),
                    Err(notice) => {
                        // Keep the notice on screen until staff acknowledge it.
                        view.pause();
                        prompter.say(&notice);
                        let _ = prompter.ask(ACKNOWLEDGE_PROMPT).await;
                        view.resume();
                    }
                }
            }
            ConsoleCommand::Refresh => {
                if let Err(e) = controller.synchronizer().sync_once().await {
                    prompter.say(&e.to_string());
                }
                view.request_redraw();
            }
            ConsoleCommand::Members => {
                view.pause();
                match controller.synchronizer().service().list_members().await {
                    Ok(members) => prompter.say(&render::render_members(&members)),
                    Err(e) => prompter.say(&format!("Failed to load members: {e}")),
                }
                let _ = prompter.ask("Press enter to return to the dashboard ").await;
                view.resume();
            }
            ConsoleCommand::Help => prompter.say(HELP),
            ConsoleCommand::Quit => break,
        }
    }
}
