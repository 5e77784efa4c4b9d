use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use hookboard::client::TaskForm;
use hookboard::filter::StatusFilter;

#[derive(Parser, Debug)]
#[command(name = "hookboard")]
#[command(about = "Dashboard client for the webhook task scheduler", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to $HOOKBOARD_CONFIG or config/hookboard.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage scheduled tasks
    #[command(subcommand)]
    Tasks(TaskCommand),
    /// Show run history of a task
    Runs(RunsArgs),
    /// Show the dead-letter queue of a task
    Dlq(DlqArgs),
    /// Re-deliver one dead-letter entry
    Replay(ReplayArgs),
    /// Show global run totals
    Analytics,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// List tasks
    List(PageArgs),
    /// Show one task
    Show { id: i64 },
    /// Create a task
    Create(TaskFormArgs),
    /// Replace a task's definition
    Update {
        id: i64,
        #[command(flatten)]
        form: TaskFormArgs,
    },
    Enable { id: i64 },
    Disable { id: i64 },
    Delete { id: i64 },
}

#[derive(Args, Debug)]
pub struct PageArgs {
    /// Page size (defaults to the configured size for the view)
    #[arg(long)]
    pub limit: Option<usize>,
    #[arg(long, default_value_t = 0)]
    pub offset: usize,
}

#[derive(Args, Debug)]
pub struct TaskFormArgs {
    #[arg(long)]
    pub url: String,
    #[arg(long, default_value = "GET")]
    pub method: String,
    /// Headers as a JSON object, e.g. '{"X-Api-Key":"abc"}'
    #[arg(long)]
    pub headers: Option<String>,
    #[arg(long)]
    pub body: Option<String>,
    /// Cron expression; omit for a one-shot task
    #[arg(long)]
    pub cron: Option<String>,
    /// Store the task disabled
    #[arg(long)]
    pub disabled: bool,
}

impl TaskFormArgs {
    pub fn into_form(self) -> TaskForm {
        TaskForm {
            url: self.url,
            method: self.method,
            headers: self.headers,
            body: self.body,
            schedule_cron: self.cron,
            enabled: !self.disabled,
        }
    }
}

#[derive(Args, Debug)]
pub struct RunsArgs {
    pub task_id: i64,
    /// all, success or failure
    #[arg(long, default_value = "all")]
    pub status: StatusFilter,
    #[command(flatten)]
    pub page: PageArgs,
    /// Print the latency histogram instead of the rows
    #[arg(long)]
    pub histogram: bool,
}

#[derive(Args, Debug)]
pub struct DlqArgs {
    pub task_id: i64,
    /// all, success or failure
    #[arg(long, default_value = "all")]
    pub status: StatusFilter,
    #[command(flatten)]
    pub page: PageArgs,
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    pub task_id: i64,
    pub dlq_id: i64,
}
