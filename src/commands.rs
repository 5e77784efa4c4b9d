use hookboard::client::{DeadLetterEntry, Run, Task};
use hookboard::state::AppState;
use hookboard::views::RunHistoryView;

use crate::cli::{Commands, TaskCommand};

pub type CommandResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

pub async fn run(command: Commands, state: &AppState) -> CommandResult {
    match command {
        Commands::Tasks(command) => tasks(command, state).await,
        Commands::Runs(args) => {
            let mut view = state.run_history(args.task_id)?;
            if let Some(limit) = args.page.limit {
                view.set_limit(limit)?;
            }
            view.seek(args.page.offset);
            view.set_filter(args.status);
            let runs = view.load().await?;

            if args.histogram {
                print_histogram(&mut view);
            } else {
                println!("Runs for task #{} ({})", args.task_id, view.filter());
                runs.iter().for_each(print_run);
                print_more(view.read().has_next);
            }
            Ok(())
        }
        Commands::Dlq(args) => {
            let mut view = state.dead_letters(args.task_id)?;
            if let Some(limit) = args.page.limit {
                view.set_limit(limit)?;
            }
            view.seek(args.page.offset);
            view.set_filter(args.status);
            let entries = view.load().await?;

            println!("DLQ for task #{} ({})", args.task_id, view.filter());
            if entries.is_empty() {
                println!("  (empty)");
            }
            entries.iter().for_each(print_dead_letter);
            print_more(view.read().has_next);
            Ok(())
        }
        Commands::Replay(args) => {
            let view = state.dead_letters(args.task_id)?;
            let outcome = view.replay(args.dlq_id).await?;
            match (outcome.ok, outcome.response_code, outcome.error) {
                (true, code, _) => println!(
                    "Replayed dlq #{}: delivered{}",
                    args.dlq_id,
                    code.map(|code| format!(" (HTTP {})", code)).unwrap_or_default()
                ),
                (false, _, error) => println!(
                    "Replayed dlq #{}: failed again: {}",
                    args.dlq_id,
                    error.unwrap_or_else(|| "unknown error".to_string())
                ),
            }
            Ok(())
        }
        Commands::Analytics => {
            let summary = state.analytics().load().await?;
            println!("Tasks:         {}", summary.total_tasks);
            println!("Runs:          {}", summary.total_runs);
            println!("Successes:     {}", summary.successes);
            println!("Failures:      {}", summary.failures);
            println!("Success rate:  {:.2}%", summary.success_rate);
            println!("Avg latency:   {:.2}ms", summary.average_latency_ms);
            Ok(())
        }
    }
}

async fn tasks(command: TaskCommand, state: &AppState) -> CommandResult {
    let mut view = state.task_list()?;

    match command {
        TaskCommand::List(page) => {
            if let Some(limit) = page.limit {
                view.set_limit(limit)?;
            }
            view.seek(page.offset);
            let tasks = view.load().await?;
            if tasks.is_empty() {
                println!("No tasks yet.");
            }
            tasks.iter().for_each(print_task);
            print_more(view.read().has_next);
        }
        TaskCommand::Show { id } => print_task(&view.task(id).await?),
        TaskCommand::Create(form) => {
            let task = view.create(form.into_form()).await?;
            println!("Created task #{}", task.id);
            print_task(&task);
        }
        TaskCommand::Update { id, form } => {
            let task = view.update(id, form.into_form()).await?;
            println!("Updated task #{}", task.id);
            print_task(&task);
        }
        TaskCommand::Enable { id } => {
            let task = view.set_enabled(id, true).await?;
            println!("Task #{} enabled", task.id);
        }
        TaskCommand::Disable { id } => {
            let task = view.set_enabled(id, false).await?;
            println!("Task #{} disabled", task.id);
        }
        TaskCommand::Delete { id } => {
            view.delete(id).await?;
            println!("Task #{} deleted", id);
        }
    }

    Ok(())
}

fn print_more(has_next: bool) {
    if has_next {
        println!("(more rows available, use --offset)");
    }
}

fn print_task(task: &Task) {
    println!(
        "#{:<5} {:<6} {:<8} {:<16} {}",
        task.id,
        task.method,
        if task.enabled { "enabled" } else { "disabled" },
        task.schedule_cron.as_deref().unwrap_or("-"),
        task.url
    );
}

fn print_run(run: &Run) {
    println!(
        "#{:<6} {}  {:<7} {:>6}ms  {}{}",
        run.id,
        run.created_at.format("%Y-%m-%d %H:%M:%S"),
        run.status,
        run.latency(),
        run.response_code
            .map(|code| code.to_string())
            .unwrap_or_else(|| "-".to_string()),
        run.error
            .as_deref()
            .map(|error| format!("  {}", error))
            .unwrap_or_default()
    );
}

fn print_dead_letter(entry: &DeadLetterEntry) {
    println!(
        "#{:<6} {}  {}",
        entry.id,
        entry.created_at.format("%Y-%m-%d %H:%M:%S"),
        entry.error
    );
}

fn print_histogram(view: &mut RunHistoryView) {
    let buckets = view.histogram();
    if buckets.is_empty() {
        println!("No runs in this window.");
        return;
    }

    let widest = buckets.iter().map(|bucket| bucket.count).max().unwrap_or(1);
    for bucket in buckets {
        let bar = "#".repeat((bucket.count * 40).div_ceil(widest));
        println!("{:>14} {:>5} {}", bucket.label(), bucket.count, bar);
    }
}
