use std::time::Duration;

use tokio::time::sleep;
use tracing::info;

use backlot_core::{ParallelTask, Scheduler, SchedulerConfig, Task, TaskCategory, TaskError};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // (A) One scheduler for the whole process, passed to every submitter.
    let scheduler = Scheduler::new(SchedulerConfig::default());

    // (B) A structural library update: funnelled through the serial main
    // context so it can never interleave with another mutation.
    let update = Task::new("update library", TaskCategory::Main, 5, |ctx| async move {
        for step in 1..=5 {
            if ctx.is_cancelled() {
                return Err(TaskError::Cancelled);
            }
            sleep(Duration::from_millis(80)).await;
            ctx.publish_progress(step);
        }
        Ok(())
    });
    scheduler.add_main_task(update).await;

    // (C) Batch rename as a parallel fan-out: per-episode progress, keeps
    // going past per-item errors, cancellable between items.
    let episodes: Vec<String> = (1..=8).map(|n| format!("episode {n:02}")).collect();
    let rename = ParallelTask::new(
        "rename episodes",
        TaskCategory::Main,
        episodes,
        4,
        |episode: String, ctx| async move {
            if ctx.is_cancelled() {
                return Err(TaskError::Cancelled);
            }
            sleep(Duration::from_millis(60)).await;
            info!(%episode, "renamed");
            Ok(())
        },
    )
    .into_task();
    scheduler.add_main_task(rename).await;

    // (D) Metadata work in the background pool, artwork in the download
    // pool; the two never compete for worker slots.
    for movie in ["Heat", "Alien", "Ran"] {
        let refresh = Task::new(
            format!("refresh rating: {movie}"),
            TaskCategory::Background,
            0,
            |_ctx| async {
                sleep(Duration::from_millis(120)).await;
                Ok(())
            },
        );
        scheduler.add_unnamed_task(refresh).await;

        let fetch = Task::new(
            format!("fetch artwork: {movie}"),
            TaskCategory::Download,
            3,
            |ctx| async move {
                for step in 1..=3 {
                    sleep(Duration::from_millis(40)).await;
                    ctx.publish_progress(step);
                }
                Ok(())
            },
        );
        scheduler.add_download_task(fetch).await;
    }

    // One deliberate failure to show the notification path; it does not
    // disturb anything else.
    let doomed = Task::new(
        "scrape: Unknown Movie (1899)",
        TaskCategory::Background,
        0,
        |_ctx| async { Err(TaskError::failed("no search results")) },
    );
    scheduler.add_unnamed_task(doomed).await;

    // (E) Poll the registry the way the active-tasks panel would, until
    // every task has settled and been observed once.
    loop {
        let tasks = scheduler.list_tasks();
        if tasks.is_empty() {
            break;
        }
        println!("active tasks:");
        for task in &tasks {
            let (completed, total) = task.progress();
            println!(
                "  [{:<10}] {:<28} {:<9} {}/{}",
                task.category().as_str(),
                task.name(),
                format!("{:?}", task.state()),
                completed,
                total,
            );
        }
        println!("  counts: {:?}", scheduler.counts());
        sleep(Duration::from_millis(150)).await;
    }

    // (F) Drain and exit.
    scheduler.shutdown(Duration::from_secs(2)).await;
    println!("all tasks settled");
}
