//! CLI commands implementation.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::browser::{ChromiumSessionFactory, SessionFactory};
use crate::config::Config;
use crate::extract::StrategyRegistry;
use crate::models::{JobParameters, JobStatus};
use crate::queue::{JobProducer, JobQueue, MemoryJobQueue, QueuedJob};
use crate::server::{self, AppState};
use crate::store::{run_migrations, AsyncSqlitePool, ContentStore, DieselStore};
use crate::worker::WorkerPool;

#[derive(Parser)]
#[command(name = "gleaner")]
#[command(about = "Browser-driven content extraction and acquisition service")]
#[command(version)]
pub struct Cli {
    /// Data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and database
    Init,

    /// Run the HTTP API with the extraction worker pool
    Serve {
        /// Bind host (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Bind port (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Re-queue pending jobs from the database and run them to completion
    Work,

    /// Enqueue an extraction job and run it to completion
    Enqueue {
        /// Job type: quotes, discussion, or discovery
        job_type: String,
        /// Target URL (strategies have built-in defaults)
        #[arg(long)]
        url: Option<String>,
        /// Maximum items per page
        #[arg(long, default_value = "25")]
        max_items: usize,
        /// Maximum pages for paginated sources
        #[arg(long, default_value = "1")]
        max_pages: usize,
        /// Dequeue priority bias
        #[arg(long, default_value = "0")]
        priority: i32,
    },

    /// List jobs
    Jobs {
        /// Filter by status: pending, active, completed, failed
        #[arg(short, long)]
        status: Option<String>,
        /// Maximum rows
        #[arg(short, long, default_value = "25")]
        limit: i64,
    },

    /// Show aggregate job and record counts
    Stats,
}

/// Assembled process-lifetime dependencies. Constructed once per command;
/// handles are injected rather than held as ambient globals.
struct Runtime {
    store: Arc<dyn ContentStore>,
    queue: Arc<dyn JobQueue>,
    producer: Arc<JobProducer>,
    pool: Arc<WorkerPool>,
}

async fn build_runtime(config: &Config) -> anyhow::Result<Runtime> {
    config.ensure_dirs()?;
    run_migrations(&config.database_url()).await?;

    let store: Arc<dyn ContentStore> = Arc::new(DieselStore::new(AsyncSqlitePool::from_path(
        &config.database_path(),
    )));
    let queue: Arc<dyn JobQueue> = Arc::new(MemoryJobQueue::new());
    let registry = Arc::new(StrategyRegistry::with_defaults(config.extraction.clone()));
    let sessions: Arc<dyn SessionFactory> =
        Arc::new(ChromiumSessionFactory::new(config.browser.clone()));

    let producer = Arc::new(JobProducer::new(
        Arc::clone(&queue),
        Arc::clone(&store),
        Arc::clone(&registry),
    ));
    let pool = Arc::new(WorkerPool::new(
        Arc::clone(&queue),
        Arc::clone(&store),
        registry,
        sessions,
        Some(config.export_dir()),
        config.worker_count,
    ));

    Ok(Runtime {
        store,
        queue,
        producer,
        pool,
    })
}

/// Push jobs that never left `pending` back onto the queue. Covers rows
/// stranded by a previous process exit.
async fn requeue_pending(runtime: &Runtime) -> anyhow::Result<usize> {
    let pending = runtime
        .store
        .list_jobs(Some(JobStatus::Pending), i64::MAX)
        .await?;
    let count = pending.len();

    for job in pending {
        runtime
            .queue
            .push(QueuedJob {
                job_id: job.job_id,
                job_type: job.job_type,
                parameters: job.parameters,
            })
            .await?;
    }

    Ok(count)
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.data_dir.clone())?;

    match cli.command {
        Commands::Init => {
            config.ensure_dirs()?;
            run_migrations(&config.database_url()).await?;
            println!("Initialized data directory at {}", config.data_dir.display());
            Ok(())
        }

        Commands::Serve { host, port } => {
            let runtime = build_runtime(&config).await?;
            let requeued = requeue_pending(&runtime).await?;
            if requeued > 0 {
                println!("Re-queued {requeued} pending job(s)");
            }

            let pool_handle = tokio::spawn(Arc::clone(&runtime.pool).run());

            let state = AppState {
                producer: Arc::clone(&runtime.producer),
                store: Arc::clone(&runtime.store),
            };
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            server::serve(state, &host, port).await?;

            // Server shut down; drain the queue before exiting.
            runtime.queue.close().await;
            let _ = pool_handle.await;
            Ok(())
        }

        Commands::Work => {
            let runtime = build_runtime(&config).await?;
            let requeued = requeue_pending(&runtime).await?;
            if requeued == 0 {
                println!("No pending jobs");
                return Ok(());
            }
            println!("Running {requeued} pending job(s)");

            // Batch mode: close the queue so workers exit once drained.
            runtime.queue.close().await;
            Arc::clone(&runtime.pool).run().await;
            Ok(())
        }

        Commands::Enqueue {
            job_type,
            url,
            max_items,
            max_pages,
            priority,
        } => {
            let runtime = build_runtime(&config).await?;
            let job_id = runtime
                .producer
                .submit(
                    &job_type,
                    JobParameters {
                        url,
                        max_items,
                        max_pages,
                        priority,
                    },
                )
                .await?;
            println!("Enqueued job {job_id}");

            runtime.queue.close().await;
            Arc::clone(&runtime.pool).run().await;

            match runtime.store.get_job(&job_id).await? {
                Some(job) => {
                    println!("Status: {}", job.status.as_str());
                    if let Some(summary) = job.result_summary {
                        println!("Records: {}", summary.count);
                        for (sub_type, count) in &summary.by_type {
                            println!("  {sub_type}: {count}");
                        }
                        if let Some(top) = summary.top {
                            println!("Top: {top}");
                        }
                    }
                    if let Some(error) = job.error_message {
                        println!("Error: {error}");
                    }
                }
                None => println!("Job row missing after run"),
            }
            Ok(())
        }

        Commands::Jobs { status, limit } => {
            let status = match status.as_deref() {
                Some(raw) => Some(
                    JobStatus::from_str(raw)
                        .ok_or_else(|| anyhow::anyhow!("invalid status filter: {raw}"))?,
                ),
                None => None,
            };

            let runtime = build_runtime(&config).await?;
            let jobs = runtime.store.list_jobs(status, limit).await?;
            if jobs.is_empty() {
                println!("No jobs");
                return Ok(());
            }

            for job in jobs {
                let count = job
                    .result_summary
                    .as_ref()
                    .map(|s| s.count.to_string())
                    .unwrap_or_else(|| "-".into());
                println!(
                    "{}  {:<10} {:<9} started={} records={}",
                    job.job_id,
                    job.job_type.as_str(),
                    job.status.as_str(),
                    job.started_at.to_rfc3339(),
                    count
                );
            }
            Ok(())
        }

        Commands::Stats => {
            let runtime = build_runtime(&config).await?;
            let jobs = runtime.store.job_counts().await?;
            let records = runtime.store.record_counts().await?;

            println!("Jobs:");
            for (status, count) in &jobs {
                println!("  {status}: {count}");
            }
            println!("Records:");
            for (source, count) in &records {
                println!("  {source}: {count}");
            }
            Ok(())
        }
    }
}
