//! Demo, benchmark, and stress-test runners for the priority scheduler.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::error::SchedulerError;
use crate::log_dev;
use crate::scheduler::Scheduler;
use crate::shared::SharedScheduler;
use crate::types::{Priority, Task, TaskId};

// Demo sizing (small for quick CLI feedback).
const DEMO_WORKERS: usize = 3;
const DEMO_TASKS_PER_WORKER: usize = 4;
const DEMO_WORK_MS: u64 = 20;
// Full heap audits during validated benchmarks, once per this many updates.
const VALIDATE_EVERY: usize = 64;
// Priorities are scattered over [-PRIORITY_SPAN, PRIORITY_SPAN).
const PRIORITY_SPAN: i64 = 1_000;
// Cap on tasks queued by one benchmark run.
const MAX_TOTAL_TASKS: usize = 10_000_000;

const CSV_HEADER: &str = "workers,tasks_per_worker,reprioritize_pct,total_tasks,elapsed_ms,throughput_tasks_per_s,reprioritized,missed_updates,cpu_user_s,cpu_sys_s,duplicate_tasks,heap_violation";

/// Best-effort CPU user/system time snapshot (seconds) on Unix platforms.
#[cfg(unix)]
fn cpu_times_seconds() -> Option<(f64, f64)> {
    // SAFETY: rusage is plain old data; getrusage only writes into it.
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) };
    if rc != 0 {
        return None;
    }
    let user = usage.ru_utime.tv_sec as f64 + (usage.ru_utime.tv_usec as f64 / 1_000_000.0);
    let sys = usage.ru_stime.tv_sec as f64 + (usage.ru_stime.tv_usec as f64 / 1_000_000.0);
    Some((user, sys))
}

/// Stub on non-Unix platforms.
#[cfg(not(unix))]
fn cpu_times_seconds() -> Option<(f64, f64)> {
    None
}

/// Deterministic, well-spread priority for a task id (splitmix64 finalizer).
fn scatter_priority(id: TaskId, salt: u64) -> Priority {
    let mut z = id.wrapping_add(salt).wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^= z >> 31;
    (z % (2 * PRIORITY_SPAN as u64)) as i64 - PRIORITY_SPAN
}

/// Knobs for a single benchmark run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BenchConfig {
    pub workers: usize,
    pub tasks_per_worker: usize,
    /// Share of queued tasks that get reprioritized while workers drain.
    pub reprioritize_pct: u32,
    /// Simulated work per dispatched task.
    pub work_us: u64,
    /// Track duplicates and audit the heap during the run.
    pub validate: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            tasks_per_worker: 250,
            reprioritize_pct: 20,
            work_us: 0,
            validate: false,
        }
    }
}

impl BenchConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.total_tasks()?;
        self.update_count()?;
        Ok(())
    }

    /// Tasks queued by one run, bounded by `MAX_TOTAL_TASKS`.
    fn total_tasks(&self) -> Result<usize, String> {
        if self.workers == 0 {
            return Err("workers must be > 0".to_string());
        }
        if self.tasks_per_worker == 0 {
            return Err("tasks_per_worker must be > 0".to_string());
        }
        match self.workers.checked_mul(self.tasks_per_worker) {
            Some(total) if total <= MAX_TOTAL_TASKS => Ok(total),
            _ => Err(format!(
                "workers * tasks_per_worker too large (max {MAX_TOTAL_TASKS})"
            )),
        }
    }

    /// Priority changes issued while workers drain.
    fn update_count(&self) -> Result<usize, String> {
        if self.reprioritize_pct > 100 {
            return Err("reprioritize_pct must be <= 100".to_string());
        }
        self.total_tasks()?
            .checked_mul(self.reprioritize_pct as usize)
            .map(|scaled| scaled / 100)
            .ok_or_else(|| "reprioritize update count too large".to_string())
    }
}

/// Parameter sweep for the stress runner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StressConfig {
    pub worker_sets: Vec<usize>,
    pub task_sets: Vec<usize>,
    pub reprioritize_sets: Vec<u32>,
    pub work_us: u64,
    pub validate: bool,
}

impl StressConfig {
    /// Every combination in the sweep must be a valid benchmark.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_sets.is_empty()
            || self.task_sets.is_empty()
            || self.reprioritize_sets.is_empty()
        {
            return Err("sets must not be empty".to_string());
        }
        for bench in self.benches() {
            bench.validate()?;
        }
        Ok(())
    }

    fn benches(&self) -> impl Iterator<Item = BenchConfig> + '_ {
        self.worker_sets.iter().flat_map(move |&workers| {
            self.task_sets.iter().flat_map(move |&tasks_per_worker| {
                self.reprioritize_sets
                    .iter()
                    .map(move |&reprioritize_pct| BenchConfig {
                        workers,
                        tasks_per_worker,
                        reprioritize_pct,
                        work_us: self.work_us,
                        validate: self.validate,
                    })
            })
        })
    }
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            worker_sets: vec![1, 2, 4, 8],
            task_sets: vec![100, 1_000],
            reprioritize_sets: vec![0, 25, 50],
            work_us: 0,
            validate: false,
        }
    }
}

/// Aggregated metrics from a single benchmark run.
struct BenchResult {
    workers: usize,
    tasks_per_worker: usize,
    reprioritize_pct: u32,
    total_tasks: usize,
    elapsed_ms: f64,
    throughput: f64,
    reprioritized: usize,
    missed_updates: usize,
    cpu_user_s: Option<f64>,
    cpu_sys_s: Option<f64>,
    leftover: usize,
    duplicate_tasks: bool,
    heap_violation: bool,
}

impl BenchResult {
    fn csv_row(&self) -> String {
        let cpu_user = self
            .cpu_user_s
            .map(|v| format!("{v:.4}"))
            .unwrap_or_else(|| "NA".to_string());
        let cpu_sys = self
            .cpu_sys_s
            .map(|v| format!("{v:.4}"))
            .unwrap_or_else(|| "NA".to_string());
        format!(
            "{},{},{},{},{:.2},{:.2},{},{},{},{},{},{}",
            self.workers,
            self.tasks_per_worker,
            self.reprioritize_pct,
            self.total_tasks,
            self.elapsed_ms,
            self.throughput,
            self.reprioritized,
            self.missed_updates,
            cpu_user,
            cpu_sys,
            self.duplicate_tasks,
            self.heap_violation
        )
    }

    fn report_warnings(&self, validate: bool) {
        if self.leftover > 0 {
            eprintln!("# warning,leftover_tasks,{}", self.leftover);
        }
        if validate {
            if self.duplicate_tasks {
                eprintln!("# violation,duplicate_tasks");
            }
            if self.heap_violation {
                eprintln!("# violation,heap_invariant");
            }
        }
    }
}

fn benchmark_once(config: &BenchConfig) -> Result<BenchResult, String> {
    let total_tasks = config.total_tasks()?;
    let updates = config.update_count()?;
    let scheduler = Arc::new(SharedScheduler::new());
    for id in 0..total_tasks as TaskId {
        scheduler
            .push(Task::new(id, scatter_priority(id, 0)))
            .expect("fresh scheduler rejected a unique id");
    }
    // Nothing else is submitted; closing lets workers exit once drained.
    scheduler.close();

    let duplicate_tasks = Arc::new(AtomicBool::new(false));
    let heap_violation = Arc::new(AtomicBool::new(false));
    let seen_tasks = if config.validate {
        Some(Arc::new(Mutex::new(HashSet::new())))
    } else {
        None
    };

    let reprioritized = Arc::new(AtomicUsize::new(0));
    let missed_updates = Arc::new(AtomicUsize::new(0));

    let cpu_start = cpu_times_seconds();
    let start = Instant::now();

    let reprioritizer = {
        let scheduler = Arc::clone(&scheduler);
        let reprioritized = Arc::clone(&reprioritized);
        let missed_updates = Arc::clone(&missed_updates);
        let heap_violation = Arc::clone(&heap_violation);
        let validate = config.validate;
        thread::spawn(move || {
            for step in 0..updates {
                // Walk ids from the back so updates race with the drain.
                let id = (total_tasks - 1 - step) as TaskId;
                match scheduler.change_priority(id, scatter_priority(id, step as u64 + 1)) {
                    Ok(()) => {
                        reprioritized.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(SchedulerError::NotFound(_)) => {
                        missed_updates.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(err) => warn!(%err, id, "unexpected reprioritize failure"),
                }
                if validate && step % VALIDATE_EVERY == 0 {
                    if let Err(violation) = scheduler.validate() {
                        warn!(%violation, "heap audit failed");
                        heap_violation.store(true, Ordering::SeqCst);
                    }
                }
            }
        })
    };

    let mut handles = Vec::new();
    for worker_id in 0..config.workers {
        let scheduler = Arc::clone(&scheduler);
        let duplicate_tasks = Arc::clone(&duplicate_tasks);
        let seen_tasks = seen_tasks.as_ref().map(Arc::clone);
        let work_us = config.work_us;
        let handle = thread::Builder::new()
            .name(format!("worker-{worker_id}"))
            .spawn(move || {
                while let Some(task) = scheduler.pop_blocking_or_closed() {
                    if let Some(seen) = seen_tasks.as_ref() {
                        let mut guard = seen.lock().expect("seen mutex poisoned");
                        if !guard.insert(task.id) {
                            duplicate_tasks.store(true, Ordering::SeqCst);
                        }
                    }
                    if work_us > 0 {
                        thread::sleep(Duration::from_micros(work_us));
                    }
                }
            })
            .expect("failed to spawn worker thread");
        handles.push(handle);
    }

    for handle in handles {
        handle.join().expect("benchmark worker panicked");
    }
    reprioritizer.join().expect("reprioritizer thread panicked");

    if config.validate {
        if let Err(violation) = scheduler.validate() {
            warn!(%violation, "final heap audit failed");
            heap_violation.store(true, Ordering::SeqCst);
        }
    }

    // Drain any unexpected leftover tasks for validation reporting.
    let mut leftover = 0usize;
    while scheduler.try_pop().is_some() {
        leftover += 1;
    }

    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    let throughput = if elapsed_ms > 0.0 {
        (total_tasks as f64) / (elapsed_ms / 1000.0)
    } else {
        0.0
    };

    let (cpu_user_s, cpu_sys_s) = match (cpu_start, cpu_times_seconds()) {
        (Some((user_start, sys_start)), Some((user_end, sys_end))) => {
            (Some(user_end - user_start), Some(sys_end - sys_start))
        }
        _ => (None, None),
    };

    Ok(BenchResult {
        workers: config.workers,
        tasks_per_worker: config.tasks_per_worker,
        reprioritize_pct: config.reprioritize_pct,
        total_tasks,
        elapsed_ms,
        throughput,
        reprioritized: reprioritized.load(Ordering::SeqCst),
        missed_updates: missed_updates.load(Ordering::SeqCst),
        cpu_user_s,
        cpu_sys_s,
        leftover,
        duplicate_tasks: duplicate_tasks.load(Ordering::SeqCst),
        heap_violation: heap_violation.load(Ordering::SeqCst),
    })
}

/// Replay the reference scenario on a single-owner scheduler and return the
/// dispatched ids.
fn reference_scenario() -> Result<Vec<TaskId>, SchedulerError> {
    let mut scheduler = Scheduler::new();
    for id in 1..=5 {
        scheduler.add_task(Task::new(id, id as Priority * 10))?;
    }
    let mut order = Vec::new();
    order.push(scheduler.get_task()?.id);
    order.push(scheduler.get_task()?.id);
    scheduler.change_task_priority(1, 100)?;
    order.push(scheduler.get_task()?.id);
    order.push(scheduler.get_task()?.id);
    Ok(order)
}

/// Run the default demo: the reference scenario, then a small concurrent drain
/// with a mid-run priority boost.
pub fn run_demo() {
    log_dev!("[DEMO] start");

    let scenario = reference_scenario();
    let scenario_ok = matches!(scenario.as_deref(), Ok([5, 4, 1, 3]));
    let mut empty = Scheduler::new();
    let underflow_on_empty = empty.get_task() == Err(SchedulerError::Underflow);
    let not_found_on_absent =
        empty.change_task_priority(1, 1) == Err(SchedulerError::NotFound(1));

    let scheduler = Arc::new(SharedScheduler::new());
    let total_tasks = DEMO_WORKERS * DEMO_TASKS_PER_WORKER;
    for id in 0..total_tasks as TaskId {
        scheduler
            .push(Task::new(id, (id % 4) as Priority))
            .expect("fresh scheduler rejected a unique id");
    }
    // The lowest-priority, earliest task jumps the queue before workers start.
    let boosted: TaskId = 0;
    scheduler
        .change_priority(boosted, 100)
        .expect("boosted task missing");
    log_dev!("[DEMO] loaded tasks total={total_tasks}, boosted task {boosted}");
    scheduler.close();

    // Track per-worker completions and global dispatch order for the summary.
    let per_worker_tasks =
        Arc::new((0..DEMO_WORKERS).map(|_| AtomicUsize::new(0)).collect::<Vec<_>>());
    let dispatch_order = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    let start = Instant::now();
    for worker_id in 0..DEMO_WORKERS {
        let scheduler = Arc::clone(&scheduler);
        let per_worker_tasks = Arc::clone(&per_worker_tasks);
        let dispatch_order = Arc::clone(&dispatch_order);
        let name = format!("worker-{worker_id}");
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                while let Some(task) = scheduler.pop_blocking_or_closed() {
                    dispatch_order
                        .lock()
                        .expect("dispatch order mutex poisoned")
                        .push(task.id);
                    per_worker_tasks[worker_id].fetch_add(1, Ordering::SeqCst);
                    log_dev!(
                        "[WORK] {name} running task {} priority={}",
                        task.id,
                        task.priority
                    );
                    thread::sleep(Duration::from_millis(DEMO_WORK_MS));
                }
                log_dev!("[WORK] {name} done");
            })
            .expect("failed to spawn worker thread");
        handles.push(handle);
    }

    for handle in handles {
        handle.join().expect("worker thread panicked");
    }
    log_dev!("[DEMO] finished in {}ms", start.elapsed().as_millis());

    let tasks_done: Vec<usize> = per_worker_tasks
        .iter()
        .map(|count| count.load(Ordering::SeqCst))
        .collect();
    let dispatch_order = dispatch_order
        .lock()
        .expect("dispatch order mutex poisoned")
        .clone();
    let unique: HashSet<TaskId> = dispatch_order.iter().copied().collect();

    println!("DEMO SUMMARY");
    match &scenario {
        Ok(order) => println!("scenario_order={order:?}"),
        Err(err) => println!("scenario_error={err}"),
    }
    println!("scenario_ok={scenario_ok}");
    println!("underflow_on_empty={underflow_on_empty}");
    println!("not_found_on_absent={not_found_on_absent}");
    println!("workers={DEMO_WORKERS} tasks_total={total_tasks}");
    println!("tasks_per_worker_done={tasks_done:?}");
    println!("boosted_task={boosted}");
    println!("duplicate_tasks={}", unique.len() != dispatch_order.len());
    println!("leftover_tasks={}", scheduler.len());
}

/// Run a single benchmark and print one CSV row.
pub fn run_benchmark(config: BenchConfig) -> Result<(), String> {
    let result = benchmark_once(&config).map_err(|message| format!("bench: {message}"))?;
    println!("{CSV_HEADER}");
    println!("{}", result.csv_row());
    result.report_warnings(config.validate);
    Ok(())
}

/// Sweep multiple benchmark configurations and print CSV output. The whole
/// sweep is checked before the first run starts.
pub fn run_stress(config: StressConfig) -> Result<(), String> {
    config
        .validate()
        .map_err(|message| format!("stress: {message}"))?;
    println!("{CSV_HEADER}");
    for bench in config.benches() {
        let result = benchmark_once(&bench).map_err(|message| format!("stress: {message}"))?;
        println!("{}", result.csv_row());
        result.report_warnings(config.validate);
    }
    Ok(())
}
