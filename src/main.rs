use std::str::FromStr;

use priority_scheduler::logging;
use priority_scheduler::sim::{self, BenchConfig, StressConfig};

fn parse_list<T: FromStr>(arg: &str) -> Option<Vec<T>> {
    if arg == "-" {
        return None;
    }
    let mut values = Vec::new();
    for part in arg.split(',') {
        if part.trim().is_empty() {
            return None;
        }
        let value = part.trim().parse::<T>().ok()?;
        values.push(value);
    }
    Some(values)
}

fn print_usage(program: &str) {
    println!("Priority Scheduler CLI");
    println!("Usage:");
    println!("  {program} (run demo)");
    println!("  {program} bench [workers] [tasks_per_worker] [reprioritize_pct] [work_us] [validate]");
    println!("  {program} stress [worker_sets] [task_sets] [reprioritize_sets] [work_us] [validate]");
    println!("  {program} --help");
    println!();
    println!("Sets are comma-separated lists (e.g., 1,2,4). Use \"-\" to keep defaults for a set.");
    println!("Omit trailing values to keep their defaults.");
    println!("Defaults:");
    println!("  bench  workers=4 tasks_per_worker=250 reprioritize_pct=20 work_us=0");
    println!("  stress workers=1,2,4,8 tasks_per_worker=100,1000 reprioritize_pct=0,25,50 work_us=0");
    println!("Flags:");
    println!("  validate  track duplicate dispatches and audit the heap during the run");
    println!("Logging:");
    println!("  RUST_LOG overrides the log filter (logs go to stderr)");
}

fn exit_with_usage(program: &str, message: &str) -> ! {
    eprintln!("{message}");
    print_usage(program);
    std::process::exit(2);
}

fn parse_bench(program: &str, args: impl Iterator<Item = String>) -> BenchConfig {
    let mut config = BenchConfig::default();
    let mut position = 0usize;
    for arg in args {
        if arg == "validate" {
            config.validate = true;
            continue;
        }
        let parsed = match position {
            0 => arg.parse::<usize>().map(|v| config.workers = v).is_ok(),
            1 => arg.parse::<usize>().map(|v| config.tasks_per_worker = v).is_ok(),
            2 => arg.parse::<u32>().map(|v| config.reprioritize_pct = v).is_ok(),
            3 => arg.parse::<u64>().map(|v| config.work_us = v).is_ok(),
            _ => exit_with_usage(program, &format!("bench: unexpected argument: {arg}")),
        };
        if !parsed {
            exit_with_usage(program, &format!("bench: invalid value: {arg}"));
        }
        position += 1;
    }
    config
}

fn parse_stress(program: &str, args: impl Iterator<Item = String>) -> StressConfig {
    let mut config = StressConfig::default();
    let mut position = 0usize;
    for arg in args {
        if arg == "validate" {
            config.validate = true;
            continue;
        }
        let skipped = arg == "-";
        match position {
            0 if skipped => {}
            0 => match parse_list(&arg) {
                Some(values) => config.worker_sets = values,
                None => exit_with_usage(program, &format!("stress: invalid worker_sets value: {arg}")),
            },
            1 if skipped => {}
            1 => match parse_list(&arg) {
                Some(values) => config.task_sets = values,
                None => exit_with_usage(program, &format!("stress: invalid task_sets value: {arg}")),
            },
            2 if skipped => {}
            2 => match parse_list(&arg) {
                Some(values) => config.reprioritize_sets = values,
                None => exit_with_usage(
                    program,
                    &format!("stress: invalid reprioritize_sets value: {arg}"),
                ),
            },
            3 => match arg.parse::<u64>() {
                Ok(value) => config.work_us = value,
                Err(_) => exit_with_usage(program, &format!("stress: invalid work_us value: {arg}")),
            },
            _ => exit_with_usage(program, &format!("stress: unexpected argument: {arg}")),
        }
        position += 1;
    }
    config
}

fn main() {
    logging::init();
    let program = std::env::args()
        .next()
        .unwrap_or_else(|| "priority_scheduler".to_string());
    let mut args = std::env::args().skip(1);
    let outcome = match args.next().as_deref() {
        Some("bench") => sim::run_benchmark(parse_bench(&program, args)),
        Some("stress") => sim::run_stress(parse_stress(&program, args)),
        Some("--help") | Some("-h") | Some("help") => {
            print_usage(&program);
            Ok(())
        }
        Some(other) => exit_with_usage(&program, &format!("unknown command: {other}")),
        None => {
            sim::run_demo();
            Ok(())
        }
    };
    if let Err(message) = outcome {
        exit_with_usage(&program, &message);
    }
}
