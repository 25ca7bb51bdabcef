use logcat_stream::{LogService, ProcessFilter, ServiceConfig, SessionEvent};
use std::env;
use std::process;
use tokio_stream::StreamExt;
use tracing_subscriber::EnvFilter;

enum Action {
    Stream,
    Dump,
    Clear,
}

struct Args {
    action: Action,
    filter: Option<ProcessFilter>,
}

fn usage(program: &str) -> ! {
    eprintln!(
        "Usage: {} [--pid <pid> | --self] [--dump | --clear]",
        program
    );
    process::exit(1);
}

fn parse_args() -> Args {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("logcat-stream");

    let mut parsed = Args {
        action: Action::Stream,
        filter: None,
    };
    let mut rest = args.iter().skip(1);
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--dump" => parsed.action = Action::Dump,
            "--clear" => parsed.action = Action::Clear,
            "--self" => parsed.filter = Some(ProcessFilter::current()),
            "--pid" => match rest.next().and_then(|pid| pid.parse().ok()) {
                Some(pid) => parsed.filter = Some(ProcessFilter::Pid(pid)),
                None => usage(program),
            },
            _ => usage(program),
        }
    }
    parsed
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args();
    let service = LogService::install(ServiceConfig::default());

    match args.action {
        Action::Dump => match service.snapshot(args.filter).await {
            Ok(lines) => {
                for line in lines {
                    println!("{}", line);
                }
            }
            Err(e) => {
                eprintln!("Error reading log: {}", e);
                process::exit(1);
            }
        },
        Action::Clear => {
            if let Err(e) = service.clear().await {
                eprintln!("Error clearing log: {}", e);
                process::exit(1);
            }
        }
        Action::Stream => {
            let mut lines = service.subscribe();
            let mut events = service.events();
            if let Err(e) = service.start(args.filter).await {
                eprintln!("Error starting log stream: {}", e);
                process::exit(1);
            }

            let ctrl_c = tokio::signal::ctrl_c();
            tokio::pin!(ctrl_c);
            loop {
                tokio::select! {
                    biased;
                    line = lines.next() => match line {
                        Some(line) => println!("{}", line),
                        None => break,
                    },
                    event = events.recv() => {
                        if let Ok(SessionEvent::Ended(reason)) = event {
                            eprintln!("{}", reason);
                            break;
                        }
                    }
                    _ = &mut ctrl_c => break,
                }
            }

            if let Err(e) = service.stop().await {
                eprintln!("Error stopping log stream: {}", e);
                process::exit(1);
            }
        }
    }
}
