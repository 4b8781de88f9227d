//! Session runtime
//!
//! Wires the production collaborators (WebSocket transport, HTTP stream
//! output, HTTP control client, tokio timers) into a [`ListenerSession`] and
//! drives it from one loop until quit or a shutdown signal.

use crate::config::ListenerSettings;
use crate::connection::WsTransport;
use crate::console::{render_status, ChangePrinter, Command, HELP};
use crate::control::HttpControlClient;
use crate::error::Result;
use crate::playback::HttpStreamOutput;
use crate::scheduler::TokioScheduler;
use crate::session::{Input, ListenerSession, SessionParts};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("rk-listener/", env!("CARGO_PKG_VERSION"));

/// Run the listener until `quit`, end of input plus a signal, or Ctrl+C
pub async fn run(settings: ListenerSettings) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Input>();
    let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;

    let parts = SessionParts {
        transport: Box::new(WsTransport::new(tx.clone())),
        output: Box::new(HttpStreamOutput::new(
            client.clone(),
            tx.clone(),
            settings.autoplay,
        )),
        scheduler: Box::new(TokioScheduler::new(tx.clone())),
        dispatcher: Box::new(HttpControlClient::new(
            client,
            settings.api_base_url.clone(),
            tx.clone(),
        )),
        rng: Box::new(StdRng::from_entropy()),
    };
    let mut session = ListenerSession::new(&settings, parts);

    let mut printer = ChangePrinter::new();
    session.subscribe(Box::new(move |change, snapshot| {
        for line in printer.lines(change, snapshot) {
            println!("{}", line);
        }
    }));

    let mut lines = spawn_stdin_reader();
    let mut stdin_open = true;
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    session.start();
    println!("{}", HELP);

    loop {
        tokio::select! {
            Some(input) = rx.recv() => {
                let handled = session.handle(input);
                debug!("Handled: {:?}", handled);
            }
            line = lines.recv(), if stdin_open => match line {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => match line.parse::<Command>() {
                    Ok(Command::Action(action)) => {
                        session.handle(Input::User(action));
                    }
                    Ok(Command::Status) => println!("{}", render_status(&session)),
                    Ok(Command::Help) => println!("{}", HELP),
                    Ok(Command::Quit) => break,
                    Err(e) => println!("{}", e),
                },
                None => {
                    info!("Console input closed; running until interrupted");
                    stdin_open = false;
                }
            },
            _ = &mut shutdown => break,
        }
    }

    session.shutdown();
    info!("Listener stopped");
    Ok(())
}

/// Forward stdin lines into a channel
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut reader = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match reader.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to read console input: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
