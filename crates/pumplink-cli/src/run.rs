//! `pumplink run`: one live session with an operator prompt on stdin.

use anyhow::{Context, Result};
use chrono::Local;
use pumplink_engine::{CommandError, Engine, EngineEvent, JsonFileCounterStore};
use pumplink_transport::{
    ConnectFuture, Connector, FrameWriter, SerialWriter, Session, SessionHandle, StreamWriter,
    TransportError, connect_stream, open_serial,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tracing::info;

use crate::cli::RunArgs;
use crate::config::AppConfig;
use crate::line::{HELP, LineCommand, LineError, parse_line};

pub async fn run(config: AppConfig, args: &RunArgs) -> Result<()> {
    let store = JsonFileCounterStore::new(&config.counters_path);
    let engine = Engine::new(&config.engine, store);

    match &args.tcp {
        Some(addr) => {
            let addr = addr.clone();
            let connector: Connector<StreamWriter<TcpStream>> =
                Box::new(move || -> ConnectFuture<StreamWriter<TcpStream>> {
                    let addr = addr.clone();
                    Box::pin(async move {
                        let stream = TcpStream::connect(&addr).await?;
                        info!(%addr, "connected to serial bridge");
                        Ok::<_, TransportError>(connect_stream(stream))
                    })
                });
            drive(engine, connector, args.trace).await
        }
        None => {
            if config.serial.port.is_empty() {
                anyhow::bail!("no serial port given (use --port or [serial] port in the config)");
            }
            let serial = config.serial.clone();
            let connector: Connector<SerialWriter> =
                Box::new(move || -> ConnectFuture<SerialWriter> {
                    let serial = serial.clone();
                    Box::pin(async move { open_serial(&serial) })
                });
            drive(engine, connector, args.trace).await
        }
    }
}

async fn drive<W>(
    engine: Engine<JsonFileCounterStore>,
    mut connector: Connector<W>,
    trace: bool,
) -> Result<()>
where
    W: FrameWriter + 'static,
{
    let link = connector().await.context("cannot open the line")?;
    let (session, handle, mut events) = Session::new(engine, link);
    let task = tokio::spawn(session.with_connector(connector).run());
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if trace || !matches!(event, EngineEvent::FrameTrace { .. }) {
                println!("{} {event}", Local::now().format("%H:%M:%S%.3f"));
            }
        }
    });

    println!("type `help` for commands");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("cannot read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        match parse_line(&line) {
            Ok(LineCommand::Quit) => break,
            Ok(LineCommand::Help) => println!("{HELP}"),
            Ok(LineCommand::Reopen) => reopen(&handle).await,
            Ok(LineCommand::Session(command)) => match handle.execute(command).await {
                Ok(()) => {}
                // refusals are printed from the event stream
                Err(TransportError::Command(CommandError::Refused(_))) => {}
                Err(TransportError::SessionClosed) => break,
                Err(err) => eprintln!("{err}"),
            },
            Err(LineError::Empty) => {}
            Err(err) => eprintln!("{err}"),
        }
    }

    handle.close().await;
    let engine = task.await.context("session task failed")?;
    let _ = printer.await;

    let counters = engine.counters();
    info!(
        state = %engine.state(),
        vehicles = counters.vehicle_count,
        total_liters = counters.total_liters,
        "session closed"
    );
    Ok(())
}

async fn reopen(handle: &SessionHandle) {
    match handle.reopen().await {
        Ok(()) => info!("line reopened, waiting for the pump"),
        // the failure is also reported as a transport fault event
        Err(err) => eprintln!("reopen failed: {err}"),
    }
}
