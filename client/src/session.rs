//! Interactive viewer session: dials the server and drives it from stdin.

use std::io::Write;

use anyhow::Context;
use log::info;
use rlink::app::{self, Message, Opcode};
use rlink::{Endpoint, Impairment, LossySink, Role, stats};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;

use crate::{Args, link_config};

/// Runs one viewer session, then records its statistics line.
pub async fn run(args: &Args) -> anyhow::Result<()> {
    let stream = TcpStream::connect(args.connect)
        .await
        .with_context(|| format!("connecting to {}", args.connect))?;
    info!("connected to {} in {} mode", args.connect, args.mode);

    let (reader, writer) = stream.into_split();
    let impairment = Impairment::new(args.drop, args.corrupt);
    let mut endpoint = Endpoint::new(reader, LossySink::new(writer, impairment), link_config(args));

    let result = command_loop(&endpoint).await;

    let line = endpoint
        .stats()
        .log_line(args.mode, args.drop, args.corrupt, Role::Client);
    stats::append_log(&args.log, &line).context("appending statistics log")?;
    endpoint.shutdown().await;
    result
}

async fn command_loop(endpoint: &Endpoint) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("commands: list | play <name> | quit");

    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            return Ok(());
        };
        let line = line.trim();
        match line {
            "" => continue,
            "quit" => return Ok(()),
            "list" => {
                app::send_message(endpoint, &Message::empty(Opcode::List)).await?;
                show_response(endpoint).await?;
            }
            _ => {
                if let Some(name) = line.strip_prefix("play ") {
                    let request = Message::new(Opcode::Play, name.trim().as_bytes().to_vec())?;
                    app::send_message(endpoint, &request).await?;
                    show_response(endpoint).await?;
                } else {
                    println!("unknown command: {line}");
                }
            }
        }
    }
}

/// Prints server responses until the terminating `End` message.
async fn show_response(endpoint: &Endpoint) -> anyhow::Result<()> {
    loop {
        let message = app::read_message(endpoint).await?;
        match message.opcode {
            Opcode::Catalog => println!("  {}", String::from_utf8_lossy(&message.body)),
            Opcode::Chunk => {
                // First slice of video on screen: the stream is live.
                endpoint.mark_recognized();
                let mut stdout = std::io::stdout();
                stdout.write_all(&message.body)?;
                stdout.flush()?;
            }
            Opcode::End => return Ok(()),
            Opcode::Error => {
                eprintln!("server: {}", String::from_utf8_lossy(&message.body));
                return Ok(());
            }
            other => anyhow::bail!("server sent unexpected opcode {other:?}"),
        }
    }
}
