//! Catalog sessions: list and stream ASCII videos over the reliable link.

use std::path::Path;

use anyhow::Context;
use log::info;
use rlink::app::{self, MAX_BODY, Message, Opcode};
use rlink::{Endpoint, Error, Impairment, LossySink, Role, stats};
use tokio::net::TcpStream;

use crate::{Args, link_config};

/// Serves one connection until the peer goes away, then records the
/// session's statistics line.
pub async fn serve(stream: TcpStream, args: &Args) -> anyhow::Result<()> {
    let (reader, writer) = stream.into_split();
    let impairment = Impairment::new(args.drop, args.corrupt);
    let mut endpoint = Endpoint::new(reader, LossySink::new(writer, impairment), link_config(args));

    let result = run_session(&endpoint, &args.videos).await;

    let line = endpoint
        .stats()
        .log_line(args.mode, args.drop, args.corrupt, Role::Server);
    stats::append_log(&args.log, &line).context("appending statistics log")?;
    endpoint.shutdown().await;
    result
}

async fn run_session(endpoint: &Endpoint, videos: &Path) -> anyhow::Result<()> {
    loop {
        let message = match app::read_message(endpoint).await {
            Ok(message) => message,
            Err(Error::Shutdown) => {
                info!("peer went away");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };
        match message.opcode {
            Opcode::List => list_catalog(endpoint, videos).await?,
            Opcode::Play => {
                let name = String::from_utf8_lossy(&message.body).into_owned();
                stream_video(endpoint, videos, &name).await?;
            }
            other => send_error(endpoint, format!("unexpected opcode {other:?}")).await?,
        }
    }
}

/// Sends one catalog entry per response message, then the terminator.
async fn list_catalog(endpoint: &Endpoint, videos: &Path) -> anyhow::Result<()> {
    let mut names = Vec::new();
    for entry in
        std::fs::read_dir(videos).with_context(|| format!("reading {}", videos.display()))?
    {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "txt") {
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_owned());
            }
        }
    }
    names.sort();

    info!("listing {} videos", names.len());
    for name in names {
        app::send_message(endpoint, &Message::new(Opcode::Catalog, name.into_bytes())?).await?;
    }
    app::send_message(endpoint, &Message::empty(Opcode::End)).await?;
    Ok(())
}

/// Streams a video file in message-sized slices, then the terminator.
async fn stream_video(endpoint: &Endpoint, videos: &Path, name: &str) -> anyhow::Result<()> {
    // The catalog is flat; keep requests inside it.
    if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
        return send_error(endpoint, format!("bad video name {name:?}")).await;
    }

    let path = videos.join(format!("{name}.txt"));
    let contents = match std::fs::read(&path) {
        Ok(contents) => contents,
        Err(err) => return send_error(endpoint, format!("cannot open {name}: {err}")).await,
    };

    info!("streaming {name} ({} bytes)", contents.len());
    for slice in contents.chunks(MAX_BODY) {
        app::send_message(endpoint, &Message::new(Opcode::Chunk, slice.to_vec())?).await?;
    }
    app::send_message(endpoint, &Message::empty(Opcode::End)).await?;
    Ok(())
}

async fn send_error(endpoint: &Endpoint, text: String) -> anyhow::Result<()> {
    let mut body = text.into_bytes();
    body.truncate(MAX_BODY);
    app::send_message(endpoint, &Message::new(Opcode::Error, body)?).await?;
    Ok(())
}
