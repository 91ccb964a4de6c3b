use std::sync::Arc;

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use log::{error, info, warn};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::protocol::Message;

use checkers_engine::engine::DEFAULT_DEPTH;
use checkers_engine::error::{CheckersError, Result};
use checkers_engine::net::PeerLink;
use checkers_engine::wire::{WireMove, DEFAULT_RELAY};
use checkers_engine::{ClickOutcome, Difficulty, Engine, Game, Move, Side};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(long, default_value = "localhost")]
    host: String,
    #[arg(long, default_value_t = 999)]
    port: u16,
    /// How the computer side plays until a client picks otherwise.
    #[arg(long, value_enum, default_value_t = Difficulty::Hard)]
    difficulty: Difficulty,
    /// Search depth in plies for hard mode.
    #[arg(long, default_value_t = DEFAULT_DEPTH)]
    depth: u32,
    /// Relay address for multiplayer games.
    #[arg(long, default_value = DEFAULT_RELAY)]
    peer: String,
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();
    let level = if args.verbose { log::Level::Debug } else { log::Level::Info };
    if let Err(e) = simple_logger::init_with_level(level) {
        eprintln!("Failed to initialise logging: {}", e);
    }

    let address = format!("{}:{}", args.host, args.port);

    // Bind the server to a local port
    let listener = TcpListener::bind(address.clone()).await?;
    info!("Listening on: {}", address);

    let args = Arc::new(args);
    while let Ok((stream, _)) = listener.accept().await {
        let args = Arc::clone(&args);
        tokio::spawn(async move {
            if let Err(e) = accept_connection(stream, args).await {
                error!("Connection ended with error: {}", e);
            }
        });
    }

    Ok(())
}

struct Session {
    started: bool,
    game: Game,
    link: Option<PeerLink>,
}

impl Session {
    fn new(args: &Args) -> Self {
        Self {
            started: false,
            game: Game::new(args.difficulty, Engine::new(args.depth)),
            link: None,
        }
    }
}

async fn accept_connection(stream: TcpStream, args: Arc<Args>) -> Result<()> {
    let addr = stream.peer_addr().map_err(CheckersError::Connectivity)?;
    info!("Peer address: {}", addr);

    let ws_stream = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws_stream) => ws_stream,
        Err(e) => {
            error!("Error during the websocket handshake with {}: {}", addr, e);
            return Ok(());
        }
    };
    info!("New WebSocket connection: {}", addr);

    let (mut write, mut read) = ws_stream.split();

    let session_mutex = Arc::new(Mutex::new(Session::new(&args)));

    while let Some(raw_message) = read.next().await {
        match raw_message {
            Ok(text_message) => {
                if !text_message.is_text() && !text_message.is_binary() { continue; }
                match serde_json::from_slice::<Value>(&text_message.into_data()) {
                    Ok(data) => {
                        info!("Received: {}", data);
                        let result = handle_message(&session_mutex, &args, data).await;
                        let response = match result {
                            Ok(resp) => resp,
                            Err(e) => {
                                error!("Error handling message: {}", e);
                                json!({"error": e.to_string()})
                            }
                        };
                        let response_str = response.to_string();
                        if let Err(e) = write.send(Message::text(response_str.clone())).await {
                            error!("Failed to send message {}: {}", response_str, e);
                            break;
                        }
                        info!("Sent: {}", response_str);
                    },
                    Err(e) => { error!("Error parsing JSON: {:?}", e); }
                }
            }
            Err(e) => { error!("Error reading websocket message: {:?}", e); }
        }
    }

    info!("Connection closed: {}", addr);
    Ok(())
}

async fn handle_message(session_mutex: &Arc<Mutex<Session>>, args: &Args, data: Value) -> Result<Value> {
    let mut session = session_mutex.lock().await;

    let map = data.as_object()
        .ok_or_else(|| CheckersError::InvalidMessage("expected a dict".into()))?;

    // client message protocol: "start", "click", "reset"
    // server message protocol: "board", "result", "click", "opponent_moves", "error"
    if map.contains_key("start") {
        let difficulty: Difficulty = serde_json::from_value(data["start"].clone())?;
        handle_start(&mut session, args, difficulty).await
    } else if map.contains_key("click") {
        if !session.started {
            return Err(CheckersError::InvalidMessage("game has not started yet".into()));
        }
        let [col, row]: [usize; 2] = serde_json::from_value(data["click"].clone())?;
        handle_click(&mut session, col, row).await
    } else if map.contains_key("reset") {
        if let Some(link) = session.link.take() {
            info!("Dropping relay connection on reset");
            drop(link);
        }
        session.game.set_difficulty(args.difficulty);
        session.game.reset();
        session.started = false;
        Ok(respond(&session.game, json!(null), &[]))
    } else {
        Err(CheckersError::InvalidMessage(format!("unknown message: {}", data)))
    }
}

async fn handle_start(session: &mut Session, args: &Args, difficulty: Difficulty) -> Result<Value> {
    session.link = None;
    if difficulty == Difficulty::Multiplayer {
        let mut link = PeerLink::connect(&args.peer).await?;
        let first = link.request_turn().await?;
        session.link = Some(link);
        session.game.set_difficulty(difficulty);
        session.game.reset_with_first_mover(first);
    } else {
        session.game.set_difficulty(difficulty);
        session.game.reset();
    }
    session.started = true;
    let opponent_moves = play_opponent(session).await?;
    Ok(respond(&session.game, json!(null), &opponent_moves))
}

async fn handle_click(session: &mut Session, col: usize, row: usize) -> Result<Value> {
    let outcome = session.game.apply_click(col, row);
    let click = match &outcome {
        ClickOutcome::Ignored => json!({ "ignored": true }),
        ClickOutcome::Selected { destinations, .. } => json!({ "destinations": destinations }),
        ClickOutcome::Moved { move_, continues } => json!({ "move": move_, "continues": continues }),
    };

    if let ClickOutcome::Moved { move_, .. } = outcome {
        if let Some(link) = session.link.as_mut() {
            let record = WireMove::from_local(&move_, session.game.board().side_to_move());
            link.send_move(&record).await?;
        }
    }

    let opponent_moves = play_opponent(session).await?;
    Ok(respond(&session.game, click, &opponent_moves))
}

/// Lets the computer or the remote peer move until the player is back on turn.
async fn play_opponent(session: &mut Session) -> Result<Vec<Move>> {
    if session.game.difficulty() != Difficulty::Multiplayer {
        return Ok(session.game.run_computer_turn());
    }
    let Some(link) = session.link.as_mut() else {
        warn!("multiplayer session without a relay connection");
        return Ok(Vec::new());
    };
    let mut played = Vec::new();
    while !session.game.is_decided() && session.game.board().side_to_move() == Side::COMPUTER {
        let record = link.request_step().await?;
        played.push(session.game.apply_remote_move(&record)?);
    }
    Ok(played)
}

fn respond(game: &Game, click: Value, opponent_moves: &[Move]) -> Value {
    json!({
        "board": game.snapshot(),
        "result": game.outcome(),
        "click": click,
        "opponent_moves": opponent_moves,
    })
}
