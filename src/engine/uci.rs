use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::{info, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;

use super::{EngineParameters, ParameterPatch, SearchEngine, TopMove};
use crate::error::EngineError;

/// Lines written to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UciCommand {
    Uci,
    IsReady,
    UciNewGame,
    SetOption { name: &'static str, value: String },
    Position(String),
    Go { depth: u32 },
    Stop,
    Quit,
}

impl Display for UciCommand {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            UciCommand::Uci => write!(f, "uci"),
            UciCommand::IsReady => write!(f, "isready"),
            UciCommand::UciNewGame => write!(f, "ucinewgame"),
            UciCommand::SetOption { name, value } => {
                write!(f, "setoption name {name} value {value}")
            }
            UciCommand::Position(fen) => write!(f, "position fen {fen}"),
            UciCommand::Go { depth } => write!(f, "go depth {depth}"),
            UciCommand::Stop => write!(f, "stop"),
            UciCommand::Quit => write!(f, "quit"),
        }
    }
}

/// Lines read back from the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UciReply {
    UciOk,
    ReadyOk,
    BestMove(Option<String>),
    Info(InfoLine),
    Other(String),
}

impl UciReply {
    pub fn new(line: &str) -> UciReply {
        let line = line.trim();
        let (command, args) = line.split_at(line.find(' ').unwrap_or(line.len()));

        match command {
            "uciok" => UciReply::UciOk,
            "readyok" => UciReply::ReadyOk,
            "bestmove" => UciReply::BestMove(best_move_from_args(args)),
            "info" => match InfoLine::new(args) {
                Some(info) => UciReply::Info(info),
                None => UciReply::Other(line.to_string()),
            },
            _ => UciReply::Other(line.to_string()),
        }
    }
}

// "(none)" and the null move both mean there is nothing to play
fn best_move_from_args(args: &str) -> Option<String> {
    match args.split_whitespace().next()? {
        "(none)" | "0000" => None,
        m => Some(m.to_string()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Centipawns(i32),
    Mate(i32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoLine {
    pub multipv: u32,
    pub depth: Option<u32>,
    pub score: Option<Score>,
    pub pv: Option<String>,
}

impl InfoLine {
    fn new(args: &str) -> Option<InfoLine> {
        let mut info = InfoLine {
            multipv: 1,
            depth: None,
            score: None,
            pv: None,
        };

        let mut tokens = args.split_whitespace();
        while let Some(token) = tokens.next() {
            match token {
                "depth" => info.depth = tokens.next().and_then(|t| t.parse().ok()),
                "multipv" => {
                    info.multipv = tokens.next().and_then(|t| t.parse().ok()).unwrap_or(1)
                }
                "score" => {
                    let kind = tokens.next();
                    let value = tokens.next().and_then(|t| t.parse().ok());
                    info.score = match (kind, value) {
                        (Some("cp"), Some(cp)) => Some(Score::Centipawns(cp)),
                        (Some("mate"), Some(mate)) => Some(Score::Mate(mate)),
                        _ => None,
                    };
                }
                "pv" => {
                    info.pv = tokens.next().map(String::from);
                    break;
                }
                "string" => return None,
                _ => {}
            }
        }

        Some(info)
    }

    fn to_top_move(&self) -> Option<TopMove> {
        let uci = self.pv.clone()?;
        let (centipawn, mate) = match self.score {
            Some(Score::Centipawns(cp)) => (Some(cp), None),
            Some(Score::Mate(mate)) => (None, Some(mate)),
            None => (None, None),
        };

        Some(TopMove {
            uci,
            centipawn,
            mate,
        })
    }
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub depth: u32,
    pub timeout: Duration,
    pub parameters: EngineParameters,
}

/// An engine binary driven over UCI on its stdin and stdout.
pub struct UciEngine {
    path: PathBuf,
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    options: EngineOptions,
    // a timed out search still owes us a bestmove line
    searching: bool,
}

impl UciEngine {
    pub async fn spawn(path: &Path, options: EngineOptions) -> Result<UciEngine, EngineError> {
        let mut child = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EngineError::Spawn {
                path: path.to_path_buf(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or(EngineError::Closed)?;
        let stdout = child.stdout.take().ok_or(EngineError::Closed)?;

        let mut engine = UciEngine {
            path: path.to_path_buf(),
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            options,
            searching: false,
        };

        engine.handshake().await?;
        info!("engine {} ready", engine.path.display());

        Ok(engine)
    }

    pub async fn quit(mut self) {
        if let Err(err) = self.send(UciCommand::Quit).await {
            warn!("could not send quit to engine: {err}");
        }

        match timeout(self.options.timeout, self.child.wait()).await {
            Ok(Ok(status)) => info!("engine {} exited with {status}", self.path.display()),
            _ => warn!("engine {} did not exit, killing it", self.path.display()),
        }
    }

    async fn handshake(&mut self) -> Result<(), EngineError> {
        self.send(UciCommand::Uci).await?;
        self.read_until(|reply| (reply == UciReply::UciOk).then_some(()))
            .await?;

        for (name, value) in self.options.parameters.uci_options() {
            self.send(UciCommand::SetOption { name, value }).await?;
        }

        self.send(UciCommand::UciNewGame).await?;
        self.ready().await
    }

    async fn ready(&mut self) -> Result<(), EngineError> {
        self.send(UciCommand::IsReady).await?;
        self.read_until(|reply| (reply == UciReply::ReadyOk).then_some(()))
            .await
    }

    async fn send(&mut self, command: UciCommand) -> Result<(), EngineError> {
        let line = format!("{command}\n");
        info!(target: "input", "{}", line.trim_end());

        let limit = self.options.timeout;
        let stdin = &mut self.stdin;
        let write = async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.flush().await
        };

        match timeout(limit, write).await {
            Ok(written) => Ok(written?),
            Err(_) => Err(EngineError::Timeout(limit)),
        }
    }

    async fn read_until<T: Send>(
        &mut self,
        accept: impl FnMut(UciReply) -> Option<T> + Send,
    ) -> Result<T, EngineError> {
        let limit = self.options.timeout;

        match timeout(limit, scan_replies(&mut self.stdout, accept)).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::Timeout(limit)),
        }
    }

    /// Waits out the bestmove of a search that timed out earlier.
    async fn settle(&mut self) -> Result<(), EngineError> {
        if self.searching {
            self.read_until(|reply| matches!(reply, UciReply::BestMove(_)).then_some(()))
                .await?;
            self.searching = false;
        }

        Ok(())
    }

    async fn search<T: Send>(
        &mut self,
        accept: impl FnMut(UciReply) -> Option<T> + Send,
    ) -> Result<T, EngineError> {
        self.settle().await?;
        self.send(UciCommand::Go {
            depth: self.options.depth,
        })
        .await?;
        self.searching = true;

        match self.read_until(accept).await {
            Ok(found) => {
                self.searching = false;
                Ok(found)
            }
            Err(err) => {
                if matches!(err, EngineError::Timeout(_)) {
                    // best effort, the engine is already misbehaving
                    let _ = self.send(UciCommand::Stop).await;
                }
                Err(err)
            }
        }
    }
}

async fn scan_replies<T, R>(
    lines: &mut Lines<R>,
    mut accept: impl FnMut(UciReply) -> Option<T>,
) -> Result<T, EngineError>
where
    R: AsyncBufRead + Unpin,
{
    while let Some(line) = lines.next_line().await? {
        info!(target: "output", "{line}");

        if let Some(found) = accept(UciReply::new(&line)) {
            return Ok(found);
        }
    }

    Err(EngineError::Closed)
}

#[async_trait]
impl SearchEngine for UciEngine {
    async fn set_position(&mut self, fen: &str) -> Result<(), EngineError> {
        self.settle().await?;
        self.send(UciCommand::Position(fen.to_string())).await?;
        self.ready().await
    }

    async fn best_move(&mut self) -> Result<Option<String>, EngineError> {
        self.search(|reply| match reply {
            UciReply::BestMove(m) => Some(m),
            _ => None,
        })
        .await
    }

    async fn top_moves(&mut self, count: usize) -> Result<Vec<TopMove>, EngineError> {
        self.settle().await?;
        self.send(UciCommand::SetOption {
            name: "MultiPV",
            value: count.to_string(),
        })
        .await?;

        // later lines for the same rank come from deeper iterations
        let mut ranked: BTreeMap<u32, InfoLine> = BTreeMap::new();
        let best = self
            .search(|reply| match reply {
                UciReply::Info(info) if info.pv.is_some() => {
                    ranked.insert(info.multipv, info);
                    None
                }
                UciReply::BestMove(m) => Some(m),
                _ => None,
            })
            .await;

        self.send(UciCommand::SetOption {
            name: "MultiPV",
            value: "1".to_string(),
        })
        .await?;

        if best?.is_none() {
            return Ok(Vec::new());
        }

        Ok(ranked
            .values()
            .filter_map(InfoLine::to_top_move)
            .take(count)
            .collect())
    }

    fn parameters(&self) -> EngineParameters {
        self.options.parameters.clone()
    }

    async fn set_parameters(&mut self, patch: &ParameterPatch) -> Result<(), EngineError> {
        self.settle().await?;

        for (name, value) in patch.uci_options() {
            self.send(UciCommand::SetOption { name, value }).await?;
        }
        self.ready().await?;

        self.options.parameters.apply(patch);
        Ok(())
    }
}
