use crate::{
    blockchain::{
        block::Block,
        transaction::{Transaction, TransactionValidator},
        Blockchain, LedgerError,
    },
    cli::Command,
    proof,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::VecDeque,
    io::{self, Write as _},
    net::{TcpListener, TcpStream},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, Sender},
        Arc,
    },
    thread,
    time::Duration,
};

pub const MINED_MESSAGE: &str = "New Block Forged";

// how long a client may take to send its command
pub const READ_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ProtocolConfig {
    pub network_port: u16, // the port the daemon listens on for commands
}

// every reply is a single JSON object, the variant name is not sent
#[derive(Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Chain {
        chain: Vec<Block>,
        length: usize,
    },
    TransactionAccepted {
        message: String,
        index: u64,
    },
    Mined {
        message: String,
        block: Block,
    },
    Pending {
        transactions: Vec<Transaction>,
        length: usize,
    },
    Validation {
        valid: bool,
        error: Option<String>,
    },
    ProofCheck {
        last_proof: u64,
        proof: u64,
        valid: bool,
    },
    Error {
        error: String,
    },
}

impl From<LedgerError> for Response {
    fn from(e: LedgerError) -> Self {
        Self::Error {
            error: e.to_string(),
        }
    }
}

// what the main loop reacts to
enum Event {
    Command(Command, TcpStream),
    // a mining worker finished, `proof` is `None` if its search was cancelled
    SearchDone {
        id: u64,
        last_proof: u64,
        proof: Option<u64>,
    },
}

// the proof search running on top of the current last block,
// along with the `Mine` clients waiting on it (one block each, in arrival order)
struct Search {
    id: u64,
    last_proof: u64,
    cancel: Arc<AtomicBool>,
    waiting: VecDeque<TcpStream>,
}

/*
    The Protocol owns the only Blockchain of the process. Commands arrive from
    connection threads and mining results from the worker thread, all over one
    channel, and are handled one at a time on the thread that called `run()`.
    This makes every mutation of the chain and the pending pool a single
    uninterrupted step.

    Every `Mine` targets the current last block, so at most one search runs at a
    time. Each found proof forges one block for the oldest waiting client, and
    the search starts over on top of it for whoever is still waiting.
*/

pub struct Protocol {
    blockchain: Blockchain,
    strict_transactions: bool,
    search: Option<Search>,
    next_search_id: u64,
}

impl Protocol {
    pub fn new(strict_transactions: bool) -> Self {
        Self {
            blockchain: Blockchain::new(),
            strict_transactions,
            search: None,
            next_search_id: 0,
        }
    }

    pub fn blockchain(&self) -> &Blockchain {
        &self.blockchain
    }

    pub fn run(&mut self, cfg: ProtocolConfig) -> io::Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", cfg.network_port))?;
        self.run_on(listener)
    }

    /// Serves commands arriving on an already bound listener.
    pub fn run_on(&mut self, listener: TcpListener) -> io::Result<()> {
        fn spawn_listener_thread(listener: TcpListener, tx: Sender<Event>) {
            thread::spawn(move || {
                for conn in listener.incoming() {
                    let stream = match conn {
                        Ok(stream) => stream,
                        Err(e) => {
                            log::warn!("Listener: Failed to establish connection: {}", e);
                            continue;
                        }
                    };

                    // a slow client must not hold up the ones behind it
                    let tx = tx.clone();
                    thread::spawn(move || receive_command(stream, tx));
                }
            });
        }

        fn receive_command(stream: TcpStream, tx: Sender<Event>) {
            if let Err(e) = stream.set_read_timeout(Some(READ_TIMEOUT)) {
                log::warn!("Listener: Failed to set read timeout: {}", e);
                return;
            }

            let reader = match stream.try_clone() {
                Ok(reader) => reader,
                Err(e) => {
                    log::warn!("Listener: Failed to clone stream: {}", e);
                    return;
                }
            };

            let mut de = serde_json::Deserializer::from_reader(reader);
            let command = match Command::deserialize(&mut de) {
                Ok(command) => command,
                Err(e) => {
                    log::warn!("Listener: Failed to deserialize stream data: {}", e);
                    return;
                }
            };

            log::trace!("Listener: Received `{}`", command);

            if tx.send(Event::Command(command, stream)).is_err() {
                log::debug!("Listener: Main loop is gone, dropping command");
            }
        }

        log::info!("Listening on {}", listener.local_addr()?);

        let (tx, rx): (Sender<Event>, Receiver<Event>) = mpsc::channel();
        spawn_listener_thread(listener, tx.clone());

        // main loop
        for event in rx {
            match event {
                Event::Command(Command::Mine, stream) => self.queue_mine(stream, &tx),
                Event::Command(command, mut stream) => {
                    let response = self.respond(command);
                    send_response(&mut stream, &response);
                }
                Event::SearchDone {
                    id,
                    last_proof,
                    proof,
                } => self.search_done(id, last_proof, proof, &tx),
            }
        }

        Ok(())
    }

    /// Answers a command synchronously.
    ///
    /// `Mine` blocks until a proof is found; the daemon loop never calls this
    /// for `Mine` and runs the search on a worker thread instead.
    pub fn respond(&mut self, command: Command) -> Response {
        match command {
            Command::Chain => Response::Chain {
                chain: self.blockchain.blocks().to_vec(),
                length: self.blockchain.len(),
            },

            Command::Transaction {
                sender,
                recipient,
                amount,
            } => self.new_transaction(sender, recipient, amount),

            Command::Mine => {
                let proof = match self.blockchain.last_proof() {
                    Ok(last_proof) => proof::find_proof(last_proof),
                    Err(e) => return e.into(),
                };

                self.forge_block(proof)
            }

            Command::Pending => Response::Pending {
                transactions: self.blockchain.pending().to_vec(),
                length: self.blockchain.pending().len(),
            },

            Command::Validate => match self.blockchain.validate() {
                Ok(()) => Response::Validation {
                    valid: true,
                    error: None,
                },
                Err(e) => {
                    log::warn!("Chain validation failed: {}", e);
                    Response::Validation {
                        valid: false,
                        error: Some(e.to_string()),
                    }
                }
            },

            Command::CheckProof { last_proof, proof } => Response::ProofCheck {
                last_proof,
                proof,
                valid: proof::is_valid_proof(last_proof, proof),
            },
        }
    }

    fn new_transaction(&mut self, sender: String, recipient: String, amount: i64) -> Response {
        if self.strict_transactions {
            let tsx = Transaction::new(sender.as_str(), recipient.as_str(), amount);
            if let Err(e) = TransactionValidator::validate(&tsx) {
                log::debug!("Rejected transaction {:?}: {}", tsx, e);
                return Response::Error {
                    error: e.to_string(),
                };
            }
        }

        match self.blockchain.submit_transaction(sender, recipient, amount) {
            Ok(index) => Response::TransactionAccepted {
                message: format!("Transaction will be added to Block {}", index),
                index,
            },
            Err(e) => e.into(),
        }
    }

    fn queue_mine(&mut self, stream: TcpStream, tx: &Sender<Event>) {
        match &mut self.search {
            Some(search) => {
                log::trace!(
                    "Queued mining request behind search {} (last proof {})",
                    search.id,
                    search.last_proof
                );
                search.waiting.push_back(stream);
            }
            None => self.start_search(VecDeque::from([stream]), tx),
        }
    }

    fn start_search(&mut self, mut waiting: VecDeque<TcpStream>, tx: &Sender<Event>) {
        let last_proof = match self.blockchain.last_proof() {
            Ok(last_proof) => last_proof,
            Err(e) => {
                let response = Response::from(e);
                for stream in waiting.iter_mut() {
                    send_response(stream, &response);
                }
                return;
            }
        };

        let id = self.next_search_id;
        self.next_search_id += 1;

        let cancel = Arc::new(AtomicBool::new(false));

        log::trace!("Starting search {} for last proof {}", id, last_proof);

        let worker_cancel = Arc::clone(&cancel);
        let tx = tx.clone();
        thread::spawn(move || {
            let proof = proof::find_proof_cancellable(last_proof, &worker_cancel);

            let event = Event::SearchDone {
                id,
                last_proof,
                proof,
            };
            if tx.send(event).is_err() {
                log::warn!("Mining result for last proof {} was dropped", last_proof);
            }
        });

        self.search = Some(Search {
            id,
            last_proof,
            cancel,
            waiting,
        });
    }

    fn search_done(&mut self, id: u64, last_proof: u64, proof: Option<u64>, tx: &Sender<Event>) {
        let mut search = match self.search.take() {
            Some(search) if search.id == id => search,
            other => {
                self.search = other;
                log::trace!("Ignoring result of abandoned search {}", id);
                return;
            }
        };

        // stale or cancelled results leave every client waiting for the next search
        if let Some(response) = self.finish_search(last_proof, proof) {
            if let Some(mut stream) = search.waiting.pop_front() {
                send_response(&mut stream, &response);
            }
        }

        if !search.waiting.is_empty() {
            self.start_search(search.waiting, tx);
        }
    }

    /// Turns the result of a proof search into a block, if it still applies.
    ///
    /// Returns `None` when the search was cancelled or the chain moved on since
    /// it started; the caller should search again.
    fn finish_search(&mut self, last_proof: u64, proof: Option<u64>) -> Option<Response> {
        let proof = proof?;

        match self.blockchain.last_proof() {
            Ok(current) if current == last_proof => Some(self.forge_block(proof)),
            Ok(current) => {
                log::debug!(
                    "Discarding proof {} for last proof {} (chain is now at {})",
                    proof,
                    last_proof,
                    current
                );
                None
            }
            Err(e) => Some(e.into()),
        }
    }

    fn forge_block(&mut self, proof: u64) -> Response {
        let block = match self.blockchain.create_block(None, proof) {
            Ok(block) => block.clone(),
            Err(e) => return e.into(),
        };

        // a running search now works on a stale last proof
        if let Some(search) = &self.search {
            search.cancel.store(true, Ordering::Relaxed);
        }

        log::debug!("Forged block {} with proof {}", block.index(), proof);

        Response::Mined {
            message: MINED_MESSAGE.to_string(),
            block,
        }
    }
}

impl Drop for Protocol {
    fn drop(&mut self) {
        if let Some(search) = &self.search {
            search.cancel.store(true, Ordering::Relaxed);
        }
    }
}

fn send_response(stream: &mut TcpStream, response: &Response) {
    let bytes = match serde_json::to_vec(response) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("Failed to serialize response: {}", e);
            return;
        }
    };

    if let Err(e) = stream.write_all(&bytes) {
        log::warn!("Failed to respond to client: {}", e);
    } else {
        log::trace!("Successfully responded to client");
    }
}
