//! Interactive driver for `fib-alloc`.
//!
//! Spec.md explicitly treats this driver as an external collaborator —
//! "the interactive driver that reads sizes from standard input and
//! prints results" — rather than part of the allocator's own surface.
//! It exists here the way `tock-tock`'s `tools/` binaries exist
//! alongside the kernel they serve: a thin, ordinary `clap` CLI built on
//! top of a library crate, with its own small error type and its own
//! logging setup, touching none of the allocator's internals directly.
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::ptr::NonNull;

use clap::{Parser, Subcommand};
use fib_alloc::Heap;
use log::info;
use thiserror::Error;

/// A small integer the driver hands back in place of a raw pointer, so
/// a terminal session can refer to a prior allocation without doing its
/// own pointer arithmetic.
type Handle = u32;

#[derive(Parser)]
#[command(
    name = "fib-alloc",
    about = "Drive a Fibonacci buddy heap interactively or with one-shot commands."
)]
struct Cli {
    /// Size in bytes of the backing region to allocate at startup.
    #[arg(long, default_value_t = 4181)]
    heap_bytes: usize,

    /// One-shot command. If omitted, reads commands from stdin until
    /// EOF, one per line (`alloc <bytes>`, `release <handle>`, `dump`,
    /// `quit`).
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Allocate a block of at least `bytes` bytes.
    Alloc {
        /// Number of bytes requested.
        bytes: usize,
    },
    /// Release a previously allocated handle.
    Release {
        /// Handle returned by a prior `alloc`.
        handle: Handle,
    },
    /// Print the current free list.
    Dump,
}

#[derive(Debug, Error)]
enum DriverError {
    #[error("unrecognized command {0:?} (try: alloc <bytes> | release <handle> | dump | quit)")]
    UnknownCommand(String),
    #[error("{0}: expected a byte count")]
    MissingBytes(&'static str),
    #[error("{0}: expected a handle")]
    MissingHandle(&'static str),
    #[error("could not parse {0:?} as a number")]
    NotANumber(String),
    #[error("no live allocation under handle {0}")]
    UnknownHandle(Handle),
    #[error(transparent)]
    Alloc(#[from] fib_alloc::AllocError),
    #[error(transparent)]
    Release(#[from] fib_alloc::ReleaseError),
}

struct Driver {
    heap: Heap,
    live: HashMap<Handle, NonNull<u8>>,
    next_handle: Handle,
}

impl Driver {
    fn new(heap: Heap) -> Self {
        Driver {
            heap,
            live: HashMap::new(),
            next_handle: 0,
        }
    }

    fn alloc(&mut self, bytes: usize) -> Result<Handle, DriverError> {
        let ptr = self.heap.allocate(bytes)?;
        let handle = self.next_handle;
        self.next_handle += 1;
        self.live.insert(handle, ptr);
        Ok(handle)
    }

    fn release(&mut self, handle: Handle) -> Result<(), DriverError> {
        let ptr = self
            .live
            .remove(&handle)
            .ok_or(DriverError::UnknownHandle(handle))?;
        self.heap.release(ptr)?;
        Ok(())
    }

    fn dump(&self) -> String {
        let entries = self.heap.dump_free_list();
        if entries.is_empty() {
            return "(free list is empty)".to_string();
        }
        let mut out = String::new();
        for e in entries {
            out.push_str(&format!(
                "  base +{:<8} size {:<6} index {}\n",
                e.base_offset, e.size, e.fib_index
            ));
        }
        out
    }

    fn dispatch(&mut self, command: &Command) -> Result<String, DriverError> {
        match command {
            Command::Alloc { bytes } => {
                let handle = self.alloc(*bytes)?;
                Ok(format!("ok: handle {}", handle))
            }
            Command::Release { handle } => {
                self.release(*handle)?;
                Ok(format!("ok: released handle {}", handle))
            }
            Command::Dump => Ok(self.dump()),
        }
    }
}

fn parse_line(line: &str) -> Result<Option<Command>, DriverError> {
    let mut words = line.split_whitespace();
    let Some(word) = words.next() else {
        return Ok(None);
    };
    match word {
        "alloc" | "allocate" => {
            let bytes = words
                .next()
                .ok_or(DriverError::MissingBytes("alloc"))?
                .parse()
                .map_err(|_| DriverError::NotANumber(line.to_string()))?;
            Ok(Some(Command::Alloc { bytes }))
        }
        "release" | "free" => {
            let handle = words
                .next()
                .ok_or(DriverError::MissingHandle("release"))?
                .parse()
                .map_err(|_| DriverError::NotANumber(line.to_string()))?;
            Ok(Some(Command::Release { handle }))
        }
        "dump" => Ok(Some(Command::Dump)),
        "quit" | "exit" => Ok(None),
        other => Err(DriverError::UnknownCommand(other.to_string())),
    }
}

fn run_repl(driver: &mut Driver) -> io::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("fib-alloc> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            break;
        }

        match parse_line(line).and_then(|cmd| match cmd {
            Some(command) => driver.dispatch(&command),
            None => Ok(String::new()),
        }) {
            Ok(output) => {
                if !output.is_empty() {
                    println!("{}", output.trim_end());
                }
            }
            Err(err) => println!("error: {}", err),
        }
    }
    Ok(())
}

fn main() -> io::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let heap = match Heap::init(cli.heap_bytes) {
        Ok(heap) => heap,
        Err(err) => {
            eprintln!("error: {}", err);
            std::process::exit(1);
        }
    };
    info!(
        "fib-alloc-cli: heap initialized, capacity {} bytes",
        heap.capacity()
    );

    let mut driver = Driver::new(heap);

    if let Some(command) = cli.command {
        match driver.dispatch(&command) {
            Ok(output) => println!("{}", output.trim_end()),
            Err(err) => {
                eprintln!("error: {}", err);
                std::process::exit(1);
            }
        }
    } else {
        run_repl(&mut driver)?;
    }

    driver.heap.shutdown();
    Ok(())
}
